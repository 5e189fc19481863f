//! In-Memory Store
//!
//! テストやローカル実行向けに全コラボレーターをメモリ上で実装

use super::{AnomalyRepository, CorrelationRepository, HealthDataSource, PopulationReference};
use crate::analytics::anomaly::AnomalyRecord;
use crate::analytics::correlation::{CorrelationRecord, CorrelationType, PopulationBaseline};
use crate::analytics::features::{HealthSnapshot, Metric};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type CorrelationKey = (Uuid, Metric, Metric, CorrelationType);
type PopulationKey = (Metric, Metric, CorrelationType);

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    snapshots: Arc<RwLock<HashMap<Uuid, HealthSnapshot>>>,
    anomalies: Arc<RwLock<HashMap<Uuid, AnomalyRecord>>>,
    correlations: Arc<RwLock<HashMap<CorrelationKey, CorrelationRecord>>>,
    population: Arc<RwLock<HashMap<PopulationKey, PopulationBaseline>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ユーザーの生データを追加
    pub async fn insert_snapshot(&self, user_id: Uuid, snapshot: HealthSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        let entry = snapshots.entry(user_id).or_default();
        entry.sleep.extend(snapshot.sleep);
        entry.exercise.extend(snapshot.exercise);
        entry.food.extend(snapshot.food);
        entry.vitals.extend(snapshot.vitals);
        entry.body.extend(snapshot.body);
        entry.chronic.extend(snapshot.chronic);
    }

    /// 異常レコードを確認済みにする
    pub async fn acknowledge_anomaly(&self, id: Uuid) -> bool {
        let mut anomalies = self.anomalies.write().await;
        match anomalies.get_mut(&id) {
            Some(record) => {
                record.is_acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub async fn anomaly_count(&self, user_id: Uuid) -> usize {
        let anomalies = self.anomalies.read().await;
        anomalies.values().filter(|r| r.user_id == user_id).count()
    }

    pub async fn set_population_baseline(
        &self,
        metric_a: Metric,
        metric_b: Metric,
        correlation_type: CorrelationType,
        baseline: PopulationBaseline,
    ) {
        let mut population = self.population.write().await;
        population.insert((metric_a, metric_b, correlation_type), baseline);
    }
}

#[async_trait]
impl HealthDataSource for InMemoryStore {
    async fn load_snapshot(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HealthSnapshot> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&user_id)
            .map(|s| s.within(start, end))
            .unwrap_or_default())
    }
}

#[async_trait]
impl AnomalyRepository for InMemoryStore {
    async fn list_anomalies(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnomalyRecord>> {
        let anomalies = self.anomalies.read().await;
        let mut result: Vec<AnomalyRecord> = anomalies
            .values()
            .filter(|r| r.user_id == user_id && r.date >= start && r.date <= end)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.metric.as_str().cmp(b.metric.as_str()))
        });
        Ok(result)
    }

    async fn create_anomaly(&self, record: AnomalyRecord) -> Result<AnomalyRecord> {
        let mut anomalies = self.anomalies.write().await;
        anomalies.insert(record.id, record.clone());
        Ok(record)
    }

    async fn persist_anomaly_run(
        &self,
        created: Vec<AnomalyRecord>,
        superseded: Vec<(Uuid, AnomalyRecord)>,
    ) -> Result<()> {
        let mut anomalies = self.anomalies.write().await;
        if let Some((missing, _)) = superseded
            .iter()
            .find(|(previous_id, _)| !anomalies.contains_key(previous_id))
        {
            return Err(Error::Storage(format!(
                "Anomaly {} not found for supersede",
                missing
            )));
        }
        for (previous_id, record) in superseded {
            anomalies.remove(&previous_id);
            anomalies.insert(record.id, record);
        }
        for record in created {
            anomalies.insert(record.id, record);
        }
        Ok(())
    }
}

#[async_trait]
impl CorrelationRepository for InMemoryStore {
    async fn list_correlations(&self, user_id: Uuid) -> Result<Vec<CorrelationRecord>> {
        let correlations = self.correlations.read().await;
        let mut result: Vec<CorrelationRecord> = correlations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            (a.metric_a.as_str(), a.metric_b.as_str(), a.correlation_type).cmp(&(
                b.metric_a.as_str(),
                b.metric_b.as_str(),
                b.correlation_type,
            ))
        });
        Ok(result)
    }

    async fn upsert_correlations(&self, records: Vec<CorrelationRecord>) -> Result<usize> {
        let mut correlations = self.correlations.write().await;
        let mut created = 0;
        for record in records {
            let key = (
                record.user_id,
                record.metric_a,
                record.metric_b,
                record.correlation_type,
            );
            if correlations.insert(key, record).is_none() {
                created += 1;
            }
        }
        Ok(created)
    }
}

#[async_trait]
impl PopulationReference for InMemoryStore {
    async fn population_baseline(
        &self,
        metric_a: Metric,
        metric_b: Metric,
        correlation_type: CorrelationType,
    ) -> Result<Option<PopulationBaseline>> {
        let population = self.population.read().await;
        Ok(population
            .get(&(metric_a, metric_b, correlation_type))
            .or_else(|| population.get(&(metric_b, metric_a, correlation_type)))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::anomaly::{AnomalyDetails, DetectorType, Severity};
    use crate::analytics::correlation::{CausalDirection, CorrelationDetails, CorrelationStrength};
    use crate::analytics::features::SleepEntry;
    use chrono::Utc;

    fn anomaly(user_id: Uuid, day: u32) -> AnomalyRecord {
        AnomalyRecord {
            id: Uuid::new_v4(),
            user_id,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            metric: Metric::SleepHours,
            metric_value: 4.0,
            baseline_value: 7.2,
            detector_type: DetectorType::Zscore,
            severity: Severity::High,
            anomaly_score: 1.0,
            source_table: Metric::SleepHours.source_table(),
            details: AnomalyDetails::default(),
            explanation: None,
            is_acknowledged: false,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_filtered_by_user_and_window() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        for d in 1..=10 {
            snapshot.sleep.push(SleepEntry {
                user_id: user,
                date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
                duration_hours: 7.0,
                quality_score: 80.0,
                awakenings: None,
            });
        }
        store.insert_snapshot(user, snapshot).await;

        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let loaded = store.load_snapshot(user, start, end).await.unwrap();
        assert_eq!(loaded.sleep.len(), 3);
        assert!(store
            .load_snapshot(Uuid::new_v4(), start, end)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_supersede_replaces_record() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let original = store.create_anomaly(anomaly(user, 5)).await.unwrap();
        let replacement = anomaly(user, 5);
        store
            .persist_anomaly_run(
                vec![anomaly(user, 6)],
                vec![(original.id, replacement.clone())],
            )
            .await
            .unwrap();
        assert_eq!(store.anomaly_count(user).await, 2);

        assert!(store.acknowledge_anomaly(replacement.id).await);
        assert!(!store.acknowledge_anomaly(original.id).await);
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let listed = store.list_anomalies(user, start, end).await.unwrap();
        assert!(listed[0].is_acknowledged);
    }

    #[tokio::test]
    async fn test_failed_run_persists_nothing() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let kept = store.create_anomaly(anomaly(user, 5)).await.unwrap();

        let result = store
            .persist_anomaly_run(
                vec![anomaly(user, 7), anomaly(user, 8)],
                vec![
                    (kept.id, anomaly(user, 5)),
                    (Uuid::new_v4(), anomaly(user, 9)),
                ],
            )
            .await;
        assert!(matches!(result, Err(Error::Storage(_))));

        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let listed = store.list_anomalies(user, start, end).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_upsert_counts_only_new_keys() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let record = |metric_b: Metric, correlation_type: CorrelationType| CorrelationRecord {
            id: Uuid::new_v4(),
            user_id: user,
            metric_a: Metric::ExerciseMinutes,
            metric_b,
            correlation_type,
            correlation_value: 0.6,
            p_value: Some(0.01),
            lag_days: 0,
            causal_direction: CausalDirection::None,
            strength: CorrelationStrength::Strong,
            confidence_score: 0.6,
            is_significant: true,
            is_actionable: false,
            sample_size: 40,
            insight: None,
            recommendation: None,
            details: CorrelationDetails::default(),
            detected_at: Utc::now(),
        };

        let first = vec![
            record(Metric::SleepQuality, CorrelationType::Pearson),
            record(Metric::SleepQuality, CorrelationType::MutualInfo),
        ];
        assert_eq!(store.upsert_correlations(first).await.unwrap(), 2);

        let second = vec![
            record(Metric::SleepQuality, CorrelationType::Pearson),
            record(Metric::SleepHours, CorrelationType::Pearson),
        ];
        assert_eq!(store.upsert_correlations(second).await.unwrap(), 1);
        assert_eq!(store.list_correlations(user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_population_lookup_ignores_order() {
        let store = InMemoryStore::new();
        store
            .set_population_baseline(
                Metric::SleepHours,
                Metric::HrvMs,
                CorrelationType::Pearson,
                PopulationBaseline::new(0.4, 0.1),
            )
            .await;
        let found = store
            .population_baseline(Metric::HrvMs, Metric::SleepHours, CorrelationType::Pearson)
            .await
            .unwrap();
        assert_eq!(found.map(|b| b.mean), Some(0.4));
        assert!(store
            .population_baseline(Metric::HrvMs, Metric::SleepHours, CorrelationType::Granger)
            .await
            .unwrap()
            .is_none());
    }
}

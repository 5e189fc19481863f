//! Test Data
//!
//! 統合テスト用の決定的な合成データとモックコラボレーター

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;
use vitaliq_analytics::analytics::anomaly::AnomalyRecord;
use vitaliq_analytics::analytics::correlation::CorrelationRecord;
use vitaliq_analytics::analytics::features::{
    ExerciseEntry, ExerciseIntensity, FoodEntry, HealthSnapshot, SleepEntry,
};
use vitaliq_analytics::explain::{CorrelationNarrative, ExplanationProvider};
use vitaliq_analytics::storage::{
    AnomalyRepository, CorrelationRepository, HealthDataSource, InMemoryStore,
};
use vitaliq_analytics::{Error, Result};

/// 全シナリオ共通の窓の最終日
pub fn end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

pub fn day(offset_from_end: usize) -> NaiveDate {
    end_date() - Duration::days(offset_from_end as i64)
}

/// 平均 7.2h・標準偏差 0.4 前後の睡眠に 1 日だけ 4.0h を混ぜる
///
/// 睡眠の質は一定（分散ゼロでスキップされる）。
pub fn sleep_scenario(user_id: Uuid, days: usize, spike_offset: usize) -> HealthSnapshot {
    let mut snapshot = HealthSnapshot::new();
    for offset in 0..days {
        let hours = if offset == spike_offset {
            4.0
        } else {
            [6.8, 7.2, 7.6][offset % 3]
        };
        snapshot.sleep.push(SleepEntry {
            user_id,
            date: day(offset),
            duration_hours: hours,
            quality_score: 80.0,
            awakenings: None,
        });
    }
    snapshot
}

/// 運動時間と睡眠の質が強く正相関するシナリオ
pub fn correlated_scenario(user_id: Uuid, days: usize) -> HealthSnapshot {
    let mut snapshot = HealthSnapshot::new();
    for offset in 0..days {
        let i = days - 1 - offset;
        let exercise = 35.0 + 25.0 * (i as f64 * 0.9).sin() + ((i * 7) % 11) as f64;
        let quality = 50.0 + 0.5 * exercise + ((i * 5) % 3) as f64;
        let calories = 2000.0 + ((i * 37) % 17) as f64 * 20.0;

        snapshot.exercise.push(ExerciseEntry {
            user_id,
            date: day(offset),
            duration_minutes: exercise,
            intensity: ExerciseIntensity::Moderate,
            calories_burned: Some(exercise * 8.0),
        });
        snapshot.sleep.push(SleepEntry {
            user_id,
            date: day(offset),
            duration_hours: 7.0 + ((i * 3) % 7) as f64 * 0.1,
            quality_score: quality,
            awakenings: None,
        });
        snapshot.food.push(FoodEntry {
            user_id,
            date: day(offset),
            calories,
            protein_g: 90.0 + ((i * 13) % 7) as f64,
            carbs_g: 250.0 + ((i * 11) % 9) as f64 * 5.0,
            fats_g: 70.0,
            sugar_g: 40.0 + ((i * 19) % 5) as f64 * 3.0,
        });
    }
    snapshot
}

/// 呼び出し回数を数える説明生成モック
#[derive(Debug, Default)]
pub struct MockExplainer {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl MockExplainer {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplanationProvider for MockExplainer {
    async fn explain_anomaly(&self, record: &AnomalyRecord) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Explanation("provider unavailable".to_string()));
        }
        Ok(format!("{} deviated on {}", record.metric, record.date))
    }

    async fn describe_correlation(&self, record: &CorrelationRecord) -> Result<CorrelationNarrative> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Explanation("provider unavailable".to_string()));
        }
        Ok(CorrelationNarrative {
            insight: Some(format!("{} relates to {}", record.metric_a, record.metric_b)),
            recommendation: None,
        })
    }
}

/// 読み込みが呼ばれたら失敗するデータソース
#[derive(Debug, Default)]
pub struct UnreachableSource {
    pub reads: AtomicUsize,
}

#[async_trait]
impl HealthDataSource for UnreachableSource {
    async fn load_snapshot(
        &self,
        _user_id: Uuid,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<HealthSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage("data source unreachable".to_string()))
    }
}

/// 最初の一括保存だけ失敗させるリポジトリ
#[derive(Debug, Default)]
pub struct FlakyRepository {
    pub inner: InMemoryStore,
    pub failed_once: AtomicBool,
}

impl FlakyRepository {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            failed_once: AtomicBool::new(false),
        }
    }

    fn should_fail(&self) -> bool {
        !self.failed_once.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl AnomalyRepository for FlakyRepository {
    async fn list_anomalies(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnomalyRecord>> {
        self.inner.list_anomalies(user_id, start, end).await
    }

    async fn create_anomaly(&self, record: AnomalyRecord) -> Result<AnomalyRecord> {
        self.inner.create_anomaly(record).await
    }

    async fn persist_anomaly_run(
        &self,
        created: Vec<AnomalyRecord>,
        superseded: Vec<(Uuid, AnomalyRecord)>,
    ) -> Result<()> {
        if self.should_fail() {
            return Err(Error::Storage("write rejected".to_string()));
        }
        self.inner.persist_anomaly_run(created, superseded).await
    }
}

#[async_trait]
impl CorrelationRepository for FlakyRepository {
    async fn list_correlations(&self, user_id: Uuid) -> Result<Vec<CorrelationRecord>> {
        self.inner.list_correlations(user_id).await
    }

    async fn upsert_correlations(&self, records: Vec<CorrelationRecord>) -> Result<usize> {
        if self.should_fail() {
            return Err(Error::Storage("write rejected".to_string()));
        }
        self.inner.upsert_correlations(records).await
    }
}

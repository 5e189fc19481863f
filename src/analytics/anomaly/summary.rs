//! Anomaly Summary

use super::types::{AnomalyRecord, Severity};
use crate::analytics::features::Metric;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 期間内の異常レコード集計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total: usize,
    pub unacknowledged: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_metric: BTreeMap<Metric, usize>,
    pub period_days: usize,
}

impl AnomalySummary {
    /// `end_date` までの `period_days` 日間のレコードを集計
    pub fn from_records(records: &[AnomalyRecord], end_date: NaiveDate, period_days: usize) -> Self {
        let start = end_date - Duration::days(period_days.saturating_sub(1) as i64);
        let mut summary = Self {
            period_days,
            ..Self::default()
        };

        for record in records
            .iter()
            .filter(|r| r.date >= start && r.date <= end_date)
        {
            summary.total += 1;
            if !record.is_acknowledged {
                summary.unacknowledged += 1;
            }
            *summary.by_severity.entry(record.severity).or_insert(0) += 1;
            *summary.by_metric.entry(record.metric).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::anomaly::types::{AnomalyDetails, DetectorType};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(day: u32, metric: Metric, severity: Severity, acknowledged: bool) -> AnomalyRecord {
        AnomalyRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            metric,
            metric_value: 1.0,
            baseline_value: 2.0,
            detector_type: DetectorType::Zscore,
            severity,
            anomaly_score: 0.5,
            source_table: metric.source_table(),
            details: AnomalyDetails::default(),
            explanation: None,
            is_acknowledged: acknowledged,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_within_period() {
        let records = vec![
            record(1, Metric::SleepHours, Severity::High, false),
            record(20, Metric::SleepHours, Severity::High, true),
            record(25, Metric::RestingHr, Severity::Low, false),
            record(30, Metric::RestingHr, Severity::Medium, false),
        ];
        let end = NaiveDate::from_ymd_opt(2024, 7, 30).unwrap();
        let summary = AnomalySummary::from_records(&records, end, 14);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.unacknowledged, 2);
        assert_eq!(summary.by_severity.get(&Severity::High), Some(&1));
        assert_eq!(summary.by_metric.get(&Metric::RestingHr), Some(&2));
        assert_eq!(summary.period_days, 14);
    }
}

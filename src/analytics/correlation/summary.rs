//! Correlation Summary

use super::types::{CausalDirection, CorrelationRecord, CorrelationStrength, CorrelationType};
use crate::analytics::features::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 上位の発見（説明生成への構造化入力）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFinding {
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub correlation_type: CorrelationType,
    pub correlation_value: f64,
    pub lag_days: usize,
    pub causal_direction: CausalDirection,
    pub strength: CorrelationStrength,
    pub is_actionable: bool,
}

impl From<&CorrelationRecord> for CorrelationFinding {
    fn from(record: &CorrelationRecord) -> Self {
        Self {
            metric_a: record.metric_a,
            metric_b: record.metric_b,
            correlation_type: record.correlation_type,
            correlation_value: record.correlation_value,
            lag_days: record.lag_days,
            causal_direction: record.causal_direction,
            strength: record.strength,
            is_actionable: record.is_actionable,
        }
    }
}

/// 相関レコードの集計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub total_correlations: usize,
    pub significant_correlations: usize,
    pub actionable_count: usize,
    pub by_type: BTreeMap<CorrelationType, usize>,
    pub by_strength: BTreeMap<CorrelationStrength, usize>,
    pub top_findings: Vec<CorrelationFinding>,
}

impl CorrelationSummary {
    pub const TOP_FINDINGS: usize = 5;

    /// ランク済みレコードから集計（上位は行動可能なものを優先）
    pub fn from_records(records: &[CorrelationRecord]) -> Self {
        let mut summary = Self {
            total_correlations: records.len(),
            ..Self::default()
        };
        for record in records {
            if record.is_significant {
                summary.significant_correlations += 1;
            }
            if record.is_actionable {
                summary.actionable_count += 1;
            }
            *summary.by_type.entry(record.correlation_type).or_insert(0) += 1;
            *summary.by_strength.entry(record.strength).or_insert(0) += 1;
        }

        let actionable = records.iter().filter(|r| r.is_actionable);
        let rest = records.iter().filter(|r| !r.is_actionable);
        summary.top_findings = actionable
            .chain(rest)
            .take(Self::TOP_FINDINGS)
            .map(CorrelationFinding::from)
            .collect();
        summary
    }
}

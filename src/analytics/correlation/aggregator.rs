//! Correlation Aggregator
//!
//! 手法ごとの候補を統合する。レコードは手法ごとに保持し、
//! 複数手法の一致に応じて信頼度を加算する

use super::types::{CorrelationCandidate, CorrelationRecord, CorrelationStrength};
use crate::analytics::features::Metric;
use crate::config::CorrelationConfig;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// 相関集約器
pub struct CorrelationAggregator<'a> {
    config: &'a CorrelationConfig,
}

impl<'a> CorrelationAggregator<'a> {
    pub fn new(config: &'a CorrelationConfig) -> Self {
        Self { config }
    }

    /// 2 つの候補が同じ関係を支持するか
    ///
    /// 符号を持つ手法同士は符号一致、ラグを持つ手法同士はラグ差が許容範囲内。
    pub fn agrees(&self, x: &CorrelationCandidate, y: &CorrelationCandidate) -> bool {
        let (tx, ty) = (x.correlation_type, y.correlation_type);
        if tx == ty {
            return false;
        }
        let sign_ok = !(tx.is_signed() && ty.is_signed()) || x.value.signum() == y.value.signum();
        let lag_ok = !(tx.has_lag() && ty.has_lag())
            || x.lag_days.abs_diff(y.lag_days) <= self.config.lag_tolerance_days;
        sign_ok && lag_ok
    }

    /// 候補を集約してレコード化（閾値未満は破棄）
    pub fn aggregate(
        &self,
        user_id: Uuid,
        candidates: Vec<CorrelationCandidate>,
        min_confidence: f64,
        detected_at: DateTime<Utc>,
    ) -> Vec<CorrelationRecord> {
        let mut by_pair: BTreeMap<(Metric, Metric), Vec<CorrelationCandidate>> = BTreeMap::new();
        for candidate in candidates {
            by_pair
                .entry((candidate.metric_a, candidate.metric_b))
                .or_default()
                .push(candidate);
        }

        let mut records = Vec::new();
        let mut discarded = 0usize;
        for group in by_pair.values() {
            for candidate in group {
                let agreeing = group
                    .iter()
                    .filter(|other| self.agrees(candidate, other))
                    .count();
                match self.to_record(user_id, candidate, agreeing, min_confidence, detected_at) {
                    Some(record) => records.push(record),
                    None => discarded += 1,
                }
            }
        }

        rank(&mut records);
        debug!(
            kept = records.len(),
            discarded,
            "Correlation candidates aggregated"
        );
        records
    }

    fn to_record(
        &self,
        user_id: Uuid,
        candidate: &CorrelationCandidate,
        agreeing: usize,
        min_confidence: f64,
        detected_at: DateTime<Utc>,
    ) -> Option<CorrelationRecord> {
        if !candidate.value.is_finite() {
            return None;
        }
        let strength = CorrelationStrength::from_magnitude(candidate.value, self.config.weak_floor)?;
        let confidence = (candidate.confidence + self.config.agreement_bonus * agreeing as f64)
            .clamp(0.0, 1.0);
        if !confidence.is_finite() || confidence < min_confidence {
            return None;
        }

        let mut details = candidate.details.clone();
        details.agreeing_methods = agreeing;

        Some(CorrelationRecord {
            id: Uuid::new_v4(),
            user_id,
            metric_a: candidate.metric_a,
            metric_b: candidate.metric_b,
            correlation_type: candidate.correlation_type,
            correlation_value: candidate.value,
            p_value: candidate.p_value,
            lag_days: candidate.lag_days,
            causal_direction: candidate.causal_direction,
            strength,
            confidence_score: confidence,
            is_significant: true,
            // 母集団比較を行わない場合は非常に強い相関のみ
            is_actionable: strength == CorrelationStrength::VeryStrong,
            sample_size: candidate.sample_size,
            insight: None,
            recommendation: None,
            details,
            detected_at,
        })
    }
}

/// 信頼度降順 → |値| 降順 → ペア名 → 手法
pub fn rank(records: &mut [CorrelationRecord]) {
    records.sort_by(|x, y| {
        y.confidence_score
            .total_cmp(&x.confidence_score)
            .then_with(|| y.correlation_value.abs().total_cmp(&x.correlation_value.abs()))
            .then_with(|| x.metric_a.as_str().cmp(y.metric_a.as_str()))
            .then_with(|| x.metric_b.as_str().cmp(y.metric_b.as_str()))
            .then_with(|| x.correlation_type.cmp(&y.correlation_type))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::correlation::types::{CausalDirection, CorrelationDetails, CorrelationType};

    fn candidate(
        correlation_type: CorrelationType,
        value: f64,
        lag_days: usize,
        confidence: f64,
    ) -> CorrelationCandidate {
        CorrelationCandidate {
            metric_a: Metric::ExerciseMinutes,
            metric_b: Metric::SleepQuality,
            correlation_type,
            value,
            p_value: Some(0.01),
            lag_days,
            causal_direction: CausalDirection::None,
            confidence,
            sample_size: 60,
            details: CorrelationDetails::default(),
        }
    }

    #[test]
    fn test_agreement_raises_confidence() {
        let config = CorrelationConfig::default();
        let aggregator = CorrelationAggregator::new(&config);
        let records = aggregator.aggregate(
            Uuid::new_v4(),
            vec![
                candidate(CorrelationType::Pearson, 0.6, 0, 0.5),
                candidate(CorrelationType::CrossCorrelation, 0.62, 1, 0.5),
                candidate(CorrelationType::MutualInfo, 0.55, 0, 0.4),
            ],
            0.3,
            Utc::now(),
        );
        assert_eq!(records.len(), 3);
        let pearson = records
            .iter()
            .find(|r| r.correlation_type == CorrelationType::Pearson)
            .unwrap();
        assert_eq!(pearson.details.agreeing_methods, 2);
        assert!((pearson.confidence_score - 0.8).abs() < 1e-12);
        assert_eq!(pearson.strength, CorrelationStrength::Strong);
    }

    #[test]
    fn test_opposite_sign_does_not_agree() {
        let config = CorrelationConfig::default();
        let aggregator = CorrelationAggregator::new(&config);
        let pearson = candidate(CorrelationType::Pearson, 0.6, 0, 0.5);
        let cross = candidate(CorrelationType::CrossCorrelation, -0.6, 0, 0.5);
        let far_lag = candidate(CorrelationType::Granger, 0.6, 5, 0.5);
        assert!(!aggregator.agrees(&pearson, &cross));
        assert!(!aggregator.agrees(&far_lag, &candidate(CorrelationType::CrossCorrelation, 0.6, 1, 0.5)));
        assert!(aggregator.agrees(&pearson, &far_lag));
    }

    #[test]
    fn test_weak_and_low_confidence_are_discarded() {
        let config = CorrelationConfig::default();
        let aggregator = CorrelationAggregator::new(&config);
        let records = aggregator.aggregate(
            Uuid::new_v4(),
            vec![
                candidate(CorrelationType::Pearson, 0.15, 0, 0.9),
                candidate(CorrelationType::Granger, 0.45, 3, 0.1),
            ],
            0.3,
            Utc::now(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_ranking_by_confidence() {
        let config = CorrelationConfig::default();
        let aggregator = CorrelationAggregator::new(&config);
        let mut strong = candidate(CorrelationType::Pearson, 0.9, 0, 0.9);
        strong.metric_a = Metric::CarbsG;
        strong.metric_b = Metric::GlucoseFasting;
        let records = aggregator.aggregate(
            Uuid::new_v4(),
            vec![candidate(CorrelationType::Pearson, 0.4, 0, 0.4), strong],
            0.3,
            Utc::now(),
        );
        assert_eq!(records[0].metric_a, Metric::CarbsG);
        assert!(records[0].is_actionable);
        assert!(!records[1].is_actionable);
    }
}

//! Pearson Correlation

use super::method::{CorrelationMethod, MetricPair};
use super::stats::{pearson, pearson_p_value};
use super::types::{CausalDirection, CorrelationCandidate, CorrelationDetails, CorrelationType};
use crate::analytics::features::Metric;
use crate::config::CorrelationConfig;

/// 線形相関（両側 t 検定）
pub struct PearsonMethod {
    min_overlap: usize,
    significance_level: f64,
    min_abs_correlation: f64,
}

impl PearsonMethod {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            min_overlap: config.min_overlap,
            significance_level: config.significance_level,
            min_abs_correlation: config.min_abs_correlation,
        }
    }

    /// 係数と p 値から候補を判定（p < α かつ |r| ≥ 最小値）
    pub fn evaluate(
        &self,
        metric_a: Metric,
        metric_b: Metric,
        r: f64,
        p_value: f64,
        sample_size: usize,
    ) -> Option<CorrelationCandidate> {
        if !r.is_finite() || !p_value.is_finite() {
            return None;
        }
        if p_value >= self.significance_level || r.abs() < self.min_abs_correlation {
            return None;
        }

        Some(CorrelationCandidate {
            metric_a,
            metric_b,
            correlation_type: CorrelationType::Pearson,
            value: r,
            p_value: Some(p_value),
            lag_days: 0,
            causal_direction: CausalDirection::None,
            confidence: ((1.0 - p_value) * r.abs()).clamp(0.0, 1.0),
            sample_size,
            details: CorrelationDetails::default(),
        })
    }
}

impl CorrelationMethod for PearsonMethod {
    fn correlation_type(&self) -> CorrelationType {
        CorrelationType::Pearson
    }

    fn analyze(&self, pair: &MetricPair) -> Option<CorrelationCandidate> {
        let (x, y) = pair.aligned();
        if x.len() < self.min_overlap {
            return None;
        }
        let r = pearson(&x, &y)?;
        let p = pearson_p_value(r, x.len())?;
        self.evaluate(pair.metric_a, pair.metric_b, r, p, x.len())
    }
}

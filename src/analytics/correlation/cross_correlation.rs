//! Lagged Cross-Correlation

use super::method::{CorrelationMethod, MetricPair};
use super::stats::{aligned_pairs, pearson, pearson_p_value};
use super::types::{CausalDirection, CorrelationCandidate, CorrelationDetails, CorrelationType};
use crate::analytics::features::Metric;
use crate::config::CorrelationConfig;

/// 1 つのラグでの相関
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaggedCorrelation {
    pub lag: usize,
    /// true なら metric_a が先行（a[t] と b[t+lag] を比較）
    pub a_leads: bool,
    pub r: f64,
    pub sample_size: usize,
}

/// `leader[t]` と `follower[t + lag]` の相関
pub fn lagged_correlation(
    leader: &[Option<f64>],
    follower: &[Option<f64>],
    lag: usize,
) -> Option<(f64, usize)> {
    if lag >= leader.len() || leader.len() != follower.len() {
        return None;
    }
    let (x, y) = aligned_pairs(&leader[..leader.len() - lag], &follower[lag..]);
    let r = pearson(&x, &y)?;
    Some((r, x.len()))
}

/// 両方向・ラグ 0..=max_lag を走査して |r| 最大のラグを返す
pub fn scan_lags(
    a: &[Option<f64>],
    b: &[Option<f64>],
    max_lag: usize,
    min_pairs: usize,
) -> Option<LaggedCorrelation> {
    let mut best: Option<LaggedCorrelation> = None;
    for lag in 0..=max_lag {
        let directions: &[bool] = if lag == 0 { &[true] } else { &[true, false] };
        for &a_leads in directions {
            let result = if a_leads {
                lagged_correlation(a, b, lag)
            } else {
                lagged_correlation(b, a, lag)
            };
            let Some((r, sample_size)) = result else {
                continue;
            };
            if sample_size < min_pairs {
                continue;
            }
            // 同値なら短いラグを優先
            if best.map_or(true, |current| r.abs() > current.r.abs()) {
                best = Some(LaggedCorrelation {
                    lag,
                    a_leads,
                    r,
                    sample_size,
                });
            }
        }
    }
    best
}

/// ラグ付き相互相関
pub struct CrossCorrelationMethod {
    min_overlap: usize,
    max_lag: usize,
    significance_level: f64,
    min_abs_correlation: f64,
}

impl CrossCorrelationMethod {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            min_overlap: config.min_overlap,
            max_lag: config.cross_correlation_max_lag,
            significance_level: config.significance_level,
            min_abs_correlation: config.min_abs_correlation,
        }
    }

    fn leading_metric(pair: &MetricPair, best: &LaggedCorrelation) -> Option<Metric> {
        match (best.lag, best.a_leads) {
            (0, _) => None,
            (_, true) => Some(pair.metric_a),
            (_, false) => Some(pair.metric_b),
        }
    }
}

impl CorrelationMethod for CrossCorrelationMethod {
    fn correlation_type(&self) -> CorrelationType {
        CorrelationType::CrossCorrelation
    }

    fn analyze(&self, pair: &MetricPair) -> Option<CorrelationCandidate> {
        if pair.overlap() < self.min_overlap {
            return None;
        }
        let best = scan_lags(&pair.series_a, &pair.series_b, self.max_lag, self.min_overlap)?;
        let p_value = pearson_p_value(best.r, best.sample_size)?;
        if p_value >= self.significance_level || best.r.abs() < self.min_abs_correlation {
            return None;
        }

        Some(CorrelationCandidate {
            metric_a: pair.metric_a,
            metric_b: pair.metric_b,
            correlation_type: CorrelationType::CrossCorrelation,
            value: best.r,
            p_value: Some(p_value),
            lag_days: best.lag,
            causal_direction: CausalDirection::None,
            confidence: ((1.0 - p_value) * best.r.abs()).clamp(0.0, 1.0),
            sample_size: best.sample_size,
            details: CorrelationDetails {
                leading_metric: Self::leading_metric(pair, &best),
                ..CorrelationDetails::default()
            },
        })
    }
}

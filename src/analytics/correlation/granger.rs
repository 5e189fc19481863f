//! Granger Causality
//!
//! 制限モデル（自己ラグのみ）と非制限モデル（相手のラグを追加）の F 検定で
//! 一方の履歴が他方の予測を改善するかを判定する

use super::method::{CorrelationMethod, MetricPair};
use super::stats::{difference, f_test_p_value, is_stationary, ols_rss};
use super::types::{CausalDirection, CorrelationCandidate, CorrelationDetails, CorrelationType};
use crate::config::CorrelationConfig;
use ndarray::{Array1, Array2};
use tracing::debug;

/// 一方向の検定結果（最小 p 値のラグ）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrangerTest {
    pub lag: usize,
    pub f_statistic: f64,
    pub p_value: f64,
    /// √((RSS_r − RSS_u) / RSS_r)
    pub partial_correlation: f64,
}

/// 単一ラグで「cause の過去が effect を説明するか」を検定
pub fn granger_test_at_lag(cause: &[f64], effect: &[f64], lag: usize) -> Option<GrangerTest> {
    let n = effect.len();
    if lag == 0 || cause.len() != n || n <= lag {
        return None;
    }
    let n_obs = n - lag;
    let restricted_cols = 1 + lag;
    let unrestricted_cols = 1 + 2 * lag;
    if n_obs <= unrestricted_cols {
        return None;
    }

    let mut restricted = Array2::<f64>::zeros((n_obs, restricted_cols));
    let mut unrestricted = Array2::<f64>::zeros((n_obs, unrestricted_cols));
    let mut target = Array1::<f64>::zeros(n_obs);
    for row in 0..n_obs {
        let t = row + lag;
        target[row] = effect[t];
        restricted[[row, 0]] = 1.0;
        unrestricted[[row, 0]] = 1.0;
        for k in 1..=lag {
            restricted[[row, k]] = effect[t - k];
            unrestricted[[row, k]] = effect[t - k];
            unrestricted[[row, lag + k]] = cause[t - k];
        }
    }

    let rss_r = ols_rss(&restricted, &target)?;
    let rss_u = ols_rss(&unrestricted, &target)?;
    if rss_r <= 1e-12 || rss_u <= 1e-12 {
        return None;
    }

    let d1 = lag as f64;
    let d2 = (n_obs - unrestricted_cols) as f64;
    let f_statistic = (((rss_r - rss_u) / d1) / (rss_u / d2)).max(0.0);
    let p_value = f_test_p_value(f_statistic, d1, d2)?;
    let partial_correlation = ((rss_r - rss_u).max(0.0) / rss_r).sqrt().min(1.0);

    Some(GrangerTest {
        lag,
        f_statistic,
        p_value,
        partial_correlation,
    })
}

/// ラグ 1..=max_lag を走査し最小 p 値の結果を返す
pub fn best_granger_test(cause: &[f64], effect: &[f64], max_lag: usize) -> Option<GrangerTest> {
    (1..=max_lag)
        .filter_map(|lag| granger_test_at_lag(cause, effect, lag))
        .min_by(|a, b| a.p_value.total_cmp(&b.p_value).then(a.lag.cmp(&b.lag)))
}

/// 非定常な系列を差分化し、長さを揃える
///
/// 戻り値の bool はいずれかの系列を差分化したか。
pub fn make_stationary(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>, bool) {
    let diff_a = !is_stationary(a);
    let diff_b = !is_stationary(b);
    if !diff_a && !diff_b {
        return (a.to_vec(), b.to_vec(), false);
    }
    let a = if diff_a { difference(a) } else { a[1..].to_vec() };
    let b = if diff_b { difference(b) } else { b[1..].to_vec() };
    (a, b, true)
}

/// グレンジャー因果性
pub struct GrangerMethod {
    min_overlap: usize,
    max_lag: usize,
    significance_level: f64,
}

impl GrangerMethod {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            min_overlap: config.min_overlap,
            max_lag: config.granger_max_lag,
            significance_level: config.significance_level,
        }
    }
}

impl CorrelationMethod for GrangerMethod {
    fn correlation_type(&self) -> CorrelationType {
        CorrelationType::Granger
    }

    fn analyze(&self, pair: &MetricPair) -> Option<CorrelationCandidate> {
        let (a, b) = pair.aligned();
        if a.len() < self.min_overlap {
            return None;
        }
        let (a, b, differenced) = make_stationary(&a, &b);

        let a_to_b = best_granger_test(&a, &b, self.max_lag);
        let b_to_a = best_granger_test(&b, &a, self.max_lag);
        let significant = |test: &Option<GrangerTest>| {
            test.is_some_and(|t| t.p_value < self.significance_level)
        };
        let direction = CausalDirection::from_significance(significant(&a_to_b), significant(&b_to_a));
        debug!(
            metric_a = %pair.metric_a,
            metric_b = %pair.metric_b,
            direction = ?direction,
            differenced,
            "Granger test finished"
        );

        let best = match direction {
            CausalDirection::None => return None,
            CausalDirection::ACausesB => a_to_b?,
            CausalDirection::BCausesA => b_to_a?,
            CausalDirection::Bidirectional => {
                let (ab, ba) = (a_to_b?, b_to_a?);
                if ba.p_value < ab.p_value {
                    ba
                } else {
                    ab
                }
            }
        };

        Some(CorrelationCandidate {
            metric_a: pair.metric_a,
            metric_b: pair.metric_b,
            correlation_type: CorrelationType::Granger,
            value: best.partial_correlation,
            p_value: Some(best.p_value),
            lag_days: best.lag,
            causal_direction: direction,
            confidence: ((1.0 - best.p_value) * best.partial_correlation).clamp(0.0, 1.0),
            sample_size: a.len(),
            details: CorrelationDetails {
                f_statistic: Some(best.f_statistic),
                p_value_a_to_b: a_to_b.map(|t| t.p_value),
                p_value_b_to_a: b_to_a.map(|t| t.p_value),
                differenced,
                ..CorrelationDetails::default()
            },
        })
    }
}

//! Metric Baselines
//!
//! メトリクスごとの基準値（中心とばらつき）を計算する純粋関数群

use crate::analytics::features::Metric;
use crate::error::AnalysisSkip;
use serde::{Deserialize, Serialize};

/// 正規分布下で MAD を標準偏差に換算する係数
const MAD_TO_SIGMA: f64 = 1.4826;
/// 正規分布下で IQR を標準偏差に換算する除数
const IQR_TO_SIGMA: f64 = 1.349;
const MIN_SCALE: f64 = 1e-12;

/// 中心・ばらつきの計算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    /// 平均 / 標準偏差
    Classic,
    /// 中央値 / MAD
    Robust,
}

/// ベースライン計算の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineSettings {
    pub robust: bool,
    pub adaptive: bool,
    pub ewma_span: usize,
    pub min_observations: usize,
}

/// メトリクスのベースライン
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub metric: Metric,
    pub method: BaselineMethod,
    /// EWMA で中心を求めたか
    pub adaptive: bool,
    pub center: f64,
    pub scale: f64,
    pub observations: usize,
}

impl Baseline {
    /// 標準化スコア
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// 日付順の非 null 値からベースラインを計算
///
/// 観測数不足・ばらつきゼロ・非有限値はエラーではなくスキップとして返す。
pub fn compute_baseline(
    metric: Metric,
    values: &[f64],
    settings: &BaselineSettings,
) -> std::result::Result<Baseline, AnalysisSkip> {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if values.len() < settings.min_observations.max(2) {
        return Err(AnalysisSkip::InsufficientData {
            metric,
            observed: values.len(),
            required: settings.min_observations.max(2),
        });
    }

    let method = if settings.robust {
        BaselineMethod::Robust
    } else {
        BaselineMethod::Classic
    };

    let (center, scale) = match (settings.adaptive, method) {
        (false, BaselineMethod::Classic) => (mean(&values), sample_std(&values)),
        (false, BaselineMethod::Robust) => (median(&values), robust_scale(&values)),
        (true, BaselineMethod::Classic) => ewma_with_std(&values, settings.ewma_span),
        (true, BaselineMethod::Robust) => {
            let (center, _) = ewma_with_std(&values, settings.ewma_span);
            (center, robust_scale(&values))
        }
    };

    if !center.is_finite() || !scale.is_finite() {
        return Err(AnalysisSkip::NumericFailure {
            context: format!("baseline for {}", metric),
        });
    }
    if scale <= MIN_SCALE {
        return Err(AnalysisSkip::DegenerateScale { metric });
    }

    Ok(Baseline {
        metric,
        method,
        adaptive: settings.adaptive,
        center,
        scale,
        observations: values.len(),
    })
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 標本標準偏差（n-1）
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// 線形補間による分位点
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// 1.4826·MAD、MAD が 0 の場合は IQR/1.349
pub fn robust_scale(values: &[f64]) -> f64 {
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations);
    if mad > MIN_SCALE {
        return MAD_TO_SIGMA * mad;
    }
    (quantile(values, 0.75) - quantile(values, 0.25)) / IQR_TO_SIGMA
}

/// 指数加重移動平均と指数加重標準偏差（α = 2 / (span + 1)）
pub fn ewma_with_std(values: &[f64], span: usize) -> (f64, f64) {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut avg = values[0];
    let mut var = 0.0;
    for &x in &values[1..] {
        let diff = x - avg;
        avg += alpha * diff;
        var = (1.0 - alpha) * (var + alpha * diff * diff);
    }
    (avg, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(robust: bool, adaptive: bool) -> BaselineSettings {
        BaselineSettings {
            robust,
            adaptive,
            ewma_span: 7,
            min_observations: 14,
        }
    }

    fn alternating(n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { 6.8 } else { 7.6 }).collect()
    }

    #[test]
    fn test_classic_baseline() {
        let values = alternating(20);
        let baseline = compute_baseline(Metric::SleepHours, &values, &settings(false, false)).unwrap();
        assert_eq!(baseline.method, BaselineMethod::Classic);
        assert!((baseline.center - 7.2).abs() < 1e-9);
        assert!(baseline.scale > 0.4 && baseline.scale < 0.42);
        assert_eq!(baseline.observations, 20);
    }

    #[test]
    fn test_robust_baseline_resists_outlier() {
        let mut values: Vec<f64> = (0..30).map(|i| [6.8, 7.2, 7.6][i % 3]).collect();
        values.push(1.0);
        let baseline = compute_baseline(Metric::SleepHours, &values, &settings(true, false)).unwrap();
        assert!((baseline.center - 7.2).abs() < 1e-9);
        assert!((baseline.scale - MAD_TO_SIGMA * 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_robust_falls_back_to_iqr() {
        // more than half the values are identical, so MAD is zero
        let mut values = vec![5.0; 10];
        values.extend([4.0, 6.0, 7.0, 3.0, 8.0, 9.0]);
        let baseline = compute_baseline(Metric::RestingHr, &values, &settings(true, false)).unwrap();
        let iqr = quantile(&values, 0.75) - quantile(&values, 0.25);
        assert!(iqr > 0.0);
        assert!((baseline.scale - iqr / IQR_TO_SIGMA).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_data_is_a_skip() {
        let skip = compute_baseline(Metric::HrvMs, &[50.0; 13], &settings(false, false)).unwrap_err();
        assert_eq!(
            skip,
            AnalysisSkip::InsufficientData {
                metric: Metric::HrvMs,
                observed: 13,
                required: 14
            }
        );
    }

    #[test]
    fn test_zero_variance_is_a_skip() {
        for (robust, adaptive) in [(false, false), (true, false), (false, true), (true, true)] {
            let skip =
                compute_baseline(Metric::Spo2, &[97.0; 20], &settings(robust, adaptive)).unwrap_err();
            assert_eq!(skip, AnalysisSkip::DegenerateScale { metric: Metric::Spo2 });
        }
    }

    #[test]
    fn test_adaptive_center_follows_recent_values() {
        let mut values = vec![60.0; 20];
        values.extend(vec![70.0; 10]);
        values[3] = 61.0;
        let baseline = compute_baseline(Metric::RestingHr, &values, &settings(false, true)).unwrap();
        assert!(baseline.adaptive);
        assert!(baseline.center > 69.0);
        let static_baseline =
            compute_baseline(Metric::RestingHr, &values, &settings(false, false)).unwrap();
        assert!(static_baseline.center < 64.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(median(&values), 2.5);
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
    }
}

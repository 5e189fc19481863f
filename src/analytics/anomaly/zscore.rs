//! Z-Score Detector
//!
//! メトリクス単位の統計的異常検知（Z-スコア + 医学的絶対範囲）

use super::types::ZScoreFlag;
use crate::analytics::baseline::{compute_baseline, Baseline, BaselineSettings};
use crate::analytics::features::{FeatureMatrix, Metric};
use crate::config::{AnomalyConfig, MedicalBounds};
use crate::error::AnalysisSkip;
use tracing::debug;

/// 単一値の判定結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreEvaluation {
    pub z_score: f64,
    pub bounds_violation: bool,
    /// min(|z| / threshold, 1.0)
    pub score: f64,
}

/// 値をベースラインと比較して判定
///
/// |z| が閾値を厳密に超えるか、医学的範囲外の場合にのみ `Some` を返す。
pub fn evaluate(
    value: f64,
    baseline: &Baseline,
    threshold: f64,
    bounds: Option<MedicalBounds>,
) -> Option<ZScoreEvaluation> {
    if !value.is_finite() {
        return None;
    }
    let z_score = baseline.z_score(value);
    if !z_score.is_finite() || !(threshold > 0.0) {
        return None;
    }

    let z_flag = z_score.abs() > threshold;
    let bounds_violation = bounds.is_some_and(|b| b.violated_by(value));
    if !z_flag && !bounds_violation {
        return None;
    }

    Some(ZScoreEvaluation {
        z_score,
        bounds_violation,
        score: (z_score.abs() / threshold).clamp(0.0, 1.0),
    })
}

/// Z-スコア検知の結果
#[derive(Debug, Clone, Default)]
pub struct ZScoreOutcome {
    pub flags: Vec<ZScoreFlag>,
    pub baselines: Vec<Baseline>,
    pub skipped: Vec<AnalysisSkip>,
}

/// Z-スコア検知器
pub struct ZScoreDetector<'a> {
    config: &'a AnomalyConfig,
    settings: BaselineSettings,
}

impl<'a> ZScoreDetector<'a> {
    /// 新しい検知器を作成（robust / adaptive は独立に切り替え可能）
    pub fn new(config: &'a AnomalyConfig, robust: bool, adaptive: bool) -> Self {
        Self {
            config,
            settings: BaselineSettings {
                robust,
                adaptive,
                ewma_span: config.ewma_span,
                min_observations: config.min_observations,
            },
        }
    }

    /// 行列の元データ由来メトリクスを検知
    ///
    /// `evaluation_days` を指定すると直近 N 日のみ判定する（未指定時は窓全体）。
    pub fn detect(&self, matrix: &FeatureMatrix, evaluation_days: Option<usize>) -> ZScoreOutcome {
        let window = matrix.trailing(self.config.baseline_window_days);
        let eval_len = evaluation_days.unwrap_or(window.len()).min(window.len());
        let evaluated = &window[window.len() - eval_len..];
        let mut outcome = ZScoreOutcome::default();

        for metric in Metric::base_metrics() {
            let values: Vec<f64> = window.iter().filter_map(|row| row.get(metric)).collect();
            if values.is_empty() {
                continue;
            }

            let baseline = match compute_baseline(metric, &values, &self.settings) {
                Ok(baseline) => baseline,
                Err(skip) => {
                    debug!(metric = %metric, reason = %skip, "Skipping metric");
                    outcome.skipped.push(skip);
                    continue;
                }
            };

            let threshold = self.config.threshold_for(metric);
            let bounds = self.config.bounds_for(metric);

            for row in evaluated {
                let Some(value) = row.get(metric) else {
                    continue;
                };
                if let Some(eval) = evaluate(value, &baseline, threshold, bounds) {
                    outcome.flags.push(ZScoreFlag {
                        date: row.date,
                        metric,
                        value,
                        baseline,
                        z_score: eval.z_score,
                        threshold,
                        bounds_violation: eval.bounds_violation,
                        score: eval.score,
                    });
                }
            }
            outcome.baselines.push(baseline);
        }

        debug!(
            flags = outcome.flags.len(),
            baselines = outcome.baselines.len(),
            skipped = outcome.skipped.len(),
            "Z-score detection finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::baseline::BaselineMethod;
    use crate::analytics::features::DailyFeatureVector;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn baseline(center: f64, scale: f64) -> Baseline {
        Baseline {
            metric: Metric::SleepHours,
            method: BaselineMethod::Classic,
            adaptive: false,
            center,
            scale,
            observations: 30,
        }
    }

    fn matrix(values: &[Option<f64>], metric: Metric) -> FeatureMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut row =
                    DailyFeatureVector::empty(Uuid::nil(), start + Duration::days(i as i64));
                row.set(metric, *v);
                row
            })
            .collect();
        FeatureMatrix {
            user_id: Uuid::nil(),
            start_date: start,
            end_date: start + Duration::days(values.len() as i64 - 1),
            rows,
        }
    }

    #[test]
    fn test_value_at_threshold_is_not_flagged() {
        let b = baseline(10.0, 2.0);
        assert!(evaluate(15.0, &b, 2.5, None).is_none());
        assert!(evaluate(5.0, &b, 2.5, None).is_none());

        let eval = evaluate(16.0, &b, 2.5, None).unwrap();
        assert_eq!(eval.z_score, 3.0);
        assert_eq!(eval.score, 1.0);
        assert!(!eval.bounds_violation);
    }

    #[test]
    fn test_bounds_trigger_independently() {
        let b = baseline(150.0, 10.0);
        let bounds = Some(MedicalBounds::new(70.0, 140.0));
        let eval = evaluate(155.0, &b, 2.5, bounds).unwrap();
        assert!(eval.bounds_violation);
        assert!((eval.score - 0.2).abs() < 1e-12);

        assert!(evaluate(140.0, &baseline(140.0, 10.0), 2.5, bounds).is_none());
    }

    #[test]
    fn test_non_finite_inputs_never_flag() {
        let b = baseline(10.0, 2.0);
        assert!(evaluate(f64::NAN, &b, 2.5, None).is_none());
        assert!(evaluate(100.0, &baseline(10.0, 0.0), 2.5, None).is_none());
    }

    #[test]
    fn test_detect_flags_injected_outlier() {
        let mut values: Vec<Option<f64>> =
            (0..30).map(|i| Some([6.8, 7.2, 7.6][i % 3])).collect();
        values[25] = Some(4.0);
        let m = matrix(&values, Metric::SleepHours);

        let config = AnomalyConfig::default();
        let outcome = ZScoreDetector::new(&config, true, false).detect(&m, None);
        assert_eq!(outcome.flags.len(), 1);
        let flag = &outcome.flags[0];
        assert_eq!(flag.date, m.rows[25].date);
        assert!(flag.z_score < -2.5);
        assert_eq!(flag.score, 1.0);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_evaluation_days_narrows_scope() {
        let mut values: Vec<Option<f64>> =
            (0..30).map(|i| Some([6.8, 7.2, 7.6][i % 3])).collect();
        values[5] = Some(4.0);
        let m = matrix(&values, Metric::SleepHours);

        let config = AnomalyConfig::default();
        let outcome = ZScoreDetector::new(&config, false, false).detect(&m, Some(7));
        assert!(outcome.flags.is_empty());
    }

    #[test]
    fn test_sparse_metric_is_skipped() {
        let values: Vec<Option<f64>> = (0..30)
            .map(|i| if i % 3 == 0 { Some(60.0 + i as f64) } else { None })
            .collect();
        let m = matrix(&values, Metric::RestingHr);

        let config = AnomalyConfig::default();
        let outcome = ZScoreDetector::new(&config, false, false).detect(&m, None);
        assert!(outcome.flags.is_empty());
        assert_eq!(
            outcome.skipped,
            vec![AnalysisSkip::InsufficientData {
                metric: Metric::RestingHr,
                observed: 10,
                required: 14
            }]
        );
    }
}

//! Multivariate Detector
//!
//! 日次特徴量行列全体に対する Isolation Forest 異常検知

use super::models::{IsolationForest, KMeans};
use super::types::{FeatureContribution, MultivariateFlag};
use crate::analytics::baseline::median;
use crate::analytics::features::{DailyFeatureVector, FeatureMatrix, Metric};
use crate::config::AnomalyConfig;
use crate::error::AnalysisSkip;
use ndarray::Array2;
use std::cmp::Ordering;
use tracing::debug;

/// 多変量検知の結果
#[derive(Debug, Clone, Default)]
pub struct MultivariateOutcome {
    pub flags: Vec<MultivariateFlag>,
    /// 今回の実行で使用した特徴量
    pub features_used: Vec<Metric>,
    /// 全特徴量が揃っていて判定対象になった日数
    pub evaluated_days: usize,
    pub skipped: Option<AnalysisSkip>,
}

impl MultivariateOutcome {
    fn skip(features_used: Vec<Metric>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!(reason = %reason, "Multivariate detector skipped");
        Self {
            features_used,
            skipped: Some(AnalysisSkip::Multivariate { reason }),
            ..Self::default()
        }
    }
}

/// Isolation Forest ベースの多変量検知器
pub struct MultivariateDetector<'a> {
    config: &'a AnomalyConfig,
}

impl<'a> MultivariateDetector<'a> {
    pub fn new(config: &'a AnomalyConfig) -> Self {
        Self { config }
    }

    /// ベースライン窓の日次行列を検知
    ///
    /// 欠損は列の中央値で補完して学習し、判定は全特徴量が揃った日のみ行う。
    pub fn detect(&self, matrix: &FeatureMatrix) -> MultivariateOutcome {
        let window = matrix.trailing(self.config.baseline_window_days);

        let mut features: Vec<Metric> = Vec::new();
        for metric in &self.config.multivariate_features {
            if !features.contains(metric) && window.iter().any(|r| r.get(*metric).is_some()) {
                features.push(*metric);
            }
        }
        if features.len() < self.config.min_features {
            return MultivariateOutcome::skip(
                features.clone(),
                format!(
                    "{} features available, {} required",
                    features.len(),
                    self.config.min_features
                ),
            );
        }

        let fit_rows: Vec<&DailyFeatureVector> = window
            .iter()
            .filter(|r| features.iter().any(|m| r.get(*m).is_some()))
            .collect();
        if fit_rows.len() < self.config.min_samples {
            return MultivariateOutcome::skip(
                features,
                format!(
                    "{} days with data, {} required",
                    fit_rows.len(),
                    self.config.min_samples
                ),
            );
        }

        let medians: Vec<f64> = features
            .iter()
            .map(|m| {
                let present: Vec<f64> = fit_rows.iter().filter_map(|r| r.get(*m)).collect();
                median(&present)
            })
            .collect();

        let imputed = Array2::from_shape_fn((fit_rows.len(), features.len()), |(i, j)| {
            fit_rows[i].get(features[j]).unwrap_or(medians[j])
        });
        let standardized = standardize(&imputed);
        if standardized.iter().any(|v| !v.is_finite()) {
            return MultivariateOutcome::skip(features, "non-finite value after standardization");
        }

        let forest = IsolationForest::fit(
            &standardized,
            self.config.n_trees,
            self.config.subsample_size,
            self.config.seed,
        );
        let raw_scores = forest.score_all(&standardized);

        let evaluated: Vec<usize> = (0..fit_rows.len())
            .filter(|&i| features.iter().all(|m| fit_rows[i].get(*m).is_some()))
            .collect();
        if evaluated.is_empty() {
            return MultivariateOutcome::skip(features, "no day has every feature present");
        }

        let (lo, hi) = evaluated
            .iter()
            .map(|&i| raw_scores[i])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s), hi.max(s))
            });
        if !(hi - lo > 1e-12) {
            return MultivariateOutcome::skip(features, "isolation scores have no spread");
        }

        // 汚染率ぶんの上位日（同点は日付の古い順）
        let mut ranked = evaluated.clone();
        ranked.sort_by(|&a, &b| {
            raw_scores[b]
                .partial_cmp(&raw_scores[a])
                .unwrap_or(Ordering::Equal)
                .then_with(|| fit_rows[a].date.cmp(&fit_rows[b].date))
        });
        let n_flagged = ((self.config.contamination * evaluated.len() as f64).ceil() as usize)
            .clamp(1, evaluated.len());
        let flagged: Vec<usize> = ranked.into_iter().take(n_flagged).collect();

        let normal: Vec<usize> = (0..fit_rows.len()).filter(|i| !flagged.contains(i)).collect();
        let reference = KMeans::fit(
            &standardized.select(ndarray::Axis(0), &normal),
            self.config.centroid_clusters,
        );

        let mut flags: Vec<MultivariateFlag> = flagged
            .iter()
            .map(|&i| {
                let point = standardized.row(i);
                let mut contributions: Vec<FeatureContribution> = features
                    .iter()
                    .enumerate()
                    .map(|(j, metric)| {
                        let center = reference.as_ref().map_or(0.0, |k| k.nearest(point)[j]);
                        FeatureContribution {
                            metric: *metric,
                            value: imputed[[i, j]],
                            reference_value: medians[j],
                            deviation: (point[j] - center).abs(),
                        }
                    })
                    .collect();
                contributions.sort_by(|a, b| {
                    b.deviation
                        .partial_cmp(&a.deviation)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.metric.cmp(&b.metric))
                });
                contributions.truncate(self.config.attribution_top_k);

                MultivariateFlag {
                    date: fit_rows[i].date,
                    score: ((raw_scores[i] - lo) / (hi - lo)).clamp(0.0, 1.0),
                    raw_score: raw_scores[i],
                    contributions,
                }
            })
            .collect();
        flags.sort_by_key(|f| f.date);

        debug!(
            features = features.len(),
            evaluated_days = evaluated.len(),
            flagged = flags.len(),
            "Multivariate detection finished"
        );

        MultivariateOutcome {
            flags,
            features_used: features,
            evaluated_days: evaluated.len(),
            skipped: None,
        }
    }
}

/// 列ごとに平均 0・標準偏差 1 へ変換（分散ゼロの列は 0 になる）
fn standardize(data: &Array2<f64>) -> Array2<f64> {
    let mut out = data.clone();
    for mut column in out.columns_mut() {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let divisor = if std > 1e-12 { std } else { 1.0 };
        column.mapv_inplace(|v| (v - mean) / divisor);
    }
    out
}

//! Correlation Method Interface

use super::stats::aligned_pairs;
use super::types::{CorrelationCandidate, CorrelationType};
use crate::analytics::features::Metric;

/// 日付順に揃えたメトリクスペア（metric_a < metric_b）
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPair {
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub series_a: Vec<Option<f64>>,
    pub series_b: Vec<Option<f64>>,
}

impl MetricPair {
    pub fn new(
        metric_a: Metric,
        metric_b: Metric,
        series_a: Vec<Option<f64>>,
        series_b: Vec<Option<f64>>,
    ) -> Self {
        Self {
            metric_a,
            metric_b,
            series_a,
            series_b,
        }
    }

    /// 両方に値がある日数
    pub fn overlap(&self) -> usize {
        self.series_a
            .iter()
            .zip(&self.series_b)
            .filter(|(a, b)| a.is_some() && b.is_some())
            .count()
    }

    /// 欠損を除いた対応値
    pub fn aligned(&self) -> (Vec<f64>, Vec<f64>) {
        aligned_pairs(&self.series_a, &self.series_b)
    }
}

/// 相関検出手法の共通インターフェース
pub trait CorrelationMethod: Send + Sync {
    fn correlation_type(&self) -> CorrelationType;

    /// ペアを評価し、有意な場合のみ候補を返す
    fn analyze(&self, pair: &MetricPair) -> Option<CorrelationCandidate>;
}

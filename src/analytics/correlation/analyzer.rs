//! Correlation Analyzer
//!
//! 特徴量行列のメトリクスペアに対して有効な手法を実行し、候補を収集する

use super::cross_correlation::CrossCorrelationMethod;
use super::granger::GrangerMethod;
use super::method::{CorrelationMethod, MetricPair};
use super::mutual_info::MutualInfoMethod;
use super::pearson::PearsonMethod;
use super::types::{ordered_pair, CorrelationCandidate, CorrelationType};
use crate::analytics::features::{FeatureMatrix, Metric};
use crate::config::CorrelationConfig;
use crate::error::AnalysisSkip;
use tracing::debug;

/// 実行する手法の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSelection {
    pub pearson: bool,
    pub granger: bool,
    pub cross_correlation: bool,
    pub mutual_info: bool,
}

impl Default for MethodSelection {
    fn default() -> Self {
        Self {
            pearson: true,
            granger: true,
            cross_correlation: true,
            mutual_info: true,
        }
    }
}

impl MethodSelection {
    pub fn includes(&self, correlation_type: CorrelationType) -> bool {
        match correlation_type {
            CorrelationType::Pearson => self.pearson,
            CorrelationType::Granger => self.granger,
            CorrelationType::CrossCorrelation => self.cross_correlation,
            CorrelationType::MutualInfo => self.mutual_info,
        }
    }

    pub fn is_empty(&self) -> bool {
        !CorrelationType::ALL.iter().any(|t| self.includes(*t))
    }
}

/// 解析結果
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub candidates: Vec<CorrelationCandidate>,
    pub pairs_tested: usize,
    pub skipped: Vec<AnalysisSkip>,
}

/// 相関解析器
pub struct CorrelationAnalyzer<'a> {
    config: &'a CorrelationConfig,
}

impl<'a> CorrelationAnalyzer<'a> {
    pub fn new(config: &'a CorrelationConfig) -> Self {
        Self { config }
    }

    fn methods(&self, selection: MethodSelection) -> Vec<Box<dyn CorrelationMethod>> {
        let mut methods: Vec<Box<dyn CorrelationMethod>> = Vec::new();
        if selection.pearson {
            methods.push(Box::new(PearsonMethod::new(self.config)));
        }
        if selection.granger {
            methods.push(Box::new(GrangerMethod::new(self.config)));
        }
        if selection.cross_correlation {
            methods.push(Box::new(CrossCorrelationMethod::new(self.config)));
        }
        if selection.mutual_info {
            methods.push(Box::new(MutualInfoMethod::new(self.config)));
        }
        methods
    }

    /// 解析対象メトリクス（十分な観測数があるもの）
    pub fn eligible_metrics(&self, matrix: &FeatureMatrix) -> (Vec<Metric>, Vec<AnalysisSkip>) {
        let mut eligible = Vec::new();
        let mut skipped = Vec::new();
        for metric in Metric::ALL {
            if metric.is_derived() && !self.config.include_derived {
                continue;
            }
            let observed = matrix.non_null_count(metric);
            if observed >= self.config.min_overlap {
                eligible.push(metric);
            } else if observed > 0 {
                skipped.push(AnalysisSkip::InsufficientData {
                    metric,
                    observed,
                    required: self.config.min_overlap,
                });
            }
        }
        (eligible, skipped)
    }

    /// 重なりが min_overlap 以上のペア（metric_a < metric_b、名前順）
    pub fn candidate_pairs(&self, matrix: &FeatureMatrix, metrics: &[Metric]) -> Vec<MetricPair> {
        let mut keys: Vec<(Metric, Metric)> = Vec::new();
        for (i, &first) in metrics.iter().enumerate() {
            for &second in &metrics[i + 1..] {
                keys.push(ordered_pair(first, second));
            }
        }
        keys.sort_by(|x, y| {
            (x.0.as_str(), x.1.as_str()).cmp(&(y.0.as_str(), y.1.as_str()))
        });

        keys.into_iter()
            .map(|(a, b)| MetricPair::new(a, b, matrix.column(a), matrix.column(b)))
            .filter(|pair| pair.overlap() >= self.config.min_overlap)
            .collect()
    }

    /// 全ペアに選択された手法を実行
    pub fn analyze(&self, matrix: &FeatureMatrix, selection: MethodSelection) -> AnalysisOutcome {
        if matrix.is_empty() {
            return AnalysisOutcome {
                skipped: vec![AnalysisSkip::EmptyFeatureMatrix],
                ..AnalysisOutcome::default()
            };
        }

        let (metrics, skipped) = self.eligible_metrics(matrix);
        for skip in &skipped {
            debug!(reason = %skip, "Skipping metric for correlation");
        }
        let pairs = self.candidate_pairs(matrix, &metrics);
        let methods = self.methods(selection);

        let mut candidates = Vec::new();
        for pair in &pairs {
            for method in &methods {
                if let Some(candidate) = method.analyze(pair) {
                    candidates.push(candidate);
                }
            }
        }

        debug!(
            metrics = metrics.len(),
            pairs = pairs.len(),
            candidates = candidates.len(),
            "Correlation analysis finished"
        );

        AnalysisOutcome {
            candidates,
            pairs_tested: pairs.len(),
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::features::DailyFeatureVector;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn matrix(days: usize) -> FeatureMatrix {
        let user_id = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows: Vec<DailyFeatureVector> = (0..days)
            .map(|i| {
                let date = start + chrono::Duration::days(i as i64);
                let mut row = DailyFeatureVector::empty(user_id, date);
                let exercise = 20.0 + ((i * 17) % 40) as f64;
                row.set(Metric::ExerciseMinutes, Some(exercise));
                row.set(Metric::SleepQuality, Some(50.0 + exercise * 0.6 + ((i * 7) % 5) as f64));
                if i % 3 == 0 {
                    row.set(Metric::WeightKg, Some(70.0));
                }
                row
            })
            .collect();
        FeatureMatrix {
            user_id,
            start_date: start,
            end_date: start + chrono::Duration::days(days as i64 - 1),
            rows,
        }
    }

    #[test]
    fn test_pairs_are_ordered_and_filtered() {
        let config = CorrelationConfig::default();
        let analyzer = CorrelationAnalyzer::new(&config);
        let m = matrix(40);
        let (metrics, skipped) = analyzer.eligible_metrics(&m);
        assert_eq!(metrics.len(), 2);
        assert!(matches!(
            skipped.as_slice(),
            [AnalysisSkip::InsufficientData { metric: Metric::WeightKg, .. }]
        ));

        let pairs = analyzer.candidate_pairs(&m, &metrics);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].metric_a, Metric::ExerciseMinutes);
        assert_eq!(pairs[0].metric_b, Metric::SleepQuality);
    }

    #[test]
    fn test_selection_limits_methods() {
        let config = CorrelationConfig::default();
        let analyzer = CorrelationAnalyzer::new(&config);
        let selection = MethodSelection {
            pearson: true,
            granger: false,
            cross_correlation: false,
            mutual_info: false,
        };
        let outcome = analyzer.analyze(&matrix(40), selection);
        assert_eq!(outcome.pairs_tested, 1);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].correlation_type, CorrelationType::Pearson);
        assert!(outcome.candidates[0].value > 0.9);
    }

    #[test]
    fn test_empty_matrix_is_reported() {
        let config = CorrelationConfig::default();
        let analyzer = CorrelationAnalyzer::new(&config);
        let mut m = matrix(5);
        for row in &mut m.rows {
            *row = DailyFeatureVector::empty(row.user_id, row.date);
        }
        let outcome = analyzer.analyze(&m, MethodSelection::default());
        assert_eq!(outcome.skipped, vec![AnalysisSkip::EmptyFeatureMatrix]);
        assert!(MethodSelection {
            pearson: false,
            granger: false,
            cross_correlation: false,
            mutual_info: false
        }
        .is_empty());
    }
}

//! Correlation Detection Run

use super::{AnalyticsService, CorrelationDetectionOptions};
use crate::analytics::correlation::{
    default_baseline, enrich, CorrelationAggregator, CorrelationAnalyzer, CorrelationFinding,
    CorrelationRecord, CorrelationStrength, CorrelationSummary, CorrelationType,
};
use crate::analytics::features::Metric;
use crate::error::{AnalysisSkip, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};
use uuid::Uuid;

/// 相関検出の実行結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationDetectionResponse {
    pub user_id: Uuid,
    pub period_days: usize,
    pub total_correlations: usize,
    pub significant_correlations: usize,
    pub actionable_count: usize,
    /// 以前に保存されていなかったキーの数
    pub new_correlations: usize,
    pub by_type: BTreeMap<CorrelationType, usize>,
    pub by_strength: BTreeMap<CorrelationStrength, usize>,
    pub correlations: Vec<CorrelationRecord>,
    pub top_findings: Vec<CorrelationFinding>,
    pub pairs_tested: usize,
    pub nothing_to_analyze: bool,
    pub skipped: Vec<String>,
}

impl CorrelationDetectionResponse {
    fn new(
        user_id: Uuid,
        period_days: usize,
        correlations: Vec<CorrelationRecord>,
        new_correlations: usize,
        pairs_tested: usize,
        skipped: Vec<String>,
    ) -> Self {
        let summary = CorrelationSummary::from_records(&correlations);
        Self {
            user_id,
            period_days,
            total_correlations: summary.total_correlations,
            significant_correlations: summary.significant_correlations,
            actionable_count: summary.actionable_count,
            new_correlations,
            by_type: summary.by_type,
            by_strength: summary.by_strength,
            correlations,
            top_findings: summary.top_findings,
            pairs_tested,
            nothing_to_analyze: false,
            skipped,
        }
    }
}

impl AnalyticsService {
    /// 相関検出を実行して結果を保存
    pub async fn run_correlation_detection(
        &self,
        user_id: Uuid,
        days: usize,
        options: CorrelationDetectionOptions,
    ) -> Result<CorrelationDetectionResponse> {
        options.validate()?;
        let window = self.window(days, options.end_date)?;
        let days = window.days;
        let _guard = self.locks.acquire(user_id).await;
        info!(
            user_id = %user_id,
            days,
            methods = ?options.methods(),
            "Starting correlation detection"
        );

        let matrix = self.load_matrix(user_id, &window).await?;
        if matrix.is_empty() {
            info!(user_id = %user_id, "No health data in window, nothing to analyze");
            let mut response = CorrelationDetectionResponse::new(
                user_id,
                days,
                Vec::new(),
                0,
                0,
                vec![AnalysisSkip::EmptyFeatureMatrix.to_string()],
            );
            response.nothing_to_analyze = true;
            return Ok(response);
        }

        let config = &self.config.correlation;
        let outcome = CorrelationAnalyzer::new(config).analyze(&matrix, options.methods());
        let mut records = CorrelationAggregator::new(config).aggregate(
            user_id,
            outcome.candidates,
            options.min_confidence,
            Utc::now(),
        );

        if options.include_population_comparison {
            for record in &mut records {
                let baseline = match &self.population {
                    Some(population) => population
                        .population_baseline(
                            record.metric_a,
                            record.metric_b,
                            record.correlation_type,
                        )
                        .await?
                        .unwrap_or_else(|| default_baseline(record.metric_a, record.metric_b)),
                    None => default_baseline(record.metric_a, record.metric_b),
                };
                enrich(record, baseline, config);
            }
        }

        self.describe_correlations(&mut records).await;

        // 既存キーの ID を引き継ぐ
        let existing: HashMap<(Metric, Metric, CorrelationType), Uuid> = self
            .correlations
            .list_correlations(user_id)
            .await?
            .into_iter()
            .map(|r| (r.key(), r.id))
            .collect();
        for record in &mut records {
            if let Some(id) = existing.get(&record.key()) {
                record.id = *id;
            }
        }
        let new_correlations = self.correlations.upsert_correlations(records.clone()).await?;

        let response = CorrelationDetectionResponse::new(
            user_id,
            days,
            records,
            new_correlations,
            outcome.pairs_tested,
            outcome.skipped.iter().map(ToString::to_string).collect(),
        );
        info!(
            user_id = %user_id,
            pairs = response.pairs_tested,
            total = response.total_correlations,
            actionable = response.actionable_count,
            new = new_correlations,
            "Correlation detection finished"
        );
        Ok(response)
    }

    /// 説明生成の失敗は記録のみ
    async fn describe_correlations(&self, records: &mut [CorrelationRecord]) {
        let Some(explainer) = &self.explainer else {
            return;
        };
        for record in records.iter_mut() {
            match explainer.describe_correlation(record).await {
                Ok(narrative) => {
                    record.insight = narrative.insight;
                    record.recommendation = narrative.recommendation;
                }
                Err(e) => {
                    warn!(
                        metric_a = %record.metric_a,
                        metric_b = %record.metric_b,
                        error = %e,
                        "Failed to generate correlation insight"
                    );
                }
            }
        }
    }
}

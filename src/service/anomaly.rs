//! Anomaly Detection Run

use super::{AnalyticsService, AnomalyDetectionOptions};
use crate::analytics::anomaly::{
    reconcile, AnomalyEnsemble, AnomalyRecord, AnomalySummary, MultivariateDetector,
    ZScoreDetector,
};
use crate::error::{AnalysisSkip, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// 異常検知の実行結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionResponse {
    pub user_id: Uuid,
    pub period_days: usize,
    pub total_anomalies: usize,
    /// 新規作成 + 置換
    pub new_anomalies: usize,
    pub anomalies: Vec<AnomalyRecord>,
    /// 対象期間にデータが無かった
    pub nothing_to_analyze: bool,
    /// スキップ理由
    pub skipped: Vec<String>,
}

impl AnomalyDetectionResponse {
    fn empty(user_id: Uuid, period_days: usize) -> Self {
        Self {
            user_id,
            period_days,
            total_anomalies: 0,
            new_anomalies: 0,
            anomalies: Vec::new(),
            nothing_to_analyze: true,
            skipped: vec![AnalysisSkip::EmptyFeatureMatrix.to_string()],
        }
    }
}

impl AnalyticsService {
    /// 異常検知を実行して結果を保存
    pub async fn run_anomaly_detection(
        &self,
        user_id: Uuid,
        days: usize,
        options: AnomalyDetectionOptions,
    ) -> Result<AnomalyDetectionResponse> {
        options.validate()?;
        let window = self.window(days, options.end_date)?;
        let days = window.days;
        let _guard = self.locks.acquire(user_id).await;
        info!(
            user_id = %user_id,
            days,
            robust = options.use_robust,
            adaptive = options.use_adaptive,
            "Starting anomaly detection"
        );

        let matrix = self.load_matrix(user_id, &window).await?;
        if matrix.is_empty() {
            info!(user_id = %user_id, "No health data in window, nothing to analyze");
            return Ok(AnomalyDetectionResponse::empty(user_id, days));
        }

        let config = &self.config.anomaly;
        let zscore = ZScoreDetector::new(config, options.use_robust, options.use_adaptive)
            .detect(&matrix, options.evaluation_days);
        let multivariate = MultivariateDetector::new(config).detect(&matrix);

        let detected = AnomalyEnsemble::new(config).combine(
            user_id,
            &zscore.flags,
            &multivariate.flags,
            Utc::now(),
        );

        let existing = self
            .anomalies
            .list_anomalies(user_id, matrix.start_date, matrix.end_date)
            .await?;
        let mut reconciliation = reconcile(detected, &existing);

        if options.include_explanation {
            let mut fresh: Vec<&AnomalyRecord> = reconciliation.created.iter().collect();
            fresh.extend(reconciliation.superseded.iter().map(|(_, r)| r));
            let explanations = self.explain_anomalies(&fresh).await;
            apply_explanations(&mut reconciliation.created, &explanations);
            for (_, record) in &mut reconciliation.superseded {
                if let Some(text) = explanations.get(&record.id) {
                    record.explanation = Some(text.clone());
                }
            }
            apply_explanations(&mut reconciliation.records, &explanations);
        }

        let new_anomalies = reconciliation.new_count();
        self.anomalies
            .persist_anomaly_run(
                std::mem::take(&mut reconciliation.created),
                std::mem::take(&mut reconciliation.superseded),
            )
            .await?;

        let mut skipped: Vec<String> = zscore.skipped.iter().map(ToString::to_string).collect();
        if let Some(skip) = &multivariate.skipped {
            skipped.push(skip.to_string());
        }

        info!(
            user_id = %user_id,
            total = reconciliation.records.len(),
            new = new_anomalies,
            reused = reconciliation.reused,
            "Anomaly detection finished"
        );

        Ok(AnomalyDetectionResponse {
            user_id,
            period_days: days,
            total_anomalies: reconciliation.records.len(),
            new_anomalies,
            anomalies: reconciliation.records,
            nothing_to_analyze: false,
            skipped,
        })
    }

    /// 保存済みレコードの集計
    pub async fn anomaly_summary(
        &self,
        user_id: Uuid,
        days: usize,
        end_date: Option<NaiveDate>,
    ) -> Result<AnomalySummary> {
        let window = self.window(days, end_date)?;
        let records = self
            .anomalies
            .list_anomalies(user_id, window.start, window.end)
            .await?;
        Ok(AnomalySummary::from_records(&records, window.end, window.days))
    }

    /// 説明生成の失敗は記録のみで結果には影響しない
    async fn explain_anomalies(&self, records: &[&AnomalyRecord]) -> HashMap<Uuid, String> {
        let mut explanations = HashMap::new();
        let Some(explainer) = &self.explainer else {
            return explanations;
        };
        for record in records {
            match explainer.explain_anomaly(record).await {
                Ok(text) => {
                    explanations.insert(record.id, text);
                }
                Err(e) => {
                    warn!(
                        anomaly_id = %record.id,
                        metric = %record.metric,
                        error = %e,
                        "Failed to generate anomaly explanation"
                    );
                }
            }
        }
        explanations
    }
}

fn apply_explanations(records: &mut [AnomalyRecord], explanations: &HashMap<Uuid, String>) {
    for record in records {
        if let Some(text) = explanations.get(&record.id) {
            record.explanation = Some(text.clone());
        }
    }
}

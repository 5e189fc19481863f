//! Analytics Service
//!
//! オーケストレーション層に公開する検知実行の入口。
//! 同一ユーザーの実行はロックで直列化し、スナップショット読み込み → 計算 → 保存の順に進む

pub mod anomaly;
pub mod correlation;
pub mod locks;
pub mod options;

pub use anomaly::AnomalyDetectionResponse;
pub use correlation::CorrelationDetectionResponse;
pub use locks::UserRunLocks;
pub use options::{AnomalyDetectionOptions, CorrelationDetectionOptions};

use crate::analytics::features::{FeatureMatrix, FeatureMatrixBuilder};
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::explain::ExplanationProvider;
use crate::storage::{
    AnomalyRepository, CorrelationRepository, HealthDataSource, InMemoryStore, PopulationReference,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 検知サービス
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    config: Arc<AnalyticsConfig>,
    data_source: Arc<dyn HealthDataSource>,
    anomalies: Arc<dyn AnomalyRepository>,
    correlations: Arc<dyn CorrelationRepository>,
    population: Option<Arc<dyn PopulationReference>>,
    explainer: Option<Arc<dyn ExplanationProvider>>,
    locks: UserRunLocks,
}

impl AnalyticsService {
    /// 設定を検証してサービスを作成
    pub fn new(
        config: AnalyticsConfig,
        data_source: Arc<dyn HealthDataSource>,
        anomalies: Arc<dyn AnomalyRepository>,
        correlations: Arc<dyn CorrelationRepository>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            data_source,
            anomalies,
            correlations,
            population: None,
            explainer: None,
            locks: UserRunLocks::new(),
        })
    }

    /// 全コラボレーターを同じメモリストアで構成
    pub fn with_memory_store(config: AnalyticsConfig, store: InMemoryStore) -> Result<Self> {
        let store = Arc::new(store);
        Ok(Self::new(config, store.clone(), store.clone(), store.clone())?
            .with_population_reference(store))
    }

    pub fn with_population_reference(mut self, population: Arc<dyn PopulationReference>) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_explanation_provider(mut self, explainer: Arc<dyn ExplanationProvider>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn locks(&self) -> &UserRunLocks {
        &self.locks
    }

    /// 実行対象の窓（end_date を含む）
    ///
    /// `days` が 0 なら設定の `lookback_days` を使う。上限超過は `InvalidInput`。
    fn window(&self, days: usize, end_date: Option<NaiveDate>) -> Result<RunWindow> {
        let days = if days == 0 {
            self.config.features.lookback_days
        } else {
            days
        };
        let end = end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start = self.matrix_builder().window_start(end, days)?;
        Ok(RunWindow { days, start, end })
    }

    fn matrix_builder(&self) -> FeatureMatrixBuilder {
        FeatureMatrixBuilder::new(self.config.features.clone())
    }

    /// 実行開始時点のスナップショットから特徴量行列を構築
    async fn load_matrix(&self, user_id: Uuid, window: &RunWindow) -> Result<FeatureMatrix> {
        let snapshot = self
            .data_source
            .load_snapshot(user_id, window.start, window.end)
            .await?;
        debug!(
            user_id = %user_id,
            entries = snapshot.total_entries(),
            start = %window.start,
            end = %window.end,
            "Loaded health snapshot"
        );
        self.matrix_builder()
            .build(user_id, &snapshot, window.end, window.days)
    }
}

/// 検証済みの日付窓
#[derive(Debug, Clone, Copy)]
struct RunWindow {
    days: usize,
    start: NaiveDate,
    end: NaiveDate,
}

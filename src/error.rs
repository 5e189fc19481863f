//! Error types for the health analytics engine.

use crate::analytics::features::Metric;
use thiserror::Error;

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error types surfaced to the orchestration layer
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration error (rejected before computation starts)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Storage collaborator error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Text-generation collaborator error
    #[error("Explanation error: {0}")]
    Explanation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 計算開始前に拒否されるエラーかどうか
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::InvalidConfiguration(_) | Error::Config(_))
    }
}

/// Non-fatal analysis skips
///
/// 検知器はこれらを結果と一緒に返し、実行は他のメトリクスで継続する。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisSkip {
    /// 観測数がベースライン計算に足りない
    #[error("Insufficient data for {metric}: {observed} observations, {required} required")]
    InsufficientData {
        metric: Metric,
        observed: usize,
        required: usize,
    },

    /// ベースライン窓の分散がゼロ
    #[error("Degenerate scale for {metric}: zero dispersion in baseline window")]
    DegenerateScale { metric: Metric },

    /// NaN や除算ゼロなど数値計算の失敗
    #[error("Numeric failure in {context}")]
    NumericFailure { context: String },

    /// 多変量検知に必要な特徴量・サンプルが不足
    #[error("Multivariate detector skipped: {reason}")]
    Multivariate { reason: String },

    /// 対象期間にデータが全く存在しない
    #[error("Empty feature matrix: no data for the requested window")]
    EmptyFeatureMatrix,
}

impl AnalysisSkip {
    /// スキップ対象のメトリクス（存在する場合）
    pub fn metric(&self) -> Option<Metric> {
        match self {
            AnalysisSkip::InsufficientData { metric, .. }
            | AnalysisSkip::DegenerateScale { metric } => Some(*metric),
            _ => None,
        }
    }
}

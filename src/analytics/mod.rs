//! Analytics Module
//!
//! 特徴量生成・ベースライン・異常検知・相関検出

pub mod anomaly;
pub mod baseline;
pub mod correlation;
pub mod features;

pub use anomaly::{AnomalyEnsemble, AnomalyRecord, DetectorType, MultivariateDetector, Severity, ZScoreDetector};
pub use baseline::{Baseline, BaselineMethod, BaselineSettings};
pub use correlation::{
    CorrelationAggregator, CorrelationAnalyzer, CorrelationRecord, CorrelationStrength,
    CorrelationType, MethodSelection,
};
pub use features::{FeatureMatrix, FeatureMatrixBuilder, HealthSnapshot, Metric};

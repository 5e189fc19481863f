//! Anomaly Detection Module
//!
//! 異常検知システム（Z-スコア・Isolation Forest・アンサンブル）

pub mod ensemble;
pub mod models;
pub mod multivariate;
pub mod summary;
pub mod types;
pub mod zscore;

pub use ensemble::{reconcile, AnomalyEnsemble, Candidate, Reconciliation};
pub use multivariate::{MultivariateDetector, MultivariateOutcome};
pub use summary::AnomalySummary;
pub use types::{
    AnomalyDetails, AnomalyRecord, DetectorType, FeatureContribution, MultivariateFlag, Severity,
    ZScoreFlag,
};
pub use zscore::{ZScoreDetector, ZScoreEvaluation, ZScoreOutcome};

//! Configuration
//!
//! 解析エンジンの設定定義と読み込み

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AnalyticsConfig, AnomalyConfig, CorrelationConfig, FeatureConfig, LoggingSettings,
    MedicalBounds,
};

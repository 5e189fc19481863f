//! # vitaliq-analytics
//!
//! Anomaly detection and cross-metric correlation analytics for personal health measurements.
//!
//! Raw per-table entries (sleep, exercise, nutrition, vitals, body composition and chronic
//! condition readings) are reduced into a daily feature matrix. Two independent paths run on
//! that matrix: a z-score plus isolation-forest anomaly ensemble, and a four-method correlation
//! analyzer with population baseline enrichment. Storage and text generation are external
//! collaborators reached through async traits.

pub mod analytics;
pub mod config;
pub mod error;
pub mod explain;
pub mod logging;
pub mod service;
pub mod storage;

pub use config::{AnalyticsConfig, ConfigLoader};
pub use error::{AnalysisSkip, Error, Result};
pub use explain::ExplanationProvider;
pub use service::{
    AnalyticsService, AnomalyDetectionOptions, AnomalyDetectionResponse,
    CorrelationDetectionOptions, CorrelationDetectionResponse,
};
pub use storage::InMemoryStore;

//! Feature Engineering
//!
//! 生データを日次特徴量行列へ変換するモジュール

pub mod builder;
pub mod derived;
pub mod entries;
pub mod types;

pub use builder::FeatureMatrixBuilder;
pub use entries::{
    BodyMetricsEntry, ChronicMetricsEntry, ChronicTimeOfDay, ConditionType, ExerciseEntry,
    ExerciseIntensity, FoodEntry, HealthSnapshot, SleepEntry, TimeOfDay, VitalSignsEntry,
};
pub use types::{DailyFeatureVector, FeatureMatrix, Metric, SourceTable};

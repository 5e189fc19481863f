//! Anomaly Detection Types
//!
//! 異常検知用の型定義

use crate::analytics::baseline::Baseline;
use crate::analytics::features::{Metric, SourceTable};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 検知器の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorType {
    /// Z-スコア法
    Zscore,
    /// Isolation Forest
    IsolationForest,
    /// 両検知器の統合
    Ensemble,
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectorType::Zscore => "zscore",
            DetectorType::IsolationForest => "isolation_forest",
            DetectorType::Ensemble => "ensemble",
        })
    }
}

/// 重大度（Low < Medium < High）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const HIGH_THRESHOLD: f64 = 0.75;
    pub const MEDIUM_THRESHOLD: f64 = 0.45;

    /// スコアから重大度へ変換
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Severity::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

/// 検知根拠の構造化情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetails {
    pub z_score: Option<f64>,
    pub threshold: Option<f64>,
    pub baseline_scale: Option<f64>,
    pub bounds_violation: bool,
    /// 多変量検知で寄与の大きかったメトリクス
    pub contributing_features: Vec<Metric>,
    pub zscore_score: Option<f64>,
    pub iforest_score: Option<f64>,
}

/// 異常レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "metric_name")]
    pub metric: Metric,
    pub metric_value: f64,
    pub baseline_value: f64,
    pub detector_type: DetectorType,
    pub severity: Severity,
    /// 異常度（0.0-1.0）
    pub anomaly_score: f64,
    pub source_table: SourceTable,
    pub details: AnomalyDetails,
    pub explanation: Option<String>,
    pub is_acknowledged: bool,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyRecord {
    /// 重複判定キー
    pub fn key(&self) -> (NaiveDate, Metric) {
        (self.date, self.metric)
    }

    /// 再検知結果と同一とみなせるか
    pub fn matches_detection(&self, other: &AnomalyRecord) -> bool {
        self.key() == other.key()
            && self.detector_type == other.detector_type
            && self.severity == other.severity
            && (self.anomaly_score - other.anomaly_score).abs() <= 1e-9
    }
}

/// Z-スコア検知器の日次フラグ
#[derive(Debug, Clone, PartialEq)]
pub struct ZScoreFlag {
    pub date: NaiveDate,
    pub metric: Metric,
    pub value: f64,
    pub baseline: Baseline,
    pub z_score: f64,
    pub threshold: f64,
    pub bounds_violation: bool,
    pub score: f64,
}

/// 多変量フラグのメトリクス別寄与
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContribution {
    pub metric: Metric,
    pub value: f64,
    /// 実行内の中央値
    pub reference_value: f64,
    /// 最寄りの正常クラスタ中心からの標準化距離
    pub deviation: f64,
}

/// 多変量検知器の日次フラグ
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateFlag {
    pub date: NaiveDate,
    /// 実行内で min-max 正規化したスコア
    pub score: f64,
    pub raw_score: f64,
    /// 寄与の大きい順
    pub contributions: Vec<FeatureContribution>,
}

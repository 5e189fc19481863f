//! Correlation Types
//!
//! 相関検出用の型定義

use crate::analytics::features::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 相関検出手法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    /// ピアソン積率相関
    Pearson,
    /// グレンジャー因果性
    Granger,
    /// ラグ付き相互相関
    CrossCorrelation,
    /// 相互情報量
    MutualInfo,
}

impl CorrelationType {
    pub const ALL: [CorrelationType; 4] = [
        CorrelationType::Pearson,
        CorrelationType::Granger,
        CorrelationType::CrossCorrelation,
        CorrelationType::MutualInfo,
    ];

    /// 符号を持つ手法か
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            CorrelationType::Pearson | CorrelationType::CrossCorrelation
        )
    }

    /// ラグを持つ手法か
    pub fn has_lag(&self) -> bool {
        matches!(
            self,
            CorrelationType::Granger | CorrelationType::CrossCorrelation
        )
    }
}

impl fmt::Display for CorrelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrelationType::Pearson => "pearson",
            CorrelationType::Granger => "granger",
            CorrelationType::CrossCorrelation => "cross_correlation",
            CorrelationType::MutualInfo => "mutual_info",
        })
    }
}

/// 因果の向き（metric_a / metric_b 基準）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CausalDirection {
    #[serde(rename = "a_causes_b")]
    ACausesB,
    #[serde(rename = "b_causes_a")]
    BCausesA,
    #[serde(rename = "bidirectional")]
    Bidirectional,
    #[serde(rename = "none")]
    None,
}

impl CausalDirection {
    /// 両方向の有意性から向きを決定
    pub fn from_significance(a_to_b: bool, b_to_a: bool) -> Self {
        match (a_to_b, b_to_a) {
            (true, true) => CausalDirection::Bidirectional,
            (true, false) => CausalDirection::ACausesB,
            (false, true) => CausalDirection::BCausesA,
            (false, false) => CausalDirection::None,
        }
    }
}

/// 相関の強さ（Weak < Moderate < Strong < VeryStrong）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    /// |値| から強さへ変換。`weak_floor` 未満は `None`（破棄対象）
    pub fn from_magnitude(value: f64, weak_floor: f64) -> Option<Self> {
        let magnitude = value.abs();
        if !magnitude.is_finite() {
            return None;
        }
        if magnitude >= 0.7 {
            Some(CorrelationStrength::VeryStrong)
        } else if magnitude >= 0.5 {
            Some(CorrelationStrength::Strong)
        } else if magnitude >= 0.3 {
            Some(CorrelationStrength::Moderate)
        } else if magnitude >= weak_floor {
            Some(CorrelationStrength::Weak)
        } else {
            None
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrelationStrength::Weak => "weak",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::VeryStrong => "very_strong",
        })
    }
}

/// 母集団基準との比較結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationComparison {
    pub population_mean: f64,
    pub population_std: f64,
    /// 0-100
    pub percentile_rank: f64,
    pub z_vs_population: f64,
    /// 組み込みの既定値を使ったか
    pub is_default_baseline: bool,
}

/// 手法別の補足情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationDetails {
    pub f_statistic: Option<f64>,
    pub p_value_a_to_b: Option<f64>,
    pub p_value_b_to_a: Option<f64>,
    /// 非定常のため差分を取った系列があるか
    pub differenced: bool,
    /// 先行するメトリクス（相互相関）
    pub leading_metric: Option<Metric>,
    /// 生の相互情報量（nats）
    pub mutual_information: Option<f64>,
    /// 一致した他手法の数
    pub agreeing_methods: usize,
    pub population: Option<PopulationComparison>,
}

/// 相関レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub correlation_type: CorrelationType,
    pub correlation_value: f64,
    pub p_value: Option<f64>,
    pub lag_days: usize,
    pub causal_direction: CausalDirection,
    pub strength: CorrelationStrength,
    /// 信頼度（0.0-1.0）
    pub confidence_score: f64,
    pub is_significant: bool,
    pub is_actionable: bool,
    pub sample_size: usize,
    pub insight: Option<String>,
    pub recommendation: Option<String>,
    pub details: CorrelationDetails,
    pub detected_at: DateTime<Utc>,
}

impl CorrelationRecord {
    /// 保存時の一意キー
    pub fn key(&self) -> (Metric, Metric, CorrelationType) {
        (self.metric_a, self.metric_b, self.correlation_type)
    }
}

/// 各手法が出力する候補（集約前）
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationCandidate {
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub correlation_type: CorrelationType,
    pub value: f64,
    pub p_value: Option<f64>,
    pub lag_days: usize,
    pub causal_direction: CausalDirection,
    /// 手法固有の信頼度（0.0-1.0）
    pub confidence: f64,
    pub sample_size: usize,
    pub details: CorrelationDetails,
}

/// メトリクス名の辞書順に並べたペア
pub fn ordered_pair(a: Metric, b: Metric) -> (Metric, Metric) {
    if a.as_str() <= b.as_str() {
        (a, b)
    } else {
        (b, a)
    }
}

//! Detection Options
//!
//! API 境界で受け取る JSON オプションを型付きの構造体へ変換する

use crate::analytics::correlation::MethodSelection;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 異常検知オプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyDetectionOptions {
    /// 中央値/MAD（false なら平均/標準偏差）
    pub use_robust: bool,
    /// EWMA ベースライン
    pub use_adaptive: bool,
    /// 説明文生成を依頼するか
    pub include_explanation: bool,
    /// 窓の最終日（未指定なら UTC の今日）
    pub end_date: Option<NaiveDate>,
    /// 直近 N 日のみ判定（未指定なら窓全体）
    pub evaluation_days: Option<usize>,
}

impl Default for AnomalyDetectionOptions {
    fn default() -> Self {
        Self {
            use_robust: true,
            use_adaptive: false,
            include_explanation: true,
            end_date: None,
            evaluation_days: None,
        }
    }
}

impl AnomalyDetectionOptions {
    /// JSON から変換（null は既定値）
    pub fn from_json(value: &Value) -> Result<Self> {
        let options: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value.clone())?
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.evaluation_days == Some(0) {
            return Err(Error::InvalidConfiguration(
                "evaluation_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 相関検出オプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationDetectionOptions {
    pub include_pearson: bool,
    pub include_granger: bool,
    pub include_cross_correlation: bool,
    pub include_mutual_info: bool,
    pub include_population_comparison: bool,
    /// 信頼度の下限（0.0-1.0）
    pub min_confidence: f64,
    pub end_date: Option<NaiveDate>,
}

impl Default for CorrelationDetectionOptions {
    fn default() -> Self {
        Self {
            include_pearson: true,
            include_granger: true,
            include_cross_correlation: true,
            include_mutual_info: true,
            include_population_comparison: true,
            min_confidence: 0.3,
            end_date: None,
        }
    }
}

impl CorrelationDetectionOptions {
    /// JSON から変換（null は既定値）
    pub fn from_json(value: &Value) -> Result<Self> {
        let options: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value.clone())?
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfiguration(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.methods().is_empty() {
            return Err(Error::InvalidConfiguration(
                "At least one correlation method must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn methods(&self) -> MethodSelection {
        MethodSelection {
            pearson: self.include_pearson,
            granger: self.include_granger,
            cross_correlation: self.include_cross_correlation,
            mutual_info: self.include_mutual_info,
        }
    }
}

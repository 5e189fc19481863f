//! Explanation Collaborator
//!
//! 検知結果を人が読める文章に変換する外部コラボレーターのインターフェース。
//! このクレート自身は文章を生成しない

use crate::analytics::anomaly::AnomalyRecord;
use crate::analytics::correlation::CorrelationRecord;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 相関に対する説明文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationNarrative {
    pub insight: Option<String>,
    pub recommendation: Option<String>,
}

#[async_trait]
pub trait ExplanationProvider: Send + Sync + std::fmt::Debug {
    /// 異常レコードの説明文
    async fn explain_anomaly(&self, record: &AnomalyRecord) -> Result<String>;

    /// 相関レコードの洞察と推奨
    async fn describe_correlation(&self, _record: &CorrelationRecord) -> Result<CorrelationNarrative> {
        Ok(CorrelationNarrative::default())
    }
}

//! Storage Collaborators
//!
//! 生データの読み込み、解析結果の保存、母集団参照統計の取得を行う
//! 外部コラボレーターのインターフェース

pub mod memory;

use crate::analytics::anomaly::AnomalyRecord;
use crate::analytics::correlation::{CorrelationRecord, CorrelationType, PopulationBaseline};
use crate::analytics::features::{HealthSnapshot, Metric};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

pub use memory::InMemoryStore;

/// 生データ（テーブル別の日次エントリ）の読み込み
#[async_trait]
pub trait HealthDataSource: Send + Sync + std::fmt::Debug {
    /// 期間（両端含む）のスナップショットを取得
    async fn load_snapshot(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HealthSnapshot>;
}

/// 異常レコードの保存
#[async_trait]
pub trait AnomalyRepository: Send + Sync + std::fmt::Debug {
    async fn list_anomalies(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnomalyRecord>>;

    async fn create_anomaly(&self, record: AnomalyRecord) -> Result<AnomalyRecord>;

    /// 1 回の実行結果をまとめて保存
    ///
    /// `created` を追加し、`superseded` の各 (旧 ID, 新レコード) で旧レコードを置き換える。
    /// 一部でも失敗した場合は何も書き込まない。
    async fn persist_anomaly_run(
        &self,
        created: Vec<AnomalyRecord>,
        superseded: Vec<(Uuid, AnomalyRecord)>,
    ) -> Result<()>;
}

/// 相関レコードの保存
#[async_trait]
pub trait CorrelationRepository: Send + Sync + std::fmt::Debug {
    async fn list_correlations(&self, user_id: Uuid) -> Result<Vec<CorrelationRecord>>;

    /// (user, metric_a, metric_b, correlation_type) 単位でまとめて保存
    ///
    /// 戻り値は以前に無かったキーの数。失敗時は何も書き込まない。
    async fn upsert_correlations(&self, records: Vec<CorrelationRecord>) -> Result<usize>;
}

/// 母集団の参照統計
#[async_trait]
pub trait PopulationReference: Send + Sync + std::fmt::Debug {
    async fn population_baseline(
        &self,
        metric_a: Metric,
        metric_b: Metric,
        correlation_type: CorrelationType,
    ) -> Result<Option<PopulationBaseline>>;
}

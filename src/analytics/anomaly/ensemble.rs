//! Anomaly Ensemble
//!
//! 検知器出力の (日付, メトリクス) 結合・スコア統合・順位付け・既存レコードとの照合

use super::types::{
    AnomalyDetails, AnomalyRecord, DetectorType, MultivariateFlag, Severity, ZScoreFlag,
};
use crate::analytics::features::Metric;
use crate::config::AnomalyConfig;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// 多変量フラグをメトリクス単位に展開した候補
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationCandidate {
    pub date: NaiveDate,
    pub metric: Metric,
    pub value: f64,
    pub reference_value: f64,
    pub score: f64,
    /// 同じ日に帰属されたメトリクス一覧
    pub contributing_features: Vec<Metric>,
}

/// (日付, メトリクス) 単位の結合結果
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    ZScoreOnly(ZScoreFlag),
    IsolationOnly(IsolationCandidate),
    Both(ZScoreFlag, IsolationCandidate),
}

/// 多変量フラグを帰属メトリクスごとの候補へ展開
pub fn expand_multivariate(flags: &[MultivariateFlag]) -> Vec<IsolationCandidate> {
    flags
        .iter()
        .flat_map(|flag| {
            let contributing: Vec<Metric> = flag.contributions.iter().map(|c| c.metric).collect();
            flag.contributions.iter().map(move |c| IsolationCandidate {
                date: flag.date,
                metric: c.metric,
                value: c.value,
                reference_value: c.reference_value,
                score: flag.score,
                contributing_features: contributing.clone(),
            })
        })
        .collect()
}

/// 両検知器の出力を (日付, メトリクス) で外部結合
pub fn join_candidates(
    zscore: &[ZScoreFlag],
    isolation: &[IsolationCandidate],
) -> BTreeMap<(NaiveDate, Metric), Candidate> {
    let mut joined: BTreeMap<(NaiveDate, Metric), Candidate> = zscore
        .iter()
        .map(|f| ((f.date, f.metric), Candidate::ZScoreOnly(f.clone())))
        .collect();

    for candidate in isolation {
        let key = (candidate.date, candidate.metric);
        let merged = match joined.remove(&key) {
            Some(Candidate::ZScoreOnly(z)) | Some(Candidate::Both(z, _)) => {
                Candidate::Both(z, candidate.clone())
            }
            Some(Candidate::IsolationOnly(_)) | None => {
                Candidate::IsolationOnly(candidate.clone())
            }
        };
        joined.insert(key, merged);
    }
    joined
}

/// 異常検知アンサンブル
pub struct AnomalyEnsemble {
    zscore_weight: f64,
    iforest_weight: f64,
    max_anomalies: usize,
}

impl AnomalyEnsemble {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            zscore_weight: config.zscore_weight,
            iforest_weight: config.iforest_weight,
            max_anomalies: config.max_anomalies,
        }
    }

    /// 両スコアの加重平均
    pub fn combined_score(&self, zscore_score: f64, iforest_score: f64) -> f64 {
        let total = self.zscore_weight + self.iforest_weight;
        ((self.zscore_weight * zscore_score + self.iforest_weight * iforest_score) / total)
            .clamp(0.0, 1.0)
    }

    /// 結合・採点・順位付けしたレコードを返す（最大 `max_anomalies` 件）
    pub fn combine(
        &self,
        user_id: Uuid,
        zscore: &[ZScoreFlag],
        multivariate: &[MultivariateFlag],
        detected_at: DateTime<Utc>,
    ) -> Vec<AnomalyRecord> {
        let isolation = expand_multivariate(multivariate);
        let mut records: Vec<AnomalyRecord> = join_candidates(zscore, &isolation)
            .into_values()
            .map(|candidate| self.to_record(user_id, candidate, detected_at))
            .collect();

        rank(&mut records);
        records.truncate(self.max_anomalies);
        records
    }

    fn to_record(
        &self,
        user_id: Uuid,
        candidate: Candidate,
        detected_at: DateTime<Utc>,
    ) -> AnomalyRecord {
        let (date, metric, value, baseline_value, detector_type, score, details) = match candidate
        {
            Candidate::ZScoreOnly(z) => (
                z.date,
                z.metric,
                z.value,
                z.baseline.center,
                DetectorType::Zscore,
                z.score,
                zscore_details(&z),
            ),
            Candidate::IsolationOnly(i) => (
                i.date,
                i.metric,
                i.value,
                i.reference_value,
                DetectorType::IsolationForest,
                i.score,
                AnomalyDetails {
                    contributing_features: i.contributing_features.clone(),
                    iforest_score: Some(i.score),
                    ..AnomalyDetails::default()
                },
            ),
            Candidate::Both(z, i) => {
                let combined = self.combined_score(z.score, i.score);
                let details = AnomalyDetails {
                    contributing_features: i.contributing_features.clone(),
                    iforest_score: Some(i.score),
                    ..zscore_details(&z)
                };
                (
                    z.date,
                    z.metric,
                    z.value,
                    z.baseline.center,
                    DetectorType::Ensemble,
                    combined,
                    details,
                )
            }
        };

        let score = score.clamp(0.0, 1.0);
        AnomalyRecord {
            id: Uuid::new_v4(),
            user_id,
            date,
            metric,
            metric_value: value,
            baseline_value,
            detector_type,
            severity: Severity::from_score(score),
            anomaly_score: score,
            source_table: metric.source_table(),
            details,
            explanation: None,
            is_acknowledged: false,
            detected_at,
        }
    }
}

fn zscore_details(z: &ZScoreFlag) -> AnomalyDetails {
    AnomalyDetails {
        z_score: Some(z.z_score),
        threshold: Some(z.threshold),
        baseline_scale: Some(z.baseline.scale),
        bounds_violation: z.bounds_violation,
        zscore_score: Some(z.score),
        ..AnomalyDetails::default()
    }
}

/// 重大度 → スコア → 日付（新しい順）→ メトリクス名で並べ替え
pub fn rank(records: &mut [AnomalyRecord]) {
    records.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| {
                b.anomaly_score
                    .partial_cmp(&a.anomaly_score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| b.date.cmp(&a.date))
            .then_with(|| a.metric.as_str().cmp(b.metric.as_str()))
    });
}

/// 既存レコードとの照合結果
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// 返却する最終レコード（順位順）
    pub records: Vec<AnomalyRecord>,
    /// 新規作成するレコード
    pub created: Vec<AnomalyRecord>,
    /// 置き換えるレコード（旧 ID, 新レコード）
    pub superseded: Vec<(Uuid, AnomalyRecord)>,
    /// そのまま再利用した既存レコード数
    pub reused: usize,
}

impl Reconciliation {
    /// 新規 + 置換の件数
    pub fn new_count(&self) -> usize {
        self.created.len() + self.superseded.len()
    }
}

/// 今回の検知結果を保存済みレコードと照合
///
/// 確認済み、または内容が同一の既存レコードはそのまま再利用する。
/// 未確認で内容が異なる既存レコードは新しいレコードで置き換える。
pub fn reconcile(detected: Vec<AnomalyRecord>, existing: &[AnomalyRecord]) -> Reconciliation {
    let stored: HashMap<(NaiveDate, Metric), &AnomalyRecord> =
        existing.iter().map(|r| (r.key(), r)).collect();

    let mut result = Reconciliation::default();
    for record in detected {
        match stored.get(&record.key()) {
            Some(previous) if previous.is_acknowledged || previous.matches_detection(&record) => {
                result.reused += 1;
                result.records.push((*previous).clone());
            }
            Some(previous) => {
                result.superseded.push((previous.id, record.clone()));
                result.records.push(record);
            }
            None => {
                result.created.push(record.clone());
                result.records.push(record);
            }
        }
    }
    rank(&mut result.records);
    result
}

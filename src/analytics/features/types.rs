//! Feature Matrix Types
//!
//! 日次特徴量ベクトルとメトリクス定義

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 健康メトリクス（日次特徴量の列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepHours,
    SleepQuality,
    Awakenings,
    ExerciseMinutes,
    ExerciseCalories,
    ExerciseIntensityAvg,
    TotalCalories,
    ProteinG,
    CarbsG,
    FatsG,
    SugarG,
    RestingHr,
    HrvMs,
    BpSystolic,
    BpDiastolic,
    Spo2,
    WeightKg,
    BodyFatPct,
    GlucoseMgdl,
    GlucoseFasting,
    GlucosePostMeal,
    /// タンパク質由来カロリー比
    ProteinRatio,
    /// 平均血圧
    BpMean,
    /// 7日間の体重変化
    WeightChange7d,
    /// 直近7日間の血糖値の標準偏差
    GlucoseVariability,
    /// 睡眠時間の7日平均からの乖離
    SleepHoursDeviation,
}

/// メトリクスの元テーブル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    SleepEntries,
    ExerciseEntries,
    FoodEntries,
    VitalSigns,
    BodyMetrics,
    ChronicMetrics,
    /// 二次計算で導出
    Derived,
}

impl Metric {
    /// 全メトリクス（列順）
    pub const ALL: [Metric; 26] = [
        Metric::SleepHours,
        Metric::SleepQuality,
        Metric::Awakenings,
        Metric::ExerciseMinutes,
        Metric::ExerciseCalories,
        Metric::ExerciseIntensityAvg,
        Metric::TotalCalories,
        Metric::ProteinG,
        Metric::CarbsG,
        Metric::FatsG,
        Metric::SugarG,
        Metric::RestingHr,
        Metric::HrvMs,
        Metric::BpSystolic,
        Metric::BpDiastolic,
        Metric::Spo2,
        Metric::WeightKg,
        Metric::BodyFatPct,
        Metric::GlucoseMgdl,
        Metric::GlucoseFasting,
        Metric::GlucosePostMeal,
        Metric::ProteinRatio,
        Metric::BpMean,
        Metric::WeightChange7d,
        Metric::GlucoseVariability,
        Metric::SleepHoursDeviation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::SleepHours => "sleep_hours",
            Metric::SleepQuality => "sleep_quality",
            Metric::Awakenings => "awakenings",
            Metric::ExerciseMinutes => "exercise_minutes",
            Metric::ExerciseCalories => "exercise_calories",
            Metric::ExerciseIntensityAvg => "exercise_intensity_avg",
            Metric::TotalCalories => "total_calories",
            Metric::ProteinG => "protein_g",
            Metric::CarbsG => "carbs_g",
            Metric::FatsG => "fats_g",
            Metric::SugarG => "sugar_g",
            Metric::RestingHr => "resting_hr",
            Metric::HrvMs => "hrv_ms",
            Metric::BpSystolic => "bp_systolic",
            Metric::BpDiastolic => "bp_diastolic",
            Metric::Spo2 => "spo2",
            Metric::WeightKg => "weight_kg",
            Metric::BodyFatPct => "body_fat_pct",
            Metric::GlucoseMgdl => "glucose_mgdl",
            Metric::GlucoseFasting => "glucose_fasting",
            Metric::GlucosePostMeal => "glucose_post_meal",
            Metric::ProteinRatio => "protein_ratio",
            Metric::BpMean => "bp_mean",
            Metric::WeightChange7d => "weight_change_7d",
            Metric::GlucoseVariability => "glucose_variability",
            Metric::SleepHoursDeviation => "sleep_hours_deviation",
        }
    }

    /// 二次計算で導出されるメトリクスか
    pub fn is_derived(&self) -> bool {
        self.source_table() == SourceTable::Derived
    }

    pub fn source_table(&self) -> SourceTable {
        match self {
            Metric::SleepHours | Metric::SleepQuality | Metric::Awakenings => {
                SourceTable::SleepEntries
            }
            Metric::ExerciseMinutes | Metric::ExerciseCalories | Metric::ExerciseIntensityAvg => {
                SourceTable::ExerciseEntries
            }
            Metric::TotalCalories
            | Metric::ProteinG
            | Metric::CarbsG
            | Metric::FatsG
            | Metric::SugarG => SourceTable::FoodEntries,
            Metric::RestingHr
            | Metric::HrvMs
            | Metric::BpSystolic
            | Metric::BpDiastolic
            | Metric::Spo2 => SourceTable::VitalSigns,
            Metric::WeightKg | Metric::BodyFatPct => SourceTable::BodyMetrics,
            Metric::GlucoseMgdl | Metric::GlucoseFasting | Metric::GlucosePostMeal => {
                SourceTable::ChronicMetrics
            }
            Metric::ProteinRatio
            | Metric::BpMean
            | Metric::WeightChange7d
            | Metric::GlucoseVariability
            | Metric::SleepHoursDeviation => SourceTable::Derived,
        }
    }

    /// 元データ由来のメトリクスのみ
    pub fn base_metrics() -> impl Iterator<Item = Metric> {
        Self::ALL.into_iter().filter(|m| !m.is_derived())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| crate::error::Error::InvalidInput(format!("Unknown metric: {}", s)))
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTable::SleepEntries => "sleep_entries",
            SourceTable::ExerciseEntries => "exercise_entries",
            SourceTable::FoodEntries => "food_entries",
            SourceTable::VitalSigns => "vital_signs",
            SourceTable::BodyMetrics => "body_metrics",
            SourceTable::ChronicMetrics => "chronic_metrics",
            SourceTable::Derived => "derived",
        };
        f.write_str(name)
    }
}

/// 日次特徴量ベクトル
///
/// `None` は「その日の記録なし」を意味し、ゼロとは区別される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeatureVector {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub sleep_hours: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub awakenings: Option<f64>,
    pub exercise_minutes: Option<f64>,
    pub exercise_calories: Option<f64>,
    pub exercise_intensity_avg: Option<f64>,
    pub total_calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fats_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub resting_hr: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub bp_systolic: Option<f64>,
    pub bp_diastolic: Option<f64>,
    pub spo2: Option<f64>,
    pub weight_kg: Option<f64>,
    pub body_fat_pct: Option<f64>,
    pub glucose_mgdl: Option<f64>,
    pub glucose_fasting: Option<f64>,
    pub glucose_post_meal: Option<f64>,
    pub protein_ratio: Option<f64>,
    pub bp_mean: Option<f64>,
    pub weight_change_7d: Option<f64>,
    pub glucose_variability: Option<f64>,
    pub sleep_hours_deviation: Option<f64>,
}

impl DailyFeatureVector {
    /// 全フィールドが null のベクトルを作成
    pub fn empty(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            sleep_hours: None,
            sleep_quality: None,
            awakenings: None,
            exercise_minutes: None,
            exercise_calories: None,
            exercise_intensity_avg: None,
            total_calories: None,
            protein_g: None,
            carbs_g: None,
            fats_g: None,
            sugar_g: None,
            resting_hr: None,
            hrv_ms: None,
            bp_systolic: None,
            bp_diastolic: None,
            spo2: None,
            weight_kg: None,
            body_fat_pct: None,
            glucose_mgdl: None,
            glucose_fasting: None,
            glucose_post_meal: None,
            protein_ratio: None,
            bp_mean: None,
            weight_change_7d: None,
            glucose_variability: None,
            sleep_hours_deviation: None,
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        *self.slot(metric)
    }

    /// 値を設定（非有限値は欠損扱い）
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        *self.slot_mut(metric) = value.filter(|v| v.is_finite());
    }

    /// 少なくとも1つの値を持つか
    pub fn has_any_value(&self) -> bool {
        Metric::ALL.iter().any(|m| self.get(*m).is_some())
    }

    fn slot(&self, metric: Metric) -> &Option<f64> {
        match metric {
            Metric::SleepHours => &self.sleep_hours,
            Metric::SleepQuality => &self.sleep_quality,
            Metric::Awakenings => &self.awakenings,
            Metric::ExerciseMinutes => &self.exercise_minutes,
            Metric::ExerciseCalories => &self.exercise_calories,
            Metric::ExerciseIntensityAvg => &self.exercise_intensity_avg,
            Metric::TotalCalories => &self.total_calories,
            Metric::ProteinG => &self.protein_g,
            Metric::CarbsG => &self.carbs_g,
            Metric::FatsG => &self.fats_g,
            Metric::SugarG => &self.sugar_g,
            Metric::RestingHr => &self.resting_hr,
            Metric::HrvMs => &self.hrv_ms,
            Metric::BpSystolic => &self.bp_systolic,
            Metric::BpDiastolic => &self.bp_diastolic,
            Metric::Spo2 => &self.spo2,
            Metric::WeightKg => &self.weight_kg,
            Metric::BodyFatPct => &self.body_fat_pct,
            Metric::GlucoseMgdl => &self.glucose_mgdl,
            Metric::GlucoseFasting => &self.glucose_fasting,
            Metric::GlucosePostMeal => &self.glucose_post_meal,
            Metric::ProteinRatio => &self.protein_ratio,
            Metric::BpMean => &self.bp_mean,
            Metric::WeightChange7d => &self.weight_change_7d,
            Metric::GlucoseVariability => &self.glucose_variability,
            Metric::SleepHoursDeviation => &self.sleep_hours_deviation,
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::SleepHours => &mut self.sleep_hours,
            Metric::SleepQuality => &mut self.sleep_quality,
            Metric::Awakenings => &mut self.awakenings,
            Metric::ExerciseMinutes => &mut self.exercise_minutes,
            Metric::ExerciseCalories => &mut self.exercise_calories,
            Metric::ExerciseIntensityAvg => &mut self.exercise_intensity_avg,
            Metric::TotalCalories => &mut self.total_calories,
            Metric::ProteinG => &mut self.protein_g,
            Metric::CarbsG => &mut self.carbs_g,
            Metric::FatsG => &mut self.fats_g,
            Metric::SugarG => &mut self.sugar_g,
            Metric::RestingHr => &mut self.resting_hr,
            Metric::HrvMs => &mut self.hrv_ms,
            Metric::BpSystolic => &mut self.bp_systolic,
            Metric::BpDiastolic => &mut self.bp_diastolic,
            Metric::Spo2 => &mut self.spo2,
            Metric::WeightKg => &mut self.weight_kg,
            Metric::BodyFatPct => &mut self.body_fat_pct,
            Metric::GlucoseMgdl => &mut self.glucose_mgdl,
            Metric::GlucoseFasting => &mut self.glucose_fasting,
            Metric::GlucosePostMeal => &mut self.glucose_post_meal,
            Metric::ProteinRatio => &mut self.protein_ratio,
            Metric::BpMean => &mut self.bp_mean,
            Metric::WeightChange7d => &mut self.weight_change_7d,
            Metric::GlucoseVariability => &mut self.glucose_variability,
            Metric::SleepHoursDeviation => &mut self.sleep_hours_deviation,
        }
    }
}

/// 日付順に並んだ日次特徴量行列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<DailyFeatureVector>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 値が1つも存在しない場合 true（行が存在しても空とみなす）
    pub fn is_empty(&self) -> bool {
        !self.rows.iter().any(DailyFeatureVector::has_any_value)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// 列を日付順で取得
    pub fn column(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(metric)).collect()
    }

    pub fn non_null_count(&self, metric: Metric) -> usize {
        self.rows.iter().filter(|r| r.get(metric).is_some()).count()
    }

    /// 1件以上の値を持つメトリクス
    pub fn available_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.non_null_count(*m) > 0)
            .collect()
    }

    /// 末尾 `days` 行のビュー
    pub fn trailing(&self, days: usize) -> &[DailyFeatureVector] {
        let start = self.rows.len().saturating_sub(days);
        &self.rows[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_roundtrip() {
        for metric in Metric::ALL {
            let parsed: Metric = metric.as_str().parse().unwrap();
            assert_eq!(parsed, metric);
        }
        assert!("not_a_metric".parse::<Metric>().is_err());
    }

    #[test]
    fn test_metric_serde_uses_snake_case() {
        let json = serde_json::to_string(&Metric::HrvMs).unwrap();
        assert_eq!(json, "\"hrv_ms\"");
    }

    #[test]
    fn test_source_table_mapping() {
        assert_eq!(Metric::SleepHours.source_table(), SourceTable::SleepEntries);
        assert_eq!(Metric::GlucoseMgdl.source_table(), SourceTable::ChronicMetrics);
        assert!(Metric::BpMean.is_derived());
        assert!(!Metric::BpSystolic.is_derived());
        assert_eq!(Metric::base_metrics().count(), 21);
    }

    #[test]
    fn test_vector_set_rejects_non_finite() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut row = DailyFeatureVector::empty(Uuid::nil(), date);
        assert!(!row.has_any_value());

        row.set(Metric::RestingHr, Some(f64::NAN));
        assert_eq!(row.get(Metric::RestingHr), None);

        row.set(Metric::RestingHr, Some(58.0));
        assert_eq!(row.get(Metric::RestingHr), Some(58.0));
        assert!(row.has_any_value());
    }

    #[test]
    fn test_matrix_helpers() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows: Vec<_> = (0..5)
            .map(|i| {
                let mut row =
                    DailyFeatureVector::empty(Uuid::nil(), start + chrono::Duration::days(i));
                if i % 2 == 0 {
                    row.set(Metric::SleepHours, Some(7.0));
                }
                row
            })
            .collect();
        let matrix = FeatureMatrix {
            user_id: Uuid::nil(),
            start_date: start,
            end_date: start + chrono::Duration::days(4),
            rows,
        };

        assert!(!matrix.is_empty());
        assert_eq!(matrix.non_null_count(Metric::SleepHours), 3);
        assert_eq!(matrix.available_metrics(), vec![Metric::SleepHours]);
        assert_eq!(matrix.trailing(2).len(), 2);
        assert_eq!(matrix.trailing(10).len(), 5);
    }
}

//! Raw Health Entries
//!
//! ストレージから読み込まれるテーブル別の生データ

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 運動強度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseIntensity {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl ExerciseIntensity {
    /// 強度コード（low=1 .. very_high=4）
    pub fn code(&self) -> f64 {
        match self {
            ExerciseIntensity::Low => 1.0,
            ExerciseIntensity::Moderate => 2.0,
            ExerciseIntensity::High => 3.0,
            ExerciseIntensity::VeryHigh => 4.0,
        }
    }
}

/// バイタル測定の時間帯
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// 慢性疾患指標の測定タイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChronicTimeOfDay {
    Fasting,
    PreMeal,
    PostMeal,
    Bedtime,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Diabetes,
    Hypertension,
    Heart,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub duration_hours: f64,
    /// 睡眠の質（1-100）
    pub quality_score: f64,
    pub awakenings: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: f64,
    pub intensity: ExerciseIntensity,
    pub calories_burned: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub sugar_g: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignsEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub time_of_day: TimeOfDay,
    pub resting_heart_rate: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub blood_pressure_systolic: Option<f64>,
    pub blood_pressure_diastolic: Option<f64>,
    pub spo2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMetricsEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub body_fat_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronicMetricsEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub time_of_day: ChronicTimeOfDay,
    pub condition_type: ConditionType,
    pub blood_glucose_mgdl: Option<f64>,
}

/// 実行開始時点で読み込んだユーザーの生データのスナップショット
///
/// 実行中にストレージが更新されても影響を受けない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub sleep: Vec<SleepEntry>,
    pub exercise: Vec<ExerciseEntry>,
    pub food: Vec<FoodEntry>,
    pub vitals: Vec<VitalSignsEntry>,
    pub body: Vec<BodyMetricsEntry>,
    pub chronic: Vec<ChronicMetricsEntry>,
}

impl HealthSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全テーブルの行数合計
    pub fn total_entries(&self) -> usize {
        self.sleep.len()
            + self.exercise.len()
            + self.food.len()
            + self.vitals.len()
            + self.body.len()
            + self.chronic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }

    /// 指定期間（両端含む）以外の行を除外
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> HealthSnapshot {
        let keep = |d: &NaiveDate| *d >= start && *d <= end;
        HealthSnapshot {
            sleep: self.sleep.iter().filter(|e| keep(&e.date)).cloned().collect(),
            exercise: self.exercise.iter().filter(|e| keep(&e.date)).cloned().collect(),
            food: self.food.iter().filter(|e| keep(&e.date)).cloned().collect(),
            vitals: self.vitals.iter().filter(|e| keep(&e.date)).cloned().collect(),
            body: self.body.iter().filter(|e| keep(&e.date)).cloned().collect(),
            chronic: self.chronic.iter().filter(|e| keep(&e.date)).cloned().collect(),
        }
    }
}

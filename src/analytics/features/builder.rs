//! Feature Matrix Builder
//!
//! テーブル別の生データを (ユーザー, 日) 単位の数値行列へ集約する

use super::derived::apply_derived_features;
use super::entries::{
    BodyMetricsEntry, ChronicMetricsEntry, ChronicTimeOfDay, ExerciseEntry, FoodEntry,
    HealthSnapshot, SleepEntry, VitalSignsEntry,
};
use super::types::{DailyFeatureVector, FeatureMatrix, Metric};
use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// 特徴量行列ビルダー
pub struct FeatureMatrixBuilder {
    config: FeatureConfig,
}

impl FeatureMatrixBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// `end_date` を末尾とする `days` 日の窓の開始日
    ///
    /// 0 日、上限 `max_window_days` 超過、日付範囲外はいずれも `InvalidInput`。
    pub fn window_start(&self, end_date: NaiveDate, days: usize) -> Result<NaiveDate> {
        if days == 0 {
            return Err(Error::InvalidInput(
                "Feature window must cover at least one day".to_string(),
            ));
        }
        if days > self.config.max_window_days {
            return Err(Error::InvalidInput(format!(
                "Feature window of {} days exceeds the maximum of {} days",
                days, self.config.max_window_days
            )));
        }
        i64::try_from(days - 1)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|span| end_date.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Feature window of {} days ending {} is out of range",
                    days, end_date
                ))
            })
    }

    /// `end_date` を末尾とする `days` 日分の行列を構築
    ///
    /// 記録のない日も null 行として残す。
    pub fn build(
        &self,
        user_id: Uuid,
        snapshot: &HealthSnapshot,
        end_date: NaiveDate,
        days: usize,
    ) -> Result<FeatureMatrix> {
        let start_date = self.window_start(end_date, days)?;
        let mut rows: Vec<DailyFeatureVector> = (0..days)
            .map(|offset| {
                DailyFeatureVector::empty(user_id, start_date + Duration::days(offset as i64))
            })
            .collect();

        let in_window = |date: NaiveDate| date >= start_date && date <= end_date;

        for (date, entries) in group_by_date(&snapshot.sleep, |e| e.date, in_window) {
            reduce_sleep(&mut rows[row_index(start_date, date)], &entries);
        }
        for (date, entries) in group_by_date(&snapshot.exercise, |e| e.date, in_window) {
            reduce_exercise(&mut rows[row_index(start_date, date)], &entries);
        }
        for (date, entries) in group_by_date(&snapshot.food, |e| e.date, in_window) {
            reduce_food(&mut rows[row_index(start_date, date)], &entries);
        }
        for (date, entries) in group_by_date(&snapshot.vitals, |e| e.date, in_window) {
            reduce_vitals(&mut rows[row_index(start_date, date)], entries);
        }
        for (date, entries) in group_by_date(&snapshot.body, |e| e.date, in_window) {
            reduce_body(&mut rows[row_index(start_date, date)], &entries);
        }
        for (date, entries) in group_by_date(&snapshot.chronic, |e| e.date, in_window) {
            reduce_chronic(&mut rows[row_index(start_date, date)], &entries);
        }

        apply_derived_features(&mut rows, self.config.rolling_window_days);

        let populated = rows.iter().filter(|r| r.has_any_value()).count();
        debug!(
            user_id = %user_id,
            days,
            populated_days = populated,
            "Built feature matrix"
        );

        Ok(FeatureMatrix {
            user_id,
            start_date,
            end_date,
            rows,
        })
    }
}

fn row_index(start: NaiveDate, date: NaiveDate) -> usize {
    (date - start).num_days() as usize
}

fn group_by_date<'a, T>(
    entries: &'a [T],
    date_of: impl Fn(&T) -> NaiveDate,
    in_window: impl Fn(NaiveDate) -> bool,
) -> BTreeMap<NaiveDate, Vec<&'a T>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&'a T>> = BTreeMap::new();
    for entry in entries {
        let date = date_of(entry);
        if in_window(date) {
            groups.entry(date).or_default().push(entry);
        }
    }
    groups
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().filter(|v| v.is_finite()).collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

fn reduce_sleep(row: &mut DailyFeatureVector, entries: &[&SleepEntry]) {
    row.set(
        Metric::SleepHours,
        sum_present(entries.iter().map(|e| finite(e.duration_hours))),
    );

    // 睡眠時間で重み付けした質の平均（時間が全て 0 の場合は単純平均）
    let weighted: Vec<(f64, f64)> = entries
        .iter()
        .filter_map(|e| Some((finite(e.quality_score)?, finite(e.duration_hours)?)))
        .collect();
    let total_weight: f64 = weighted.iter().map(|(_, w)| w.max(0.0)).sum();
    let quality = if total_weight > 0.0 {
        Some(weighted.iter().map(|(q, w)| q * w.max(0.0)).sum::<f64>() / total_weight)
    } else {
        mean_present(entries.iter().map(|e| finite(e.quality_score)))
    };
    row.set(Metric::SleepQuality, quality);

    row.set(
        Metric::Awakenings,
        sum_present(entries.iter().map(|e| e.awakenings)),
    );
}

fn reduce_exercise(row: &mut DailyFeatureVector, entries: &[&ExerciseEntry]) {
    row.set(
        Metric::ExerciseMinutes,
        sum_present(entries.iter().map(|e| finite(e.duration_minutes))),
    );
    row.set(
        Metric::ExerciseCalories,
        sum_present(
            entries
                .iter()
                .map(|e| Some(e.calories_burned.and_then(finite).unwrap_or(0.0))),
        ),
    );
    row.set(
        Metric::ExerciseIntensityAvg,
        mean_present(entries.iter().map(|e| Some(e.intensity.code()))),
    );
}

fn reduce_food(row: &mut DailyFeatureVector, entries: &[&FoodEntry]) {
    row.set(
        Metric::TotalCalories,
        sum_present(entries.iter().map(|e| finite(e.calories))),
    );
    row.set(
        Metric::ProteinG,
        sum_present(entries.iter().map(|e| finite(e.protein_g))),
    );
    row.set(
        Metric::CarbsG,
        sum_present(entries.iter().map(|e| finite(e.carbs_g))),
    );
    row.set(
        Metric::FatsG,
        sum_present(entries.iter().map(|e| finite(e.fats_g))),
    );
    row.set(
        Metric::SugarG,
        sum_present(entries.iter().map(|e| finite(e.sugar_g))),
    );
}

fn reduce_vitals(row: &mut DailyFeatureVector, mut entries: Vec<&VitalSignsEntry>) {
    // 時間帯順で最初の読み値を採用（同一時間帯は入力順）
    entries.sort_by_key(|e| e.time_of_day);
    let first = |field: fn(&VitalSignsEntry) -> Option<f64>| {
        entries.iter().find_map(|e| field(e).and_then(finite))
    };

    row.set(Metric::RestingHr, first(|e| e.resting_heart_rate));
    row.set(Metric::HrvMs, first(|e| e.hrv_ms));
    row.set(Metric::BpSystolic, first(|e| e.blood_pressure_systolic));
    row.set(Metric::BpDiastolic, first(|e| e.blood_pressure_diastolic));
    row.set(Metric::Spo2, first(|e| e.spo2));
}

fn reduce_body(row: &mut DailyFeatureVector, entries: &[&BodyMetricsEntry]) {
    row.set(
        Metric::WeightKg,
        mean_present(entries.iter().map(|e| e.weight_kg)),
    );
    row.set(
        Metric::BodyFatPct,
        mean_present(entries.iter().map(|e| e.body_fat_pct)),
    );
}

fn reduce_chronic(row: &mut DailyFeatureVector, entries: &[&ChronicMetricsEntry]) {
    let first_at = |slot: ChronicTimeOfDay| {
        entries
            .iter()
            .filter(|e| e.time_of_day == slot)
            .find_map(|e| e.blood_glucose_mgdl.and_then(finite))
    };

    let fasting = first_at(ChronicTimeOfDay::Fasting);
    row.set(Metric::GlucoseFasting, fasting);
    row.set(Metric::GlucosePostMeal, first_at(ChronicTimeOfDay::PostMeal));
    row.set(
        Metric::GlucoseMgdl,
        fasting.or_else(|| mean_present(entries.iter().map(|e| e.blood_glucose_mgdl))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::features::entries::{ExerciseIntensity, TimeOfDay};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn builder() -> FeatureMatrixBuilder {
        FeatureMatrixBuilder::new(FeatureConfig::default())
    }

    #[test]
    fn test_gaps_are_kept_as_null_rows() {
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        snapshot.sleep.push(SleepEntry {
            user_id: user,
            date: day(3),
            duration_hours: 7.5,
            quality_score: 80.0,
            awakenings: Some(1.0),
        });

        let matrix = builder().build(user, &snapshot, day(10), 10).unwrap();
        assert_eq!(matrix.len(), 10);
        assert_eq!(matrix.start_date, day(1));
        assert_eq!(matrix.rows[2].sleep_hours, Some(7.5));
        assert!(!matrix.rows[0].has_any_value());
        assert_eq!(matrix.non_null_count(Metric::SleepHours), 1);
    }

    #[test]
    fn test_entries_outside_window_are_ignored() {
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        snapshot.food.push(FoodEntry {
            user_id: user,
            date: day(20),
            calories: 500.0,
            protein_g: 20.0,
            carbs_g: 60.0,
            fats_g: 15.0,
            sugar_g: 10.0,
        });

        let matrix = builder().build(user, &snapshot, day(10), 5).unwrap();
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_sleep_quality_is_duration_weighted() {
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        for (hours, quality) in [(6.0, 90.0), (2.0, 50.0)] {
            snapshot.sleep.push(SleepEntry {
                user_id: user,
                date: day(1),
                duration_hours: hours,
                quality_score: quality,
                awakenings: None,
            });
        }

        let matrix = builder().build(user, &snapshot, day(1), 1).unwrap();
        let row = &matrix.rows[0];
        assert_eq!(row.sleep_hours, Some(8.0));
        assert!((row.sleep_quality.unwrap() - 80.0).abs() < 1e-9);
        assert_eq!(row.awakenings, None);
    }

    #[test]
    fn test_exercise_and_food_are_summed() {
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        snapshot.exercise.push(ExerciseEntry {
            user_id: user,
            date: day(1),
            duration_minutes: 30.0,
            intensity: ExerciseIntensity::Low,
            calories_burned: Some(150.0),
        });
        snapshot.exercise.push(ExerciseEntry {
            user_id: user,
            date: day(1),
            duration_minutes: 45.0,
            intensity: ExerciseIntensity::High,
            calories_burned: None,
        });
        for calories in [600.0, 900.0] {
            snapshot.food.push(FoodEntry {
                user_id: user,
                date: day(1),
                calories,
                protein_g: 30.0,
                carbs_g: 80.0,
                fats_g: 20.0,
                sugar_g: 12.0,
            });
        }

        let matrix = builder().build(user, &snapshot, day(1), 1).unwrap();
        let row = &matrix.rows[0];
        assert_eq!(row.exercise_minutes, Some(75.0));
        assert_eq!(row.exercise_calories, Some(150.0));
        assert_eq!(row.exercise_intensity_avg, Some(2.0));
        assert_eq!(row.total_calories, Some(1500.0));
        assert_eq!(row.protein_g, Some(60.0));
        assert!((row.protein_ratio.unwrap() - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_vitals_take_earliest_reading_per_field() {
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        snapshot.vitals.push(VitalSignsEntry {
            user_id: user,
            date: day(1),
            time_of_day: TimeOfDay::Evening,
            resting_heart_rate: Some(70.0),
            hrv_ms: Some(40.0),
            blood_pressure_systolic: Some(125.0),
            blood_pressure_diastolic: Some(85.0),
            spo2: None,
        });
        snapshot.vitals.push(VitalSignsEntry {
            user_id: user,
            date: day(1),
            time_of_day: TimeOfDay::Morning,
            resting_heart_rate: Some(58.0),
            hrv_ms: None,
            blood_pressure_systolic: Some(118.0),
            blood_pressure_diastolic: Some(76.0),
            spo2: Some(98.0),
        });

        let matrix = builder().build(user, &snapshot, day(1), 1).unwrap();
        let row = &matrix.rows[0];
        assert_eq!(row.resting_hr, Some(58.0));
        assert_eq!(row.hrv_ms, Some(40.0));
        assert_eq!(row.spo2, Some(98.0));
        let bp_mean = row.bp_mean.unwrap();
        assert!((bp_mean - (118.0 + 2.0 * 76.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_glucose_prefers_fasting_reading() {
        use crate::analytics::features::entries::ConditionType;
        let user = Uuid::new_v4();
        let mut snapshot = HealthSnapshot::new();
        for (slot, value) in [
            (ChronicTimeOfDay::PostMeal, 160.0),
            (ChronicTimeOfDay::Fasting, 95.0),
            (ChronicTimeOfDay::Bedtime, 120.0),
        ] {
            snapshot.chronic.push(ChronicMetricsEntry {
                user_id: user,
                date: day(2),
                time_of_day: slot,
                condition_type: ConditionType::Diabetes,
                blood_glucose_mgdl: Some(value),
            });
        }
        snapshot.chronic.push(ChronicMetricsEntry {
            user_id: user,
            date: day(1),
            time_of_day: ChronicTimeOfDay::Bedtime,
            condition_type: ConditionType::Diabetes,
            blood_glucose_mgdl: Some(110.0),
        });
        snapshot.chronic.push(ChronicMetricsEntry {
            user_id: user,
            date: day(1),
            time_of_day: ChronicTimeOfDay::Other,
            condition_type: ConditionType::Diabetes,
            blood_glucose_mgdl: Some(130.0),
        });

        let matrix = builder().build(user, &snapshot, day(2), 2).unwrap();
        assert_eq!(matrix.rows[0].glucose_mgdl, Some(120.0));
        assert_eq!(matrix.rows[0].glucose_fasting, None);
        assert_eq!(matrix.rows[1].glucose_mgdl, Some(95.0));
        assert_eq!(matrix.rows[1].glucose_post_meal, Some(160.0));
    }

    #[test]
    fn test_zero_days_is_rejected() {
        let result = builder().build(Uuid::new_v4(), &HealthSnapshot::new(), day(1), 0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let b = builder();
        let max = FeatureConfig::default().max_window_days;
        assert!(b.window_start(day(30), max).is_ok());
        for days in [max + 1, 100_000_000, usize::MAX] {
            let result = b.build(Uuid::new_v4(), &HealthSnapshot::new(), day(30), days);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_window_before_earliest_date_is_rejected() {
        let b = FeatureMatrixBuilder::new(FeatureConfig {
            max_window_days: usize::MAX,
            ..FeatureConfig::default()
        });
        let result = b.window_start(NaiveDate::MIN, 2);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(b.window_start(NaiveDate::MIN, 1).unwrap(), NaiveDate::MIN);
    }
}

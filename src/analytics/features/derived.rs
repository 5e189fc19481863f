//! Derived Features
//!
//! 集約済み行列に対する二次計算（比率・差分・ローリング統計）

use super::types::{DailyFeatureVector, Metric};

const MIN_VARIABILITY_READINGS: usize = 3;

/// 完成した行列に派生特徴量を書き込む
///
/// 行は日付順かつ1日1行であること。入力が欠けている日の派生値は null。
pub fn apply_derived_features(rows: &mut [DailyFeatureVector], window: usize) {
    let window = window.max(1);

    for row in rows.iter_mut() {
        let ratio = match (row.protein_g, row.total_calories) {
            (Some(protein), Some(calories)) if calories > 0.0 => Some(protein * 4.0 / calories),
            _ => None,
        };
        row.set(Metric::ProteinRatio, ratio);

        let bp_mean = match (row.bp_systolic, row.bp_diastolic) {
            (Some(sys), Some(dia)) => Some((sys + 2.0 * dia) / 3.0),
            _ => None,
        };
        row.set(Metric::BpMean, bp_mean);
    }

    let weights: Vec<Option<f64>> = rows.iter().map(|r| r.weight_kg).collect();
    let glucose: Vec<Option<f64>> = rows.iter().map(|r| r.glucose_mgdl).collect();
    let sleep: Vec<Option<f64>> = rows.iter().map(|r| r.sleep_hours).collect();

    for (i, row) in rows.iter_mut().enumerate() {
        row.set(Metric::WeightChange7d, weight_change(&weights, i, window));

        let start = (i + 1).saturating_sub(window);
        let glucose_window: Vec<f64> = glucose[start..=i].iter().flatten().copied().collect();
        let variability = (glucose_window.len() >= MIN_VARIABILITY_READINGS)
            .then(|| sample_std(&glucose_window));
        row.set(Metric::GlucoseVariability, variability);

        let deviation = sleep[i].map(|today| {
            let recent: Vec<f64> = sleep[start..=i].iter().flatten().copied().collect();
            today - recent.iter().sum::<f64>() / recent.len() as f64
        });
        row.set(Metric::SleepHoursDeviation, deviation);
    }
}

/// 当日の体重と、`window` 日以上前の直近の体重との差
fn weight_change(weights: &[Option<f64>], index: usize, window: usize) -> Option<f64> {
    let today = weights[index]?;
    let cutoff = index.checked_sub(window)?;
    let previous = weights[..=cutoff].iter().rev().find_map(|w| *w)?;
    Some(today - previous)
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn rows(n: usize) -> Vec<DailyFeatureVector> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| DailyFeatureVector::empty(Uuid::nil(), start + Duration::days(i as i64)))
            .collect()
    }

    #[test]
    fn test_protein_ratio_requires_positive_calories() {
        let mut data = rows(2);
        data[0].protein_g = Some(50.0);
        data[0].total_calories = Some(0.0);
        data[1].protein_g = Some(50.0);
        data[1].total_calories = Some(2000.0);

        apply_derived_features(&mut data, 7);
        assert_eq!(data[0].protein_ratio, None);
        assert!((data[1].protein_ratio.unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_weight_change_carries_forward_last_known_weight() {
        let mut data = rows(10);
        data[0].weight_kg = Some(80.0);
        data[1].weight_kg = Some(79.5);
        data[9].weight_kg = Some(78.5);

        apply_derived_features(&mut data, 7);
        // day 9 - 7 = day 2 has no reading, so the last known (day 1) is used
        assert!((data[9].weight_change_7d.unwrap() - (-1.0)).abs() < 1e-12);
        assert_eq!(data[1].weight_change_7d, None);
    }

    #[test]
    fn test_glucose_variability_needs_three_readings() {
        let mut data = rows(4);
        data[0].glucose_mgdl = Some(100.0);
        data[1].glucose_mgdl = Some(110.0);
        data[3].glucose_mgdl = Some(120.0);

        apply_derived_features(&mut data, 7);
        assert_eq!(data[1].glucose_variability, None);
        assert!((data[3].glucose_variability.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_deviation_uses_trailing_mean() {
        let mut data = rows(3);
        data[0].sleep_hours = Some(7.0);
        data[1].sleep_hours = Some(8.0);
        data[2].sleep_hours = Some(6.0);

        apply_derived_features(&mut data, 7);
        assert_eq!(data[0].sleep_hours_deviation, Some(0.0));
        assert!((data[2].sleep_hours_deviation.unwrap() - (-1.0)).abs() < 1e-12);
    }
}

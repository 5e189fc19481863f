//! Population Baseline Enrichment
//!
//! ユーザーの相関値を母集団の参照分布と比較し、パーセンタイルと
//! 行動可能性（is_actionable）を付与する

use super::stats::normal_cdf;
use super::types::{CorrelationRecord, CorrelationStrength, PopulationComparison};
use crate::analytics::features::Metric;
use crate::config::CorrelationConfig;
use serde::{Deserialize, Serialize};

/// 参照分布（メトリクスペアごとの平均・標準偏差）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationBaseline {
    pub mean: f64,
    pub std: f64,
    pub is_default: bool,
}

impl PopulationBaseline {
    pub fn new(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std,
            is_default: false,
        }
    }
}

/// 参照が無いペアの中立分布
pub const NEUTRAL_BASELINE: PopulationBaseline = PopulationBaseline {
    mean: 0.0,
    std: 0.25,
    is_default: true,
};

/// 組み込みの参照表
const BUILTIN_BASELINES: [(Metric, Metric, f64, f64); 8] = [
    (Metric::ExerciseMinutes, Metric::SleepQuality, 0.35, 0.15),
    (Metric::ExerciseMinutes, Metric::RestingHr, -0.25, 0.12),
    (Metric::TotalCalories, Metric::WeightKg, 0.20, 0.18),
    (Metric::SleepHours, Metric::HrvMs, 0.30, 0.14),
    (Metric::SugarG, Metric::SleepQuality, -0.18, 0.10),
    (Metric::SleepQuality, Metric::RestingHr, -0.22, 0.11),
    (Metric::ExerciseMinutes, Metric::HrvMs, 0.28, 0.13),
    (Metric::CarbsG, Metric::GlucoseFasting, 0.25, 0.15),
];

/// 組み込み参照表を引く（順序は問わない）。無ければ中立分布
pub fn default_baseline(a: Metric, b: Metric) -> PopulationBaseline {
    BUILTIN_BASELINES
        .iter()
        .find(|(x, y, _, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|&(_, _, mean, std)| PopulationBaseline {
            mean,
            std,
            is_default: true,
        })
        .unwrap_or(NEUTRAL_BASELINE)
}

/// 値を参照分布と比較
pub fn compare(value: f64, baseline: PopulationBaseline) -> PopulationComparison {
    let std = if baseline.std.is_finite() && baseline.std > 0.0 {
        baseline.std
    } else {
        NEUTRAL_BASELINE.std
    };
    let z = (value - baseline.mean) / std;
    PopulationComparison {
        population_mean: baseline.mean,
        population_std: std,
        percentile_rank: (normal_cdf(z) * 100.0).clamp(0.0, 100.0),
        z_vs_population: z,
        is_default_baseline: baseline.is_default,
    }
}

/// 母集団から大きく外れる、または中程度以上かつ極端なパーセンタイル
pub fn is_actionable(
    strength: CorrelationStrength,
    comparison: &PopulationComparison,
    config: &CorrelationConfig,
) -> bool {
    let deviates = comparison.z_vs_population.abs() > config.population_deviation_z;
    let extreme = comparison.percentile_rank >= config.extreme_percentile
        || comparison.percentile_rank <= 100.0 - config.extreme_percentile;
    deviates || (strength >= CorrelationStrength::Moderate && extreme)
}

/// レコードに母集団比較を付与（値と強さは変更しない）
pub fn enrich(
    record: &mut CorrelationRecord,
    baseline: PopulationBaseline,
    config: &CorrelationConfig,
) {
    let comparison = compare(record.correlation_value, baseline);
    record.is_actionable = is_actionable(record.strength, &comparison, config);
    record.details.population = Some(comparison);
}

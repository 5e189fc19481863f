//! Mutual Information
//!
//! KSG 推定量による非線形依存の検出。有意性はシード付き並べ替え検定で判定する

use super::method::{CorrelationMethod, MetricPair};
use super::stats::{information_coefficient, ksg_mutual_information};
use super::types::{CausalDirection, CorrelationCandidate, CorrelationDetails, CorrelationType};
use crate::analytics::features::Metric;
use crate::config::CorrelationConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 並べ替え検定の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationTest {
    pub mutual_information: f64,
    pub p_value: f64,
}

/// y をシャッフルして帰無分布を作り、p = (1 + #{MI_perm ≥ MI}) / (permutations + 1)
pub fn permutation_test(
    x: &[f64],
    y: &[f64],
    k: usize,
    permutations: usize,
    seed: u64,
) -> Option<PermutationTest> {
    let observed = ksg_mutual_information(x, y, k)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled = y.to_vec();
    let mut exceed = 0usize;
    for _ in 0..permutations {
        shuffled.shuffle(&mut rng);
        if let Some(mi) = ksg_mutual_information(x, &shuffled, k) {
            if mi >= observed {
                exceed += 1;
            }
        }
    }
    Some(PermutationTest {
        mutual_information: observed,
        p_value: (1 + exceed) as f64 / (permutations + 1) as f64,
    })
}

/// ペアごとに独立で再現可能な乱数シード
pub fn pair_seed(seed: u64, a: Metric, b: Metric) -> u64 {
    seed ^ ((a as u64) << 32 | b as u64)
}

/// 相互情報量
pub struct MutualInfoMethod {
    min_overlap: usize,
    neighbors: usize,
    permutations: usize,
    significance_level: f64,
    seed: u64,
}

impl MutualInfoMethod {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            min_overlap: config.min_overlap,
            neighbors: config.mi_neighbors,
            permutations: config.mi_permutations,
            significance_level: config.significance_level,
            seed: config.seed,
        }
    }
}

impl CorrelationMethod for MutualInfoMethod {
    fn correlation_type(&self) -> CorrelationType {
        CorrelationType::MutualInfo
    }

    fn analyze(&self, pair: &MetricPair) -> Option<CorrelationCandidate> {
        let (x, y) = pair.aligned();
        if x.len() < self.min_overlap {
            return None;
        }
        let test = permutation_test(
            &x,
            &y,
            self.neighbors,
            self.permutations,
            pair_seed(self.seed, pair.metric_a, pair.metric_b),
        )?;
        if test.mutual_information <= 0.0 || test.p_value >= self.significance_level {
            return None;
        }
        let value = information_coefficient(test.mutual_information);

        Some(CorrelationCandidate {
            metric_a: pair.metric_a,
            metric_b: pair.metric_b,
            correlation_type: CorrelationType::MutualInfo,
            value,
            p_value: Some(test.p_value),
            lag_days: 0,
            causal_direction: CausalDirection::None,
            confidence: ((1.0 - test.p_value) * value).clamp(0.0, 1.0),
            sample_size: x.len(),
            details: CorrelationDetails {
                mutual_information: Some(test.mutual_information),
                ..CorrelationDetails::default()
            },
        })
    }
}

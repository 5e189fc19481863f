//! Outlier Models
//!
//! Isolation Forest と帰属計算用の K-means

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const KMEANS_MAX_ITERATIONS: usize = 50;

/// 不成功探索の平均パス長 c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// ランダム分割による孤立木
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &Array2<f64>, rows: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, rows, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let index = self.nodes.len();
        if depth >= height_limit || rows.len() <= 1 {
            self.nodes.push(Node::Leaf { size: rows.len() });
            return index;
        }

        // 値に幅がある特徴量のみ分割候補にする
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data[[r, feature]];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            self.nodes.push(Node::Leaf { size: rows.len() });
            return index;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let split = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[[r, feature]] < split);

        self.nodes.push(Node::Leaf { size: 0 });
        let left = self.grow(data, left_rows, depth + 1, height_limit, rng);
        let right = self.grow(data, right_rows, depth + 1, height_limit, rng);
        self.nodes[index] = Node::Internal {
            feature,
            split,
            left,
            right,
        };
        index
    }

    fn path_length(&self, point: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Internal {
                    feature,
                    split,
                    left,
                    right,
                } => {
                    index = if point[*feature] < *split { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// シード固定の Isolation Forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample: usize,
}

impl IsolationForest {
    /// 行列（行 = 観測, 列 = 特徴量）に対して森を構築
    pub fn fit(data: &Array2<f64>, n_trees: usize, subsample_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = data.nrows();
        if n == 0 {
            return Self {
                trees: Vec::new(),
                subsample: 0,
            };
        }
        let subsample = subsample_size.min(n).max(1);
        let height_limit = (subsample as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let rows = sample(&mut rng, n, subsample).into_vec();
                IsolationTree::build(data, rows, height_limit, &mut rng)
            })
            .collect();

        Self { trees, subsample }
    }

    /// 異常スコア 2^(-E(h)/c(ψ))（1 に近いほど異常）
    pub fn score(&self, point: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path = self.trees.iter().map(|t| t.path_length(point)).sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.subsample);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    pub fn score_all(&self, data: &Array2<f64>) -> Vec<f64> {
        data.axis_iter(Axis(0)).map(|row| self.score(row)).collect()
    }
}

/// 決定的初期化（最遠点法）の K-means
#[derive(Debug, Clone)]
pub struct KMeans {
    pub centroids: Vec<Array1<f64>>,
}

impl KMeans {
    /// クラスタ中心を学習（k はサンプル数で頭打ち）
    pub fn fit(data: &Array2<f64>, k: usize) -> Option<Self> {
        let n = data.nrows();
        if n == 0 || k == 0 {
            return None;
        }
        let k = k.min(n);

        // 全体平均に最も近い点から開始し、既存中心から最も遠い点を順に追加
        let overall = data.mean_axis(Axis(0))?;
        let mut chosen = vec![nearest(data, &[overall])?.0];
        while chosen.len() < k {
            let current: Vec<Array1<f64>> = chosen.iter().map(|&i| data.row(i).to_owned()).collect();
            let (next, dist) = (0..n)
                .filter(|i| !chosen.contains(i))
                .map(|i| (i, min_distance(data.row(i), &current)))
                .fold((usize::MAX, f64::NEG_INFINITY), |best, cand| {
                    if cand.1 > best.1 {
                        cand
                    } else {
                        best
                    }
                });
            if next == usize::MAX || dist <= 0.0 {
                break;
            }
            chosen.push(next);
        }

        let mut centroids: Vec<Array1<f64>> = chosen.iter().map(|&i| data.row(i).to_owned()).collect();
        for _ in 0..KMEANS_MAX_ITERATIONS {
            let assignments: Vec<usize> = data
                .axis_iter(Axis(0))
                .map(|row| nearest_centroid(row, &centroids))
                .collect();

            let mut updated = centroids.clone();
            for (c, centroid) in updated.iter_mut().enumerate() {
                let members: Vec<usize> = assignments
                    .iter()
                    .enumerate()
                    .filter(|(_, &a)| a == c)
                    .map(|(i, _)| i)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                *centroid = data.select(Axis(0), &members).mean_axis(Axis(0))?;
            }

            let converged = updated
                .iter()
                .zip(&centroids)
                .all(|(a, b)| euclidean_distance(a.view(), b.view()) < 1e-9);
            centroids = updated;
            if converged {
                break;
            }
        }

        Some(Self { centroids })
    }

    /// 最も近いクラスタ中心
    pub fn nearest(&self, point: ArrayView1<f64>) -> &Array1<f64> {
        &self.centroids[nearest_centroid(point, &self.centroids)]
    }
}

fn nearest(data: &Array2<f64>, targets: &[Array1<f64>]) -> Option<(usize, f64)> {
    data.axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| (i, min_distance(row, targets)))
        .fold(None, |best: Option<(usize, f64)>, cand| match best {
            Some(b) if b.1 <= cand.1 => Some(b),
            _ => Some(cand),
        })
}

fn nearest_centroid(point: ArrayView1<f64>, centroids: &[Array1<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, euclidean_distance(point, c.view())))
        .fold((0, f64::INFINITY), |best, cand| if cand.1 < best.1 { cand } else { best })
        .0
}

fn min_distance(point: ArrayView1<f64>, centroids: &[Array1<f64>]) -> f64 {
    centroids
        .iter()
        .map(|c| euclidean_distance(point, c.view()))
        .fold(f64::INFINITY, f64::min)
}

/// ユークリッド距離を計算
fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

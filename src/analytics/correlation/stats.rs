//! Statistical Kernels
//!
//! 相関手法が共有する数値計算（ピアソン・OLS・単位根検定・KSG 相互情報量）

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use statrs::function::gamma::digamma;

/// Dickey-Fuller 検定の 5% 臨界値（定数項あり）
pub const DICKEY_FULLER_CRITICAL_5PCT: f64 = -2.86;

/// 両系列とも値がある位置のみを取り出す
pub fn aligned_pairs(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b.iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .unzip()
}

/// ピアソン相関係数（いずれかの分散がゼロなら `None`）
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 3 || n != y.len() {
        return None;
    }
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mx;
        let dy = yi - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 1e-12 || syy <= 1e-12 {
        return None;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    r.is_finite().then_some(r)
}

/// 相関係数の両側 p 値（自由度 n-2 の t 分布）
pub fn pearson_p_value(r: f64, n: usize) -> Option<f64> {
    if n < 3 || !r.is_finite() {
        return None;
    }
    let df = (n - 2) as f64;
    if 1.0 - r * r <= 1e-15 {
        return Some(0.0);
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p = 2.0 * (1.0 - dist.cdf(t.abs()));
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}

/// F 統計量の上側確率
pub fn f_test_p_value(f: f64, d1: f64, d2: f64) -> Option<f64> {
    if !f.is_finite() || f < 0.0 {
        return None;
    }
    let dist = FisherSnedecor::new(d1, d2).ok()?;
    let p = 1.0 - dist.cdf(f);
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}

/// 標準正規分布の累積分布関数
pub fn normal_cdf(z: f64) -> f64 {
    Normal::new(0.0, 1.0).map(|n| n.cdf(z)).unwrap_or(f64::NAN)
}

/// 最小二乗法の残差平方和
///
/// 正規方程式をピボット付きガウス消去で解く。特異行列なら `None`。
pub fn ols_rss(design: &Array2<f64>, target: &Array1<f64>) -> Option<f64> {
    let xtx = design.t().dot(design);
    let xty = design.t().dot(target);
    let beta = solve(xtx, xty)?;
    let residuals = target - &design.dot(&beta);
    let rss = residuals.mapv(|r| r * r).sum();
    rss.is_finite().then_some(rss)
}

fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= 1e-12 * scale {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// 1 階差分
pub fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Dickey-Fuller 回帰 Δy_t = α + γ·y_{t-1} の γ の t 値
pub fn dickey_fuller_t(series: &[f64]) -> Option<f64> {
    if series.len() < 4 {
        return None;
    }
    let lagged = &series[..series.len() - 1];
    let delta = difference(series);
    let n = delta.len() as f64;

    let mx = lagged.iter().sum::<f64>() / n;
    let my = delta.iter().sum::<f64>() / n;
    let sxx: f64 = lagged.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx <= 1e-12 {
        return None;
    }
    let sxy: f64 = lagged.iter().zip(&delta).map(|(x, y)| (x - mx) * (y - my)).sum();
    let gamma = sxy / sxx;
    let alpha = my - gamma * mx;
    let rss: f64 = lagged
        .iter()
        .zip(&delta)
        .map(|(x, y)| (y - alpha - gamma * x).powi(2))
        .sum();
    let sigma2 = rss / (n - 2.0);
    let se = (sigma2 / sxx).sqrt();
    if se <= 1e-15 {
        // 残差ゼロの完全なフィット
        return Some(if gamma < 0.0 { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    let t = gamma / se;
    (!t.is_nan()).then_some(t)
}

/// 単位根を棄却できる（定常とみなせる）か
pub fn is_stationary(series: &[f64]) -> bool {
    dickey_fuller_t(series).is_some_and(|t| t <= DICKEY_FULLER_CRITICAL_5PCT)
}

/// KSG 推定量（アルゴリズム1、最大ノルム）による相互情報量（nats, 0 以上）
pub fn ksg_mutual_information(x: &[f64], y: &[f64], k: usize) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n <= k || k == 0 {
        return None;
    }
    let x = standardize(x)?;
    let y = standardize(y)?;

    let mut psi_sum = 0.0;
    let mut distances: Vec<f64> = Vec::with_capacity(n - 1);
    for i in 0..n {
        distances.clear();
        distances.extend(
            (0..n)
                .filter(|&j| j != i)
                .map(|j| (x[i] - x[j]).abs().max((y[i] - y[j]).abs())),
        );
        distances.sort_by(f64::total_cmp);
        let eps = distances[k - 1];

        let nx = (0..n).filter(|&j| j != i && (x[i] - x[j]).abs() < eps).count();
        let ny = (0..n).filter(|&j| j != i && (y[i] - y[j]).abs() < eps).count();
        psi_sum += digamma(nx as f64 + 1.0) + digamma(ny as f64 + 1.0);
    }

    let mi = digamma(k as f64) + digamma(n as f64) - psi_sum / n as f64;
    mi.is_finite().then_some(mi.max(0.0))
}

/// 相互情報量を [0, 1) の情報係数へ変換
pub fn information_coefficient(mi: f64) -> f64 {
    (1.0 - (-2.0 * mi).exp()).max(0.0).sqrt()
}

fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std <= 1e-12 {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

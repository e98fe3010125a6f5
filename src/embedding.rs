use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::euclidean;
use crate::config::EmbeddingConfig;

const GRADIENT_CLIP: f64 = 4.0;
const MIN_EDGE_WEIGHT: f64 = 1e-10;
const INIT_SPAN: f64 = 10.0;
const INIT_JITTER: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPoint {
    /// Foreign key into the role table.
    pub key: String,
    pub cluster: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTable {
    pub rows: Vec<EmbeddingPoint>,
}

/// Neighbourhood-preserving 2-D projection. The same points and seed always
/// give the same layout.
pub fn project(points: &[Vec<f64>], config: &EmbeddingConfig) -> Vec<[f64; 2]> {
    let n = points.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }
    let k = config.n_neighbors.min(n - 1).max(1);

    let knn: Vec<Vec<(usize, f64)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut neighbors: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, euclidean(&points[i], &points[j])))
                .collect();
            neighbors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            neighbors.truncate(k);
            neighbors
        })
        .collect();

    let edges = fuzzy_edges(&knn, k);
    let mut coords = initial_layout(points);
    let mut rng = StdRng::seed_from_u64(config.seed);
    for [x, y] in coords.iter_mut() {
        *x += rng.gen_range(-INIT_JITTER..INIT_JITTER);
        *y += rng.gen_range(-INIT_JITTER..INIT_JITTER);
    }

    let (a, b) = (config.min_dist_a, config.min_dist_b);
    let epochs = config.n_epochs.max(1);
    for epoch in 0..config.n_epochs {
        let lr = config.learning_rate * (1.0 - epoch as f64 / epochs as f64);
        for &(i, j, w) in &edges {
            if rng.gen_range(0.0..1.0) >= w {
                continue;
            }
            let dx = coords[i][0] - coords[j][0];
            let dy = coords[i][1] - coords[j][1];
            let dist_sq = dx * dx + dy * dy;
            if dist_sq > 0.0 {
                let coeff = -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
                let fx = clip(coeff * dx) * lr;
                let fy = clip(coeff * dy) * lr;
                coords[i][0] += fx;
                coords[i][1] += fy;
                coords[j][0] -= fx;
                coords[j][1] -= fy;
            }

            for _ in 0..config.negative_sample_rate {
                let other = rng.gen_range(0..n);
                if other == i {
                    continue;
                }
                let dx = coords[i][0] - coords[other][0];
                let dy = coords[i][1] - coords[other][1];
                let dist_sq = dx * dx + dy * dy;
                if dist_sq <= 0.0 {
                    continue;
                }
                let coeff = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist_sq.powf(b)));
                coords[i][0] += clip(coeff * dx) * lr;
                coords[i][1] += clip(coeff * dy) * lr;
            }
        }
    }

    debug!(points = n, neighbors = k, edges = edges.len(), "optimized 2-D embedding");
    coords
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

/// Symmetrised fuzzy kNN graph as `(i, j, weight)` with `i < j`, in
/// ascending pair order.
fn fuzzy_edges(knn: &[Vec<(usize, f64)>], k: usize) -> Vec<(usize, usize, f64)> {
    let target = (k as f64).log2();
    let mut directed: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();
    for (i, neighbors) in knn.iter().enumerate() {
        let rho = neighbors
            .iter()
            .map(|&(_, d)| d)
            .find(|d| *d > 0.0)
            .unwrap_or(0.0);
        let sigma = find_sigma(neighbors, rho, target);
        for &(j, d) in neighbors {
            let w = if d <= rho { 1.0 } else { (-(d - rho) / sigma).exp() };
            let entry = directed.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
            if i < j {
                entry.0 = w;
            } else {
                entry.1 = w;
            }
        }
    }
    directed
        .into_iter()
        .map(|((i, j), (p, q))| (i, j, p + q - p * q))
        .filter(|(_, _, w)| *w > MIN_EDGE_WEIGHT)
        .collect()
}

/// Bandwidth whose membership sum over the neighbours matches `target`.
fn find_sigma(neighbors: &[(usize, f64)], rho: f64, target: f64) -> f64 {
    let mass = |sigma: f64| -> f64 {
        neighbors
            .iter()
            .map(|&(_, d)| if d <= rho { 1.0 } else { (-(d - rho) / sigma).exp() })
            .sum()
    };
    let mut lo = 1e-10_f64;
    let mut hi = 1.0_f64;
    while mass(hi) < target && hi < 1e12 {
        hi *= 2.0;
    }
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if mass(mid) > target {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

// First two reduced coordinates, each rescaled onto [0, INIT_SPAN].
fn initial_layout(points: &[Vec<f64>]) -> Vec<[f64; 2]> {
    let axis = |dim: usize| -> Vec<f64> {
        let raw: Vec<f64> = points.iter().map(|p| p.get(dim).copied().unwrap_or(0.0)).collect();
        let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        raw.into_iter()
            .map(|v| if span > 0.0 { (v - lo) / span * INIT_SPAN } else { 0.0 })
            .collect()
    };
    let xs = axis(0);
    let ys = axis(1);
    xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let mut out = Vec::new();
        for i in 0..10 {
            let t = i as f64 * 0.05;
            out.push(vec![t, -t, 0.5 * t]);
        }
        for i in 0..10 {
            let t = i as f64 * 0.05;
            out.push(vec![20.0 + t, 20.0 - t, 0.5 * t]);
        }
        out
    }

    fn small_config() -> EmbeddingConfig {
        EmbeddingConfig {
            n_neighbors: 5,
            n_epochs: 60,
            ..Default::default()
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let points = blobs();
        let a = project(&points, &small_config());
        let b = project(&points, &small_config());
        assert_eq!(a, b);

        let reseeded = EmbeddingConfig {
            seed: 7,
            ..small_config()
        };
        assert_ne!(a, project(&points, &reseeded));
    }

    #[test]
    fn layout_is_finite_and_keeps_groups_apart() {
        let coords = project(&blobs(), &small_config());
        assert!(coords.iter().all(|[x, y]| x.is_finite() && y.is_finite()));

        let centroid = |range: std::ops::Range<usize>| {
            let len = range.len() as f64;
            let (sx, sy) = coords[range]
                .iter()
                .fold((0.0_f64, 0.0_f64), |(sx, sy), [x, y]| (sx + x, sy + y));
            [sx / len, sy / len]
        };
        let ca = centroid(0..10);
        let cb = centroid(10..20);
        let between = euclidean(&ca, &cb);
        let spread = coords[..10]
            .iter()
            .map(|p| euclidean(p, &ca))
            .fold(0.0, f64::max);
        assert!(between > spread);
    }

    #[test]
    fn tiny_inputs() {
        assert!(project(&[], &EmbeddingConfig::default()).is_empty());
        assert_eq!(project(&[vec![1.0, 2.0]], &EmbeddingConfig::default()), vec![[0.0, 0.0]]);
        let two = project(&[vec![0.0], vec![1.0]], &EmbeddingConfig::default());
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn edges_are_symmetric_fuzzy_unions() {
        let knn = vec![
            vec![(1, 1.0), (2, 2.0)],
            vec![(0, 1.0), (2, 1.5)],
            vec![(1, 1.5), (0, 2.0)],
        ];
        // With two neighbours only the nearest keeps any membership, so the
        // 1-2 edge survives through point 2 alone and 0-2 vanishes.
        let edges = fuzzy_edges(&knn, 2);
        assert_eq!(edges, vec![(0, 1, 1.0), (1, 2, 1.0)]);
    }
}

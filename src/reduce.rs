use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Principal component basis fitted once per run. Components are ordered by
/// explained variance, descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub mean: Vec<f64>,
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl Pca {
    /// Keeps the smallest prefix of components whose cumulative explained
    /// variance ratio reaches `variance_target`.
    pub fn fit(rows: &[Vec<f64>], variance_target: f64) -> Self {
        let n = rows.len();
        let d = rows.first().map(Vec::len).unwrap_or(0);
        if n == 0 || d == 0 {
            return Self {
                mean: vec![0.0; d],
                components: Vec::new(),
                explained_variance: Vec::new(),
                explained_variance_ratio: Vec::new(),
            };
        }

        let mut mean = vec![0.0; d];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }

        let centered = DMatrix::from_fn(n, d, |i, j| rows[i][j] - mean[j]);
        let cov = (centered.transpose() * &centered) / (n.saturating_sub(1).max(1) as f64);
        let eigen = SymmetricEigen::new(cov);

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|a, b| {
            eigen.eigenvalues[*b]
                .total_cmp(&eigen.eigenvalues[*a])
                .then(a.cmp(b))
        });
        let values: Vec<f64> = order
            .iter()
            .map(|&idx| eigen.eigenvalues[idx].max(0.0))
            .collect();
        let total: f64 = values.iter().sum();

        let max_components = n.min(d);
        let keep = if total > 0.0 {
            let mut cumulative = 0.0;
            let mut keep = max_components;
            for (idx, v) in values.iter().enumerate().take(max_components) {
                cumulative += v / total;
                if cumulative >= variance_target - 1e-12 {
                    keep = idx + 1;
                    break;
                }
            }
            keep
        } else {
            1
        };

        let components: Vec<Vec<f64>> = order
            .iter()
            .take(keep)
            .map(|&idx| {
                let mut v: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
                fix_sign(&mut v);
                v
            })
            .collect();
        let explained_variance: Vec<f64> = values.iter().take(keep).copied().collect();
        let explained_variance_ratio = explained_variance
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect();

        debug!(
            samples = n,
            features = d,
            components = keep,
            "fitted principal components"
        );

        Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        }
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn cumulative_ratio(&self) -> f64 {
        self.explained_variance_ratio.iter().sum()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        self.components
            .iter()
            .map(|component| {
                component
                    .iter()
                    .zip(row.iter().zip(&self.mean))
                    .map(|(c, (x, m))| c * (x - m))
                    .sum()
            })
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Largest-magnitude loading made positive so the basis is reproducible.
fn fix_sign(v: &mut [f64]) {
    let mut pivot = 0.0_f64;
    for x in v.iter() {
        if x.abs() > pivot.abs() {
            pivot = *x;
        }
    }
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

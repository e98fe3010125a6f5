use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineWarning;
use crate::features::FeatureTable;

/// Median/IQR scaler fitted once over the full included population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub feature_names: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    pub fn fit(table: &FeatureTable) -> Self {
        let mut center = Vec::with_capacity(table.dims());
        let mut scale = Vec::with_capacity(table.dims());
        for idx in 0..table.dims() {
            let mut values = table.column(idx);
            values.sort_by(f64::total_cmp);
            center.push(quantile_sorted(&values, 0.5));
            scale.push(quantile_sorted(&values, 0.75) - quantile_sorted(&values, 0.25));
        }
        Self {
            feature_names: table.feature_names.clone(),
            center,
            scale,
        }
    }

    pub fn zero_spread_features(&self) -> Vec<&str> {
        self.scale
            .iter()
            .zip(&self.feature_names)
            .filter(|(s, _)| **s <= 0.0)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    pub fn warnings(&self) -> Vec<PipelineWarning> {
        self.zero_spread_features()
            .into_iter()
            .map(|feature| {
                warn!(feature, "zero interquartile range, feature scaled to 0");
                PipelineWarning::ZeroSpreadFeature {
                    feature: feature.to_string(),
                }
            })
            .collect()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (c, s))| if *s > 0.0 { (x - c) / s } else { 0.0 })
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<f64>>) -> FeatureTable {
        let n = rows.len();
        FeatureTable {
            meta: vec![Default::default(); n],
            source_rows: (0..n).collect(),
            nineties: vec![10.0; n],
            feature_names: vec!["a".into(), "b".into()],
            rows,
        }
    }

    #[test]
    fn quantiles_interpolate() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&v, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile_sorted(&v, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&v, 0.75) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn centers_on_median_and_scales_by_iqr() {
        let t = table(vec![
            vec![1.0, 5.0],
            vec![2.0, 5.0],
            vec![3.0, 5.0],
            vec![4.0, 5.0],
            vec![100.0, 5.0],
        ]);
        let scaler = RobustScaler::fit(&t);
        assert_eq!(scaler.center[0], 3.0);
        assert_eq!(scaler.scale[0], 2.0);
        let out = scaler.transform(&t.rows);
        assert!((out[0][0] + 1.0).abs() < 1e-12);
        assert!((out[4][0] - 48.5).abs() < 1e-12);
    }

    #[test]
    fn zero_spread_feature_scales_to_zero() {
        let t = table(vec![
            vec![1.0, 5.0],
            vec![2.0, 5.0],
            vec![3.0, 9.0],
            vec![4.0, 5.0],
            vec![5.0, 5.0],
        ]);
        let scaler = RobustScaler::fit(&t);
        assert_eq!(scaler.zero_spread_features(), vec!["b"]);
        for row in scaler.transform(&t.rows) {
            assert_eq!(row[1], 0.0);
        }
        assert_eq!(
            scaler.warnings(),
            vec![PipelineWarning::ZeroSpreadFeature { feature: "b".into() }]
        );
    }

    #[test]
    fn fitted_scaler_is_reused_not_refit() {
        let t = table(vec![vec![0.0, 1.0], vec![10.0, 2.0], vec![20.0, 3.0]]);
        let scaler = RobustScaler::fit(&t);
        // Transforming a subset keeps the population-wide parameters.
        let subset = scaler.transform(&t.rows[1..2]);
        let full = scaler.transform(&t.rows);
        assert_eq!(subset[0], full[1]);
    }
}

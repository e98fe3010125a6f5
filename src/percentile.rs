use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineWarning;
use crate::features::FeatureTable;

pub const CONSTANT_FEATURE_PERCENTILE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileRow {
    pub key: String,
    pub name: String,
    pub position: String,
    pub team: String,
    /// One value in `[0, 100]` per display feature, same order as
    /// [`PercentileTable::features`].
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileTable {
    pub features: Vec<String>,
    pub rows: Vec<PercentileRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarSeries {
    pub key: String,
    pub name: String,
    pub features: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarComparison {
    pub series: Vec<RadarSeries>,
    pub unknown: Vec<String>,
}

impl PercentileTable {
    pub fn row(&self, key: &str) -> Option<&PercentileRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn value(&self, key: &str, feature: &str) -> Option<f64> {
        let idx = self.features.iter().position(|f| f == feature)?;
        self.row(key).map(|row| row.values[idx])
    }

    pub fn profile(&self, key: &str) -> Option<RadarSeries> {
        self.row(key).map(|row| RadarSeries {
            key: row.key.clone(),
            name: row.name.clone(),
            features: self.features.clone(),
            values: row.values.clone(),
        })
    }

    /// Radar series for every known key, in request order. Unknown keys are
    /// listed separately.
    pub fn compare<S: AsRef<str>>(&self, keys: &[S]) -> RadarComparison {
        let mut out = RadarComparison::default();
        for key in keys {
            let key = key.as_ref();
            match self.profile(key) {
                Some(series) => out.series.push(series),
                None => out.unknown.push(key.to_string()),
            }
        }
        out
    }
}

/// Percentile-of-score, "rank" kind: the mean of the strict and weak
/// percentile plus a half step when `x` is present in the population.
/// `sorted` must be ascending.
pub fn percentile_of_score(sorted: &[f64], x: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let left = sorted.partition_point(|v| *v < x);
    let right = sorted.partition_point(|v| *v <= x);
    let plus1 = usize::from(right > left);
    (left + right + plus1) as f64 * 50.0 / n as f64
}

pub fn score_table(
    table: &FeatureTable,
    keys: &[String],
) -> (PercentileTable, Vec<PipelineWarning>) {
    let columns: Vec<(Vec<f64>, bool)> = (0..table.dims())
        .into_par_iter()
        .map(|idx| score_column(&table.column(idx)))
        .collect();

    let mut warnings = Vec::new();
    for (name, (_, constant)) in table.feature_names.iter().zip(&columns) {
        if *constant {
            warn!(feature = %name, "single distinct value, percentile fixed at 50");
            warnings.push(PipelineWarning::ConstantDisplayFeature {
                feature: name.clone(),
            });
        }
    }

    let rows = table
        .meta
        .iter()
        .zip(keys)
        .enumerate()
        .map(|(row, (meta, key))| PercentileRow {
            key: key.clone(),
            name: meta.name.clone(),
            position: meta.position.clone(),
            team: meta.team.clone(),
            values: columns.iter().map(|(values, _)| values[row]).collect(),
        })
        .collect();

    (
        PercentileTable {
            features: table.feature_names.clone(),
            rows,
        },
        warnings,
    )
}

fn score_column(values: &[f64]) -> (Vec<f64>, bool) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let constant = match (sorted.first(), sorted.last()) {
        (Some(lo), Some(hi)) => lo == hi,
        _ => false,
    };
    if constant {
        return (vec![CONSTANT_FEATURE_PERCENTILE; values.len()], true);
    }
    let scored = values
        .iter()
        .map(|x| percentile_of_score(&sorted, *x))
        .collect();
    (scored, false)
}

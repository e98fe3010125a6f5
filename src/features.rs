use tracing::debug;

use crate::config::NINETIES;
use crate::dataset::{DatasetSnapshot, PlayerMeta};
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub meta: Vec<PlayerMeta>,
    /// Row index of each player in the source snapshot.
    pub source_rows: Vec<usize>,
    pub nineties: Vec<f64>,
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[idx]).collect()
    }
}

/// Rate per 90 minutes. Zero minutes yields 0 rather than a division error.
pub fn per90(raw: f64, nineties: f64) -> f64 {
    if nineties > 0.0 { raw / nineties } else { 0.0 }
}

fn zero_filled(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Snapshot rows whose minutes-proxy exceeds the threshold. A missing
/// proxy counts as 0 and is therefore excluded.
pub fn included_rows(
    snapshot: &DatasetSnapshot,
    min_nineties: f64,
) -> Result<Vec<usize>, PipelineError> {
    let nineties = snapshot.numeric(NINETIES)?;
    Ok(nineties
        .iter()
        .enumerate()
        .filter(|(_, v)| zero_filled(**v) > min_nineties)
        .map(|(idx, _)| idx)
        .collect())
}

pub fn build_feature_table(
    snapshot: &DatasetSnapshot,
    min_nineties: f64,
    columns: &[String],
) -> Result<FeatureTable, PipelineError> {
    let sources = columns
        .iter()
        .map(|name| snapshot.numeric(name))
        .collect::<Result<Vec<_>, _>>()?;
    let nineties_col = snapshot.numeric(NINETIES)?;
    let included = included_rows(snapshot, min_nineties)?;

    let mut meta = Vec::with_capacity(included.len());
    let mut nineties = Vec::with_capacity(included.len());
    let mut rows = Vec::with_capacity(included.len());
    for &idx in &included {
        let n90 = zero_filled(nineties_col[idx]);
        rows.push(
            sources
                .iter()
                .map(|col| per90(zero_filled(col[idx]), n90))
                .collect::<Vec<f64>>(),
        );
        nineties.push(n90);
        meta.push(snapshot.meta(idx));
    }

    debug!(
        snapshot_rows = snapshot.len(),
        included = included.len(),
        features = columns.len(),
        "built per-90 feature table"
    );

    Ok(FeatureTable {
        meta,
        source_rows: included,
        nineties,
        feature_names: columns.to_vec(),
        rows,
    })
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::cache_key;
use crate::cluster::{cluster_points, silhouette_score};
use crate::config::PipelineConfig;
use crate::dataset::DatasetSnapshot;
use crate::embedding::{EmbeddingPoint, EmbeddingTable, project};
use crate::error::{PipelineError, PipelineWarning};
use crate::features::build_feature_table;
use crate::identity::player_keys;
use crate::normalize::RobustScaler;
use crate::percentile::{PercentileTable, score_table};
use crate::reduce::Pca;
use crate::roles::{RoleRow, RoleTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub snapshot_rows: usize,
    pub included: usize,
    pub min_nineties: f64,
    pub components: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub cluster_sizes: BTreeMap<u32, usize>,
    pub silhouette: Option<f64>,
    pub warnings: Vec<PipelineWarning>,
    pub cache_key: String,
}

impl PipelineReport {
    pub fn cumulative_variance(&self) -> f64 {
        self.explained_variance_ratio.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifacts {
    pub roles: RoleTable,
    pub percentiles: PercentileTable,
    pub embedding: EmbeddingTable,
    pub report: PipelineReport,
}

pub fn run_pipeline(
    snapshot: &DatasetSnapshot,
    config: &PipelineConfig,
) -> Result<PipelineArtifacts, PipelineError> {
    run_pipeline_with_key(snapshot, config, cache_key(snapshot, config))
}

/// [`run_pipeline`] with the [`cache_key`] already computed.
pub fn run_pipeline_with_key(
    snapshot: &DatasetSnapshot,
    config: &PipelineConfig,
    key: String,
) -> Result<PipelineArtifacts, PipelineError> {
    let mut warnings = config.validate()?;
    for warning in &warnings {
        warn!("{warning}");
    }
    snapshot.require_columns(config)?;

    let k = config.cluster_count;
    let features =
        build_feature_table(snapshot, config.min_nineties, &config.clustering_features)?;
    if features.len() < k {
        return Err(PipelineError::PopulationTooSmall {
            found: features.len(),
            required: k,
            min_nineties: config.min_nineties,
        });
    }
    let display = build_feature_table(snapshot, config.min_nineties, &config.display_features)?;
    info!(
        snapshot_rows = snapshot.len(),
        included = features.len(),
        "filtered population"
    );

    let (keys, identity_warnings) = player_keys(&features.meta);

    let scaler = RobustScaler::fit(&features);
    warnings.extend(scaler.warnings());
    let normalized = scaler.transform(&features.rows);

    let pca = Pca::fit(&normalized, config.variance_target);
    let reduced = pca.transform(&normalized);
    info!(
        components = pca.n_components(),
        cumulative_variance = pca.cumulative_ratio(),
        "reduced feature space"
    );

    let ((percentiles, percentile_warnings), (clustered, coords)) = rayon::join(
        || score_table(&display, &keys),
        || {
            rayon::join(
                || cluster_points(&reduced, k),
                || project(&reduced, &config.embedding),
            )
        },
    );
    let (_, labels) = clustered?;
    warnings.extend(identity_warnings);
    warnings.extend(percentile_warnings);

    let roles = RoleTable {
        rows: keys
            .iter()
            .zip(&features.meta)
            .zip(&labels)
            .map(|((key, meta), &cluster)| RoleRow {
                key: key.clone(),
                meta: meta.clone(),
                cluster,
                role: config.role_name(cluster).to_string(),
            })
            .collect(),
    };
    let embedding = EmbeddingTable {
        rows: keys
            .iter()
            .zip(&labels)
            .zip(coords)
            .map(|((key, &cluster), [x, y])| EmbeddingPoint {
                key: key.clone(),
                cluster,
                x,
                y,
            })
            .collect(),
    };

    let cluster_sizes = roles.cluster_sizes();
    let silhouette = silhouette_score(&reduced, &labels);
    info!(
        clusters = cluster_sizes.len(),
        silhouette = silhouette.unwrap_or(f64::NAN),
        warnings = warnings.len(),
        "pipeline run complete"
    );

    let report = PipelineReport {
        snapshot_rows: snapshot.len(),
        included: features.len(),
        min_nineties: config.min_nineties,
        components: pca.n_components(),
        explained_variance_ratio: pca.explained_variance_ratio.clone(),
        cluster_sizes,
        silhouette,
        warnings,
        cache_key: key,
    };

    Ok(PipelineArtifacts {
        roles,
        percentiles,
        embedding,
        report,
    })
}

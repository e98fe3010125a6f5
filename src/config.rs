use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineWarning};
use crate::roles::{DEFAULT_ROLE_NAMES, UNLABELED};

pub const PLAYER_NAME: &str = "Player Name";
pub const NATIONALITY: &str = "Nationality";
pub const POSITION: &str = "Position";
pub const TEAM: &str = "Team";
pub const COMPETITION: &str = "Competition";
pub const AGE: &str = "Age";
pub const NINETIES: &str = "90s";

pub const META_COLUMNS: [&str; 6] = [PLAYER_NAME, NATIONALITY, POSITION, TEAM, COMPETITION, AGE];

pub const CLUSTERING_FEATURES: [&str; 44] = [
    "Goals-PK",
    "Shots",
    "xG",
    "npxG",
    "npxG+xAG",
    "xAG",
    "Assists",
    "Key Passes",
    "SCA",
    "GCA",
    "Passes Attempted",
    "Pass Completion Percentage",
    "Passes into Penalty Area",
    "Final Third Passes",
    "Through Balls",
    "Progressive Passes",
    "Switches",
    "Crosses",
    "Progressive Carries",
    "Carries",
    "Carries Into Final 3rd",
    "Carries Into Penalty Area",
    "Carries Progressive Distance",
    "Touches Midfield 3rd",
    "Touches Attacking 3rd",
    "Touches Attacking Penalty Area",
    "Progressive Passes Received",
    "Tackles",
    "Interceptions",
    "Blocks",
    "Clearances",
    "Ball Recoveries",
    "Dribblers Tackled",
    "Blocked Passes",
    "Challenges Lost",
    "Dribblers Challenged",
    "Dispossessed",
    "Miscontrols",
    "Fouls Committed",
    "Fouls Drawn",
    // Column name as published by the source dataset.
    "Times Takled During Take-On",
    "Aerials Won",
    "Aerials Lost",
    "Aerials Win Percentage",
];

pub const DISPLAY_FEATURES: [&str; 18] = [
    "Goals-PK",
    "npxG",
    "Shots",
    "Assists",
    "xAG",
    "npxG+xAG",
    "SCA",
    "Passes Attempted",
    "Pass Completion Percentage",
    "Progressive Passes",
    "Progressive Carries",
    "Touches Attacking Penalty Area",
    "Progressive Passes Received",
    "Tackles",
    "Interceptions",
    "Blocks",
    "Clearances",
    "Aerials Won",
];

pub const DEFAULT_MIN_NINETIES: f64 = 3.0;
pub const DEFAULT_CLUSTER_COUNT: usize = 12;
pub const DEFAULT_VARIANCE_TARGET: f64 = 0.93;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub n_neighbors: usize,
    pub n_epochs: usize,
    pub seed: u64,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    // Curve parameters for min_dist = 0.1, spread = 1.0.
    pub min_dist_a: f64,
    pub min_dist_b: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            n_epochs: 200,
            seed: 42,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            min_dist_a: 1.577,
            min_dist_b: 0.8951,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub clustering_features: Vec<String>,
    pub display_features: Vec<String>,
    pub min_nineties: f64,
    pub cluster_count: usize,
    pub variance_target: f64,
    pub role_names: BTreeMap<u32, String>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clustering_features: CLUSTERING_FEATURES.iter().map(|s| s.to_string()).collect(),
            display_features: DISPLAY_FEATURES.iter().map(|s| s.to_string()).collect(),
            min_nineties: DEFAULT_MIN_NINETIES,
            cluster_count: DEFAULT_CLUSTER_COUNT,
            variance_target: DEFAULT_VARIANCE_TARGET,
            role_names: DEFAULT_ROLE_NAMES
                .iter()
                .map(|(label, name)| (*label, name.to_string()))
                .collect(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects values no run could satisfy. Gaps in the role table are
    /// returned as warnings; those labels resolve to the unlabeled marker.
    pub fn validate(&self) -> Result<Vec<PipelineWarning>, PipelineError> {
        if self.clustering_features.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "clustering feature list is empty".to_string(),
            ));
        }
        if self.display_features.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "display feature list is empty".to_string(),
            ));
        }
        if self.cluster_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if !(self.variance_target > 0.0 && self.variance_target <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "variance target {} is outside (0, 1]",
                self.variance_target
            )));
        }
        if !self.min_nineties.is_finite() || self.min_nineties < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "minimum 90s {} must be a non-negative number",
                self.min_nineties
            )));
        }
        if self.embedding.n_neighbors == 0 {
            return Err(PipelineError::InvalidConfig(
                "embedding needs at least one neighbour".to_string(),
            ));
        }
        for list in [&self.clustering_features, &self.display_features] {
            let mut seen = std::collections::HashSet::new();
            for name in list {
                if !seen.insert(name.as_str()) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "feature `{name}` listed twice"
                    )));
                }
            }
        }

        let labels = u32::try_from(self.cluster_count).map_err(|_| {
            PipelineError::InvalidConfig(format!(
                "cluster_count {} does not fit a cluster label",
                self.cluster_count
            ))
        })?;
        let warnings = (1..=labels)
            .filter(|label| {
                self.role_names
                    .get(label)
                    .is_none_or(|name| name.trim().is_empty())
            })
            .map(|label| PipelineWarning::UnmappedClusterLabel { label })
            .collect();
        Ok(warnings)
    }

    pub fn role_name(&self, label: u32) -> &str {
        self.role_names
            .get(&label)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNLABELED)
    }

    pub fn required_stat_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for name in self.clustering_features.iter().chain(&self.display_features) {
            if !out.contains(&name.as_str()) {
                out.push(name.as_str());
            }
        }
        out
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(min) = env_f64("ROLE_SCOUT_MIN_90S") {
            self.min_nineties = min;
        }
        if let Some(seed) = env::var("ROLE_SCOUT_EMBED_SEED")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            self.embedding.seed = seed;
        }
        self
    }
}

pub fn load_pipeline_config() -> Result<PipelineConfig> {
    let config = match config_path_override() {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read pipeline config {}", path.display()))?;
            let config = serde_json::from_str::<PipelineConfig>(&raw)
                .with_context(|| format!("parse pipeline config {}", path.display()))?;
            info!(path = %path.display(), "loaded pipeline config");
            config
        }
        Some(path) => {
            warn!(path = %path.display(), "pipeline config override not found, using defaults");
            PipelineConfig::default()
        }
        None => PipelineConfig::default(),
    };
    Ok(config.with_env_overrides())
}

pub fn global_config() -> &'static PipelineConfig {
    static CONFIG: OnceCell<PipelineConfig> = OnceCell::new();
    CONFIG.get_or_init(|| match load_pipeline_config() {
        Ok(config) => config,
        Err(err) => {
            warn!("falling back to default pipeline config: {err:#}");
            PipelineConfig::default()
        }
    })
}

fn config_path_override() -> Option<PathBuf> {
    env::var("ROLE_SCOUT_CONFIG")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn env_f64(name: &str) -> Option<f64> {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

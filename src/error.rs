use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal pipeline failures. Any of these aborts the run before an artifact
/// is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("missing required column `{0}`")]
    MissingColumn(String),

    #[error("column `{0}` must be numeric")]
    NonNumericColumn(String),

    #[error("column `{column}` has {found} rows, snapshot has {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "only {found} players have more than {min_nineties} 90s; \
         {required} are needed to form {required} clusters"
    )]
    PopulationTooSmall {
        found: usize,
        required: usize,
        min_nineties: f64,
    },

    #[error(
        "only {distinct} distinct player profiles remain; {required} clusters cannot be formed"
    )]
    InsufficientDistinctPlayers { distinct: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Non-fatal conditions recorded during a run. The run still produces all
/// three artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    ZeroSpreadFeature { feature: String },
    ConstantDisplayFeature { feature: String },
    IdentityCollision { name: String, rows: usize },
    UnmappedClusterLabel { label: u32 },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::ZeroSpreadFeature { feature } => {
                write!(f, "feature `{feature}` has zero IQR; scaled to 0")
            }
            PipelineWarning::ConstantDisplayFeature { feature } => {
                write!(f, "feature `{feature}` has a single value; percentile fixed at 50")
            }
            PipelineWarning::IdentityCollision { name, rows } => {
                write!(f, "{rows} rows share the name `{name}`; keys widened")
            }
            PipelineWarning::UnmappedClusterLabel { label } => {
                write!(f, "cluster {label} has no role name")
            }
        }
    }
}

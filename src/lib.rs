pub mod cache;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod export;
pub mod features;
pub mod identity;
pub mod loader;
pub mod normalize;
pub mod percentile;
pub mod pipeline;
pub mod reduce;
pub mod roles;
pub mod synthetic;

pub use config::PipelineConfig;
pub use dataset::DatasetSnapshot;
pub use error::{PipelineError, PipelineWarning};
pub use pipeline::{PipelineArtifacts, run_pipeline};

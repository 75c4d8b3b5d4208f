use blockwise_database::prelude::StoreError;
use blockwise_pipeline_core::{
    Box3, Core,
    errors::{
        collaborator::{ExtractionError, FeatureError, RasterError},
        config::ConfigError,
        solver::SolverError,
    },
};
use thiserror::Error;

/// Terminal failures of a guarantor or of the orchestrator. Blocks whose dependencies are not ready are
/// reported as a returned block set, never as an error.
#[derive(Error, Debug)]
pub enum GuaranteeError {
    #[error("raster for {bounds} is unavailable: {source}")]
    RasterUnavailable {
        bounds: Box3,
        #[source]
        source: RasterError,
    },

    #[error("store consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error("links carry {features} features but {weights} feature weights are configured")]
    FeatureWeightMismatch { features: usize, weights: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{core} did not converge within {rounds} rounds")]
    NotConverged { core: Core, rounds: usize },
}

pub type GuaranteeResult<T> = std::result::Result<T, GuaranteeError>;

impl GuaranteeError {
    pub fn raster_unavailable(bounds: Box3, source: RasterError) -> Self {
        GuaranteeError::RasterUnavailable { bounds, source }
    }
}

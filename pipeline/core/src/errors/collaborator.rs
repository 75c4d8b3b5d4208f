use crate::coords::Box3;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("raster data for {requested} is not available (stack covers {available})")]
    OutOfBounds { requested: Box3, available: Box3 },

    #[error("raster data for {0} is missing: {1}")]
    Missing(Box3, String),

    #[error("raster buffer for {bounds} holds {actual} voxels, expected {expected}")]
    SizeMismatch { bounds: Box3, expected: u64, actual: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("region extraction expects a single section, got a raster of depth {0}")]
    NotASection(u32),

    #[error("region extraction failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("link {0} references region {1} which was not provided")]
    UnknownRegion(blockwise_hashes::Hash, blockwise_hashes::Hash),

    #[error("region {0} lies outside the provided raster {1}")]
    OutsideRaster(blockwise_hashes::Hash, Box3),
}

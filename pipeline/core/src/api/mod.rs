//! Interfaces of the external collaborators the guarantors depend on.
//!
//! Implementations must be deterministic: the same input must always produce the same output, independent of
//! which block or window triggered the call.

use crate::{
    coords::{Box3, Point3},
    errors::{
        collaborator::{ExtractionError, FeatureError, RasterError},
        solver::SolverResult,
    },
    link::Link,
    program::LinearProgram,
    raster::Raster,
    region::{ConflictSet, Region, RegionMap},
};
use blockwise_hashes::Hash;
use std::{collections::HashMap, time::Duration};

/// Serves raster data for arbitrary boxes of the volume
pub trait RasterStore: Send + Sync {
    fn get_raster(&self, bounds: Box3) -> Result<Raster, RasterError>;
}

/// Candidate regions and conflict sets of a single section
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub regions: Vec<Region>,
    pub conflict_sets: Vec<ConflictSet>,
}

pub trait RegionExtractor: Send + Sync {
    /// Extracts candidates from a raster of depth one. Pixel coordinates of the returned regions are
    /// relative to the raster origin; their section is the absolute z of the raster.
    fn extract(&self, raster: &Raster) -> Result<Extraction, ExtractionError>;
}

pub trait FeatureExtractor: Send + Sync {
    fn num_features(&self) -> usize;

    /// Computes one feature vector per link. `regions` holds every region referenced by `links`, in absolute
    /// coordinates; `raster` covers their bounding box and starts at `crop_offset`.
    fn features(
        &self,
        links: &[Link],
        regions: &RegionMap,
        raster: &Raster,
        crop_offset: Point3,
    ) -> Result<HashMap<Hash, Vec<f64>>, FeatureError>;
}

pub trait LinearSolver: Send + Sync {
    /// Minimizes the program over binary variables within the optional time budget
    fn solve(&self, program: &LinearProgram, budget: Option<Duration>) -> SolverResult<Vec<bool>>;
}

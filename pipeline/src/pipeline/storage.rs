use crate::model::stores::{
    DB,
    links::{DbLinkStore, LinkStore, MemoryLinkStore},
    regions::{DbRegionStore, MemoryRegionStore, RegionStore},
    solutions::{DbSolutionStore, MemorySolutionStore, SolutionStore},
};
use blockwise_database::prelude::CachePolicy;
use blockwise_pipeline_core::api::{FeatureExtractor, LinearSolver, RasterStore, RegionExtractor};
use std::sync::Arc;

/// Entity cache size used by the database backends
const DEFAULT_ENTITY_CACHE_SIZE: usize = 100_000;

/// The three stage stores shared by the guarantors
#[derive(Clone)]
pub struct PipelineStorage {
    pub region_store: Arc<dyn RegionStore>,
    pub link_store: Arc<dyn LinkStore>,
    pub solution_store: Arc<dyn SolutionStore>,
}

impl PipelineStorage {
    pub fn memory() -> Self {
        Self {
            region_store: Arc::new(MemoryRegionStore::new()),
            link_store: Arc::new(MemoryLinkStore::new()),
            solution_store: Arc::new(MemorySolutionStore::new()),
        }
    }

    pub fn db(db: Arc<DB>) -> Self {
        Self::db_with_cache(db, CachePolicy::Count(DEFAULT_ENTITY_CACHE_SIZE))
    }

    pub fn db_with_cache(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            region_store: Arc::new(DbRegionStore::new(db.clone(), cache_policy)),
            link_store: Arc::new(DbLinkStore::new(db.clone(), cache_policy)),
            solution_store: Arc::new(DbSolutionStore::new(db, cache_policy)),
        }
    }
}

/// The external services the stages consume
#[derive(Clone)]
pub struct Collaborators {
    pub raster_store: Arc<dyn RasterStore>,
    pub region_extractor: Arc<dyn RegionExtractor>,
    pub feature_extractor: Arc<dyn FeatureExtractor>,
    pub solver: Arc<dyn LinearSolver>,
}

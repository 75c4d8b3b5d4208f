#![allow(dead_code)]

use blockwise_hashes::Hash;
use blockwise_pipeline::{
    model::stores::{
        links::{LinkStoreReader, MemoryLinkStore},
        raster::MemoryRasterStore,
        regions::{MemoryRegionStore, RegionStoreReader},
        solutions::MemorySolutionStore,
    },
    pipeline::{orchestrator::Orchestrator, storage::PipelineStorage},
    test_helpers::test_collaborators,
};
use blockwise_pipeline_core::{BlockSet, config::Config};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// An orchestrator over memory stores which stay reachable with their concrete type
pub struct MemoryPipeline {
    pub regions: Arc<MemoryRegionStore>,
    pub links: Arc<MemoryLinkStore>,
    pub solutions: Arc<MemorySolutionStore>,
    pub orchestrator: Orchestrator,
}

impl MemoryPipeline {
    pub fn new(config: &Config, raster_store: MemoryRasterStore, thresholds: Vec<u8>) -> Self {
        let regions = Arc::new(MemoryRegionStore::new());
        let links = Arc::new(MemoryLinkStore::new());
        let solutions = Arc::new(MemorySolutionStore::new());
        let storage =
            PipelineStorage { region_store: regions.clone(), link_store: links.clone(), solution_store: solutions.clone() };
        let orchestrator = Orchestrator::new(config, storage, test_collaborators(raster_store, thresholds)).unwrap();
        Self { regions, links, solutions, orchestrator }
    }

    pub fn all_blocks(&self) -> BlockSet {
        self.orchestrator.grid().all_blocks()
    }

    /// Guarantees the regions of every block, one block per call
    pub fn regions_block_by_block(&self) {
        for block in self.all_blocks() {
            let missing = self.orchestrator.region_guarantor().guarantee_regions(&BlockSet::from([block])).unwrap();
            assert!(missing.is_empty());
        }
    }

    /// Guarantees the links of every block, one block per call, resolving region deficits as they come
    pub fn links_block_by_block(&self) {
        for block in self.all_blocks() {
            let request = BlockSet::from([block]);
            loop {
                let missing = self.orchestrator.link_guarantor().guarantee_links(&request).unwrap();
                if missing.is_empty() {
                    break;
                }
                self.orchestrator.region_guarantor().guarantee_regions(&missing).unwrap();
            }
        }
    }

    /// Stored regions by hash, with section and pixel count
    pub fn region_summary(&self) -> BTreeMap<Hash, (u32, usize)> {
        let contents = self.regions.get_regions_by_blocks(&self.all_blocks()).unwrap();
        contents.items.iter().map(|r| (r.hash(), (r.section(), r.size()))).collect()
    }

    pub fn conflict_set_summary(&self) -> BTreeSet<Hash> {
        self.regions.get_conflict_sets_by_blocks(&self.all_blocks()).unwrap().hashes().collect()
    }

    /// Stored links by hash, with their features
    pub fn link_summary(&self) -> BTreeMap<Hash, Vec<f64>> {
        let contents = self.links.get_links_by_blocks(&self.all_blocks()).unwrap();
        contents.items.iter().map(|l| (l.hash(), l.features().to_vec())).collect()
    }
}

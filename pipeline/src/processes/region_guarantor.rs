//! Makes the candidate regions of a set of blocks durable, independent of how the volume is tiled.
//!
//! Each section is extracted over a window which starts one block around the request and grows until no
//! required region touches its border. Regions that do not touch the window border are complete, so the
//! same components come out of every window that contains them.

use crate::{
    errors::{GuaranteeError, GuaranteeResult},
    model::stores::regions::RegionStore,
    pipeline::ProcessingCounters,
};
use blockwise_core::{debug, trace};
use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Block, BlockSet, Box3, Rect,
    api::{RasterStore, RegionExtractor},
    grid::{BlockGrid, Direction, Expansion},
    region::{ConflictSet, Region},
};
use rayon::{ThreadPool, prelude::*};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, atomic::Ordering},
};

/// The required candidates of one section, extracted over the final window
struct SectionCandidates {
    section: u32,
    window: Rect,
    regions: Vec<Arc<Region>>,
    conflict_sets: Vec<Arc<ConflictSet>>,
}

#[derive(Default)]
struct BlockAssociation {
    regions: Vec<Arc<Region>>,
    conflict_sets: HashMap<Hash, Arc<ConflictSet>>,
}

pub struct RegionGuarantor {
    grid: BlockGrid,
    region_store: Arc<dyn RegionStore>,
    raster_store: Arc<dyn RasterStore>,
    extractor: Arc<dyn RegionExtractor>,
    thread_pool: Arc<ThreadPool>,
    counters: Arc<ProcessingCounters>,
}

impl RegionGuarantor {
    pub fn new(
        grid: BlockGrid,
        region_store: Arc<dyn RegionStore>,
        raster_store: Arc<dyn RasterStore>,
        extractor: Arc<dyn RegionExtractor>,
        thread_pool: Arc<ThreadPool>,
        counters: Arc<ProcessingCounters>,
    ) -> Self {
        Self { grid, region_store, raster_store, extractor, thread_pool, counters }
    }

    /// Ensures the regions of `blocks` are stored and marked done. Regions have no upstream dependencies,
    /// so the returned set of missing blocks is always empty.
    pub fn guarantee_regions(&self, blocks: &BlockSet) -> GuaranteeResult<BlockSet> {
        self.counters.region_calls.fetch_add(1, Ordering::Relaxed);
        let blocks: BlockSet = blocks.iter().filter(|b| self.grid.is_valid_block(b)).copied().collect();
        if self.all_done(&blocks)? {
            return Ok(BlockSet::new());
        }

        let bounds = self.grid.blocks_box(&blocks);
        let footprint = bounds.rect();
        let sections: Vec<u32> = (bounds.min.z..bounds.max.z).collect();
        debug!("Guaranteeing regions of {} blocks over sections [{}, {})", blocks.len(), bounds.min.z, bounds.max.z);

        let candidates = self.thread_pool.install(|| {
            sections.into_par_iter().map(|z| self.extract_section(z, footprint)).collect::<GuaranteeResult<Vec<_>>>()
        })?;

        self.persist(&blocks, candidates)?;
        Ok(BlockSet::new())
    }

    fn all_done(&self, blocks: &BlockSet) -> GuaranteeResult<bool> {
        for &block in blocks {
            if !self.region_store.regions_done(block)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs the window growth loop of a single section
    fn extract_section(&self, z: u32, footprint: Rect) -> GuaranteeResult<SectionCandidates> {
        let layer = Box3::from_rect(footprint, z, z + 1);
        let mut window_blocks = self.grid.expand(&self.grid.blocks_in_box(&layer), Expansion::xy(1));
        let mut window = self.grid.blocks_box(&window_blocks).rect();

        loop {
            let (regions, conflict_sets) = self.required_candidates(z, window, footprint)?;

            let mut growth = Expansion::default();
            for region in &regions {
                growth = growth.max(&touched_edges(&region.bounding_box(), &window));
            }

            if !growth.is_none() {
                window_blocks = self.grid.expand(&window_blocks, growth);
                let grown = self.grid.blocks_box(&window_blocks).rect();
                if grown != window {
                    trace!("Section {} window grew from {} to {}", z, window, grown);
                    self.counters.window_growths.fetch_add(1, Ordering::Relaxed);
                    window = grown;
                    continue;
                }
            }

            return Ok(SectionCandidates { section: z, window, regions, conflict_sets });
        }
    }

    /// Extracts the window and keeps the regions intersecting the footprint together with everything they
    /// conflict with, transitively
    fn required_candidates(&self, z: u32, window: Rect, footprint: Rect) -> GuaranteeResult<(Vec<Arc<Region>>, Vec<Arc<ConflictSet>>)> {
        let bounds = Box3::from_rect(window, z, z + 1);
        let raster = self.raster_store.get_raster(bounds).map_err(|err| GuaranteeError::raster_unavailable(bounds, err))?;
        let extraction = self.extractor.extract(&raster)?;

        let mut remap = HashMap::with_capacity(extraction.regions.len());
        let mut regions = HashMap::with_capacity(extraction.regions.len());
        for local in extraction.regions {
            let region = local.translated(window.min_x, window.min_y);
            remap.insert(local.hash(), region.hash());
            regions.insert(region.hash(), Arc::new(region));
        }
        let conflict_sets: Vec<ConflictSet> = extraction.conflict_sets.iter().map(|set| set.remapped(&remap)).collect();

        let mut sets_of_region: HashMap<Hash, Vec<usize>> = HashMap::new();
        for (i, set) in conflict_sets.iter().enumerate() {
            for region in set.regions() {
                sets_of_region.entry(*region).or_default().push(i);
            }
        }

        let mut required: HashSet<Hash> =
            regions.values().filter(|r| r.bounding_box().intersects(&footprint)).map(|r| r.hash()).collect();
        let mut required_sets = HashSet::new();
        let mut queue: Vec<Hash> = required.iter().copied().collect();
        while let Some(hash) = queue.pop() {
            for &i in sets_of_region.get(&hash).into_iter().flatten() {
                if !required_sets.insert(i) {
                    continue;
                }
                for member in conflict_sets[i].regions() {
                    if required.insert(*member) {
                        queue.push(*member);
                    }
                }
            }
        }

        let required_regions = required.iter().filter_map(|hash| regions.get(hash).cloned()).collect();
        let required_sets = required_sets.into_iter().map(|i| Arc::new(conflict_sets[i].clone())).collect();
        Ok((required_regions, required_sets))
    }

    fn persist(&self, requested: &BlockSet, candidates: Vec<SectionCandidates>) -> GuaranteeResult<()> {
        let mut associations: BTreeMap<Block, BlockAssociation> = BTreeMap::new();
        let mut stored = HashSet::new();

        for section in candidates {
            let layer = Box3::from_rect(section.window, section.section, section.section + 1);
            for block in self.grid.blocks_in_box(&layer) {
                let rect = self.grid.block_box(&block).rect();
                let association = associations.entry(block).or_default();
                for region in section.regions.iter().filter(|r| r.bounding_box().intersects(&rect)) {
                    stored.insert(region.hash());
                    association.regions.push(region.clone());
                    for set in section.conflict_sets.iter().filter(|s| s.contains(&region.hash())) {
                        association.conflict_sets.insert(set.hash(), set.clone());
                    }
                }
            }
        }

        for (block, association) in associations {
            let done = requested.contains(&block);
            if !done && association.regions.is_empty() {
                continue;
            }
            let conflict_sets: Vec<_> = association.conflict_sets.into_values().collect();
            self.region_store.associate_regions(&association.regions, &conflict_sets, block, done)?;
        }

        self.counters.regions_stored.fetch_add(stored.len() as u64, Ordering::Relaxed);
        debug!("Stored {} regions for {} requested blocks", stored.len(), requested.len());
        Ok(())
    }
}

/// The directions in which a region reaches the border of the window
fn touched_edges(bbox: &Rect, window: &Rect) -> Expansion {
    let mut expansion = Expansion::default();
    if bbox.min_x <= window.min_x {
        expansion = expansion.max(&Expansion::toward(Direction::NegX, 1));
    }
    if bbox.max_x >= window.max_x {
        expansion = expansion.max(&Expansion::toward(Direction::PosX, 1));
    }
    if bbox.min_y <= window.min_y {
        expansion = expansion.max(&Expansion::toward(Direction::NegY, 1));
    }
    if bbox.max_y >= window.max_y {
        expansion = expansion.max(&Expansion::toward(Direction::PosY, 1));
    }
    expansion
}

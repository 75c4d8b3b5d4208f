use crate::{
    errors::{GuaranteeError, GuaranteeResult},
    model::stores::{links::LinkStore, regions::RegionStore},
    pipeline::ProcessingCounters,
    processes::link_extraction::{ConflictIndex, extract_links},
};
use blockwise_core::{debug, trace};
use blockwise_pipeline_core::{
    BlockSet, Box3, Rect,
    api::{FeatureExtractor, RasterStore},
    grid::{BlockGrid, Direction, Expansion},
    link::Link,
    region::{Region, RegionMap},
};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    sync::{Arc, atomic::Ordering},
};

enum RegionGathering {
    Ready { regions: RegionMap, blocks: BlockSet },
    Missing(BlockSet),
}

/// Makes the candidate links of a set of blocks durable. Depends on the regions of the blocks, of the
/// blocks above them and of every block their regions reach into.
pub struct LinkGuarantor {
    grid: BlockGrid,
    region_store: Arc<dyn RegionStore>,
    link_store: Arc<dyn LinkStore>,
    raster_store: Arc<dyn RasterStore>,
    feature_extractor: Arc<dyn FeatureExtractor>,
    counters: Arc<ProcessingCounters>,
}

impl LinkGuarantor {
    pub fn new(
        grid: BlockGrid,
        region_store: Arc<dyn RegionStore>,
        link_store: Arc<dyn LinkStore>,
        raster_store: Arc<dyn RasterStore>,
        feature_extractor: Arc<dyn FeatureExtractor>,
        counters: Arc<ProcessingCounters>,
    ) -> Self {
        Self { grid, region_store, link_store, raster_store, feature_extractor, counters }
    }

    /// Ensures the links of `blocks` are stored and marked done. Returns the blocks whose regions must be
    /// guaranteed first; nothing is written in that case.
    pub fn guarantee_links(&self, blocks: &BlockSet) -> GuaranteeResult<BlockSet> {
        self.counters.link_calls.fetch_add(1, Ordering::Relaxed);
        let blocks: BlockSet = blocks.iter().filter(|b| self.grid.is_valid_block(b)).copied().collect();
        if self.all_done(&blocks)? {
            return Ok(BlockSet::new());
        }

        let (region_map, fetched_blocks) = match self.gather_regions(&blocks)? {
            RegionGathering::Ready { regions, blocks } => (regions, blocks),
            RegionGathering::Missing(missing) => {
                debug!("Links of {} blocks wait for the regions of {} blocks", blocks.len(), missing.len());
                self.counters.deficits.fetch_add(1, Ordering::Relaxed);
                return Ok(missing);
            }
        };
        let conflict_sets = self.region_store.get_conflict_sets_by_blocks(&fetched_blocks)?;
        let conflicts = ConflictIndex::new(conflict_sets.items.iter().map(|s| s.as_ref()));

        let mut by_section: BTreeMap<u32, Vec<Arc<Region>>> = BTreeMap::new();
        for region in region_map.values() {
            by_section.entry(region.section()).or_default().push(region.clone());
        }
        for regions in by_section.values_mut() {
            regions.sort_by_key(|r| r.hash());
        }

        let bounds = self.grid.blocks_box(&blocks);
        let block_boxes: Vec<Box3> = blocks.iter().map(|b| self.grid.block_box(b)).collect();
        let overlaps_request = |link: &Link| block_boxes.iter().any(|bb| overlaps_block(link, bb));

        let mut links = Vec::new();
        for z in bounds.min.z..bounds.max.z {
            let empty = Vec::new();
            let left = by_section.get(&z).unwrap_or(&empty);
            let right = by_section.get(&(z + 1)).unwrap_or(&empty);
            links.extend(extract_links(z, left, right, &conflicts).into_iter().filter(|l| overlaps_request(l)));
        }
        trace!("Extracted {} links over sections [{}, {})", links.len(), bounds.min.z, bounds.max.z);

        let links = self.attach_features(links, &region_map)?;
        self.persist(&blocks, &links)?;
        Ok(BlockSet::new())
    }

    fn all_done(&self, blocks: &BlockSet) -> GuaranteeResult<bool> {
        for &block in blocks {
            if !self.link_store.links_done(block)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fetches the regions of the blocks and the blocks above them, then keeps adding the blocks under the
    /// footprint of the fetched regions, over every section of the fetched blocks, until the set is closed.
    /// A region overhanging the requested blocks thereby pulls in its partners on the adjacent section too.
    fn gather_regions(&self, blocks: &BlockSet) -> GuaranteeResult<RegionGathering> {
        let mut region_blocks = self.grid.expand(blocks, Expansion::toward(Direction::PosZ, 1));
        loop {
            let contents = self.region_store.get_regions_by_blocks(&region_blocks)?;
            if !contents.is_complete() {
                return Ok(RegionGathering::Missing(contents.missing));
            }

            let reach = footprint_box(&contents.items, &self.grid.blocks_box(&region_blocks));
            let grown: BlockSet = region_blocks.union(&self.grid.blocks_in_box(&reach)).copied().collect();
            if grown == region_blocks {
                let regions = contents.items.into_iter().map(|r| (r.hash(), r)).collect();
                return Ok(RegionGathering::Ready { regions, blocks: region_blocks });
            }
            region_blocks = grown;
        }
    }

    fn attach_features(&self, links: Vec<Link>, regions: &RegionMap) -> GuaranteeResult<Vec<Arc<Link>>> {
        if links.is_empty() {
            return Ok(vec![]);
        }

        let rect = links.iter().fold(Rect::default(), |acc, l| acc.union(&l.bounding_box()));
        let (min_section, max_section) = links.iter().map(|l| l.section()).minmax().into_option().unwrap_or_default();
        let crop = Box3::from_rect(rect, min_section, max_section + 2).intersection(&self.grid.volume_box());
        let raster = self.raster_store.get_raster(crop).map_err(|err| GuaranteeError::raster_unavailable(crop, err))?;

        let mut features = self.feature_extractor.features(&links, regions, &raster, crop.min)?;
        links
            .into_iter()
            .map(|link| match features.remove(&link.hash()) {
                Some(f) => Ok(Arc::new(link.with_features(f))),
                None => Err(GuaranteeError::ConsistencyViolation(format!("no features were computed for link {}", link.hash()))),
            })
            .collect()
    }

    fn persist(&self, blocks: &BlockSet, links: &[Arc<Link>]) -> GuaranteeResult<()> {
        for block in blocks {
            let bounds = self.grid.block_box(block);
            let block_links: Vec<_> = links.iter().filter(|l| overlaps_block(l, &bounds)).cloned().collect();
            self.link_store.associate_links(&block_links, *block)?;
        }
        self.counters.links_stored.fetch_add(links.len() as u64, Ordering::Relaxed);
        debug!("Stored {} links for {} requested blocks", links.len(), blocks.len());
        Ok(())
    }
}

/// Whether the link's section lies in the block and its box intersects the block's rectangle
fn overlaps_block(link: &Link, block_box: &Box3) -> bool {
    block_box.contains_z(link.section()) && link.bounding_box().intersects(&block_box.rect())
}

/// The union of the regions' rectangles, extruded over the sections of `sections`
fn footprint_box(regions: &[Arc<Region>], sections: &Box3) -> Box3 {
    let rect = regions.iter().fold(Rect::default(), |acc, r| acc.union(&r.bounding_box()));
    Box3::from_rect(rect, sections.min.z, sections.max.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_pipeline_core::{Point3, link::LinkTopology, region::Pixel};

    #[test]
    fn test_overlaps_block_is_three_dimensional() {
        let block = Box3::new(Point3::new(50, 0, 10), Point3::new(100, 50, 20));
        let link = |section, rect| Link::new(section, LinkTopology::continuation(1.into(), 2.into()), rect);
        assert!(overlaps_block(&link(10, Rect::new(40, 10, 60, 20)), &block));
        assert!(overlaps_block(&link(19, Rect::new(99, 49, 120, 60)), &block));
        assert!(!overlaps_block(&link(20, Rect::new(60, 10, 70, 20)), &block));
        assert!(!overlaps_block(&link(9, Rect::new(60, 10, 70, 20)), &block));
        assert!(!overlaps_block(&link(12, Rect::new(0, 10, 50, 20)), &block));
    }

    #[test]
    fn test_footprint_spans_all_fetched_sections() {
        let sections = Box3::new(Point3::new(0, 0, 2), Point3::new(50, 50, 8));
        assert!(footprint_box(&[], &sections).is_empty());
        // Regions of one section still reach every fetched section
        let regions = [
            Arc::new(Region::new(4, vec![Pixel::new(3, 7), Pixel::new(4, 7)], 1.0)),
            Arc::new(Region::new(4, vec![Pixel::new(60, 2)], 1.0)),
        ];
        assert_eq!(footprint_box(&regions, &sections), Box3::new(Point3::new(3, 2, 2), Point3::new(61, 8, 8)));
    }
}

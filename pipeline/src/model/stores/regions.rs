use super::{BlockContents, BlockKey};
use blockwise_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, DB, DbSetAccess, StoreResult},
    registry::DatabaseStorePrefixes,
};
use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Block, BlockSet,
    region::{ConflictSet, Region},
};
use parking_lot::RwLock;
use rocksdb::WriteBatch;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Reader API for `RegionStore`.
pub trait RegionStoreReader {
    fn regions_done(&self, block: Block) -> StoreResult<bool>;

    /// Regions associated with any of the blocks. `missing` holds the blocks whose regions are not done.
    fn get_regions_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Region>>;

    /// Conflict sets associated with any of the blocks. `missing` holds the blocks whose regions are not done.
    fn get_conflict_sets_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<ConflictSet>>;
}

pub trait RegionStore: RegionStoreReader + Send + Sync {
    /// Stores the entities, associates them with `block` and, if `done`, marks the block's regions done.
    /// All of it becomes visible at once. A done flag is never cleared.
    fn associate_regions(&self, regions: &[Arc<Region>], conflict_sets: &[Arc<ConflictSet>], block: Block, done: bool) -> StoreResult<()>;
}

#[derive(Default)]
struct MemoryRegionStoreInner {
    regions: HashMap<Hash, Arc<Region>>,
    conflict_sets: HashMap<Hash, Arc<ConflictSet>>,
    block_regions: HashMap<Block, HashSet<Hash>>,
    block_conflict_sets: HashMap<Block, HashSet<Hash>>,
    done: HashSet<Block>,
}

impl MemoryRegionStoreInner {
    fn missing(&self, blocks: &BlockSet) -> BlockSet {
        blocks.iter().filter(|b| !self.done.contains(b)).copied().collect()
    }
}

/// An in-memory implementation of `RegionStore`
#[derive(Default)]
pub struct MemoryRegionStore {
    inner: RwLock<MemoryRegionStoreInner>,
}

impl MemoryRegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_regions(&self) -> usize {
        self.inner.read().regions.len()
    }

    pub fn num_conflict_sets(&self) -> usize {
        self.inner.read().conflict_sets.len()
    }
}

impl RegionStoreReader for MemoryRegionStore {
    fn regions_done(&self, block: Block) -> StoreResult<bool> {
        Ok(self.inner.read().done.contains(&block))
    }

    fn get_regions_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Region>> {
        let inner = self.inner.read();
        let items = blocks
            .iter()
            .filter_map(|b| inner.block_regions.get(b))
            .flatten()
            .filter_map(|hash| inner.regions.get(hash).cloned())
            .collect::<Vec<_>>();
        Ok(BlockContents::new(items, inner.missing(blocks)))
    }

    fn get_conflict_sets_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<ConflictSet>> {
        let inner = self.inner.read();
        let items = blocks
            .iter()
            .filter_map(|b| inner.block_conflict_sets.get(b))
            .flatten()
            .filter_map(|hash| inner.conflict_sets.get(hash).cloned())
            .collect::<Vec<_>>();
        Ok(BlockContents::new(items, inner.missing(blocks)))
    }
}

impl RegionStore for MemoryRegionStore {
    fn associate_regions(&self, regions: &[Arc<Region>], conflict_sets: &[Arc<ConflictSet>], block: Block, done: bool) -> StoreResult<()> {
        let mut inner = self.inner.write();
        for region in regions {
            inner.regions.entry(region.hash()).or_insert_with(|| region.clone());
        }
        for set in conflict_sets {
            inner.conflict_sets.entry(set.hash()).or_insert_with(|| set.clone());
        }
        inner.block_regions.entry(block).or_default().extend(regions.iter().map(|r| r.hash()));
        inner.block_conflict_sets.entry(block).or_default().extend(conflict_sets.iter().map(|s| s.hash()));
        if done {
            inner.done.insert(block);
        }
        Ok(())
    }
}

/// A DB + cache implementation of `RegionStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbRegionStore {
    db: Arc<DB>,
    regions: CachedDbAccess<Hash, Arc<Region>>,
    conflict_sets: CachedDbAccess<Hash, Arc<ConflictSet>>,
    block_regions: DbSetAccess<BlockKey, Hash>,
    block_conflict_sets: DbSetAccess<BlockKey, Hash>,
    // Flags are read from the DB only, so a flag staged in an uncommitted batch is never observed
    done: CachedDbAccess<BlockKey, ()>,
}

impl DbRegionStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            regions: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Regions.into()),
            conflict_sets: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::ConflictSets.into()),
            block_regions: DbSetAccess::new(db.clone(), DatabaseStorePrefixes::BlockRegions.into()),
            block_conflict_sets: DbSetAccess::new(db.clone(), DatabaseStorePrefixes::BlockConflictSets.into()),
            done: CachedDbAccess::new(db, CachePolicy::Empty, DatabaseStorePrefixes::RegionsDone.into()),
        }
    }

    pub fn clone_with_new_cache(&self, cache_policy: CachePolicy) -> Self {
        Self::new(Arc::clone(&self.db), cache_policy)
    }

    pub fn num_regions(&self) -> usize {
        self.regions.iterator().count()
    }

    pub fn num_conflict_sets(&self) -> usize {
        self.conflict_sets.iterator().count()
    }

    fn missing(&self, blocks: &BlockSet) -> StoreResult<BlockSet> {
        let mut missing = BlockSet::new();
        for &block in blocks {
            if !self.regions_done(block)? {
                missing.insert(block);
            }
        }
        Ok(missing)
    }

    fn member_hashes(access: &DbSetAccess<BlockKey, Hash>, blocks: &BlockSet) -> StoreResult<HashSet<Hash>> {
        let mut hashes = HashSet::new();
        for block in blocks {
            for hash in access.bucket_iterator(block.into()) {
                hashes.insert(hash?);
            }
        }
        Ok(hashes)
    }
}

impl RegionStoreReader for DbRegionStore {
    fn regions_done(&self, block: Block) -> StoreResult<bool> {
        self.done.has(block.into())
    }

    fn get_regions_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Region>> {
        let hashes = Self::member_hashes(&self.block_regions, blocks)?;
        let items = hashes.into_iter().map(|hash| self.regions.read(hash)).collect::<StoreResult<Vec<_>>>()?;
        Ok(BlockContents::new(items, self.missing(blocks)?))
    }

    fn get_conflict_sets_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<ConflictSet>> {
        let hashes = Self::member_hashes(&self.block_conflict_sets, blocks)?;
        let items = hashes.into_iter().map(|hash| self.conflict_sets.read(hash)).collect::<StoreResult<Vec<_>>>()?;
        Ok(BlockContents::new(items, self.missing(blocks)?))
    }
}

impl RegionStore for DbRegionStore {
    fn associate_regions(&self, regions: &[Arc<Region>], conflict_sets: &[Arc<ConflictSet>], block: Block, done: bool) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        let mut writer = BatchDbWriter::new(&mut batch);
        let key = BlockKey::from(block);
        for region in regions {
            if !self.regions.has(region.hash())? {
                self.regions.write(&mut writer, region.hash(), region.clone())?;
            }
        }
        for set in conflict_sets {
            if !self.conflict_sets.has(set.hash())? {
                self.conflict_sets.write(&mut writer, set.hash(), set.clone())?;
            }
        }
        self.block_regions.write_many(&mut writer, key, regions.iter().map(|r| r.hash()).collect::<Vec<_>>().iter())?;
        self.block_conflict_sets.write_many(&mut writer, key, conflict_sets.iter().map(|s| s.hash()).collect::<Vec<_>>().iter())?;
        if done {
            self.done.write(&mut writer, key, ())?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_database::{create_temp_db, prelude::ConnBuilder};
    use blockwise_pipeline_core::region::Pixel;

    fn region(section: u32, x: u32) -> Arc<Region> {
        Arc::new(Region::new(section, vec![Pixel::new(x, 0), Pixel::new(x + 1, 0)], 10.0))
    }

    fn check_store(store: &dyn RegionStore) {
        let (b0, b1) = (Block::new(0, 0, 0), Block::new(1, 0, 0));
        let (r0, r1) = (region(0, 0), region(0, 10));
        let set = Arc::new(ConflictSet::new([r0.hash()], true));

        store.associate_regions(&[r0.clone(), r1.clone()], &[set.clone()], b0, false).unwrap();
        assert!(!store.regions_done(b0).unwrap());
        store.associate_regions(&[r1.clone()], &[], b1, true).unwrap();
        store.associate_regions(&[r0.clone(), r1.clone()], &[set.clone()], b0, true).unwrap();
        // A later halo write never clears the flag
        store.associate_regions(&[r1.clone()], &[], b0, false).unwrap();
        assert!(store.regions_done(b0).unwrap());

        let both = BlockSet::from([b0, b1]);
        let contents = store.get_regions_by_blocks(&both).unwrap();
        assert!(contents.is_complete());
        assert_eq!(contents.items.len(), 2);
        assert!(contents.items.iter().any(|r| r.hash() == r0.hash()));

        let sets = store.get_conflict_sets_by_blocks(&BlockSet::from([b1, Block::new(2, 0, 0)])).unwrap();
        assert!(sets.items.is_empty());
        assert_eq!(sets.missing, BlockSet::from([Block::new(2, 0, 0)]));
        assert_eq!(store.get_conflict_sets_by_blocks(&both).unwrap().items[0].hash(), set.hash());
    }

    #[test]
    fn test_memory_region_store() {
        let store = MemoryRegionStore::new();
        check_store(&store);
        assert_eq!(store.num_regions(), 2);
        assert_eq!(store.num_conflict_sets(), 1);
    }

    #[test]
    fn test_db_region_store() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let store = DbRegionStore::new(db.clone(), CachePolicy::Count(16));
        check_store(&store);
        assert_eq!(store.num_regions(), 2);
        assert_eq!(store.num_conflict_sets(), 1);

        // Verify the writes reached the DB itself
        let store = store.clone_with_new_cache(CachePolicy::Empty);
        assert!(store.regions_done(Block::new(1, 0, 0)).unwrap());
        assert_eq!(store.get_regions_by_blocks(&BlockSet::from([Block::new(1, 0, 0)])).unwrap().items.len(), 1);
    }
}

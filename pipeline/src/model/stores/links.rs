use super::{BlockContents, BlockKey};
use blockwise_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, DB, DbSetAccess, StoreResult, StoreResultExt},
    registry::DatabaseStorePrefixes,
};
use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Block, BlockSet,
    link::{Link, LinkConstraint},
};
use itertools::Itertools;
use parking_lot::RwLock;
use rocksdb::WriteBatch;
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

/// Reader API for `LinkStore`.
pub trait LinkStoreReader {
    fn links_done(&self, block: Block) -> StoreResult<bool>;

    /// Links associated with any of the blocks. `missing` holds the blocks whose links are not done.
    fn get_links_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Link>>;

    /// Distinct explicit constraints attached to any of the blocks, sorted
    fn get_constraints_by_blocks(&self, blocks: &BlockSet) -> StoreResult<Vec<LinkConstraint>>;

    fn costs_done(&self, block: Block) -> StoreResult<bool>;

    /// Stored costs of the given links. Links without a stored cost are absent from the result.
    fn get_link_costs(&self, hashes: &[Hash]) -> StoreResult<HashMap<Hash, f64>>;
}

pub trait LinkStore: LinkStoreReader + Send + Sync {
    /// Stores the links, associates them with `block` and marks the block's links done, all at once
    fn associate_links(&self, links: &[Arc<Link>], block: Block) -> StoreResult<()>;

    fn add_constraint(&self, constraint: LinkConstraint, block: Block) -> StoreResult<()>;

    /// Stores link costs and marks the costs of `blocks` done, all at once
    fn store_link_costs(&self, costs: &HashMap<Hash, f64>, blocks: &BlockSet) -> StoreResult<()>;
}

#[derive(Default)]
struct MemoryLinkStoreInner {
    links: HashMap<Hash, Arc<Link>>,
    block_links: HashMap<Block, HashSet<Hash>>,
    done: HashSet<Block>,
    constraints: HashMap<Block, BTreeSet<LinkConstraint>>,
    costs: HashMap<Hash, f64>,
    costs_done: HashSet<Block>,
}

/// An in-memory implementation of `LinkStore`
#[derive(Default)]
pub struct MemoryLinkStore {
    inner: RwLock<MemoryLinkStoreInner>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_links(&self) -> usize {
        self.inner.read().links.len()
    }
}

impl LinkStoreReader for MemoryLinkStore {
    fn links_done(&self, block: Block) -> StoreResult<bool> {
        Ok(self.inner.read().done.contains(&block))
    }

    fn get_links_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Link>> {
        let inner = self.inner.read();
        let items = blocks
            .iter()
            .filter_map(|b| inner.block_links.get(b))
            .flatten()
            .filter_map(|hash| inner.links.get(hash).cloned())
            .collect::<Vec<_>>();
        let missing = blocks.iter().filter(|b| !inner.done.contains(b)).copied().collect();
        Ok(BlockContents::new(items, missing))
    }

    fn get_constraints_by_blocks(&self, blocks: &BlockSet) -> StoreResult<Vec<LinkConstraint>> {
        let inner = self.inner.read();
        Ok(blocks.iter().filter_map(|b| inner.constraints.get(b)).flatten().cloned().sorted().dedup().collect())
    }

    fn costs_done(&self, block: Block) -> StoreResult<bool> {
        Ok(self.inner.read().costs_done.contains(&block))
    }

    fn get_link_costs(&self, hashes: &[Hash]) -> StoreResult<HashMap<Hash, f64>> {
        let inner = self.inner.read();
        Ok(hashes.iter().filter_map(|h| inner.costs.get(h).map(|c| (*h, *c))).collect())
    }
}

impl LinkStore for MemoryLinkStore {
    fn associate_links(&self, links: &[Arc<Link>], block: Block) -> StoreResult<()> {
        let mut inner = self.inner.write();
        for link in links {
            inner.links.entry(link.hash()).or_insert_with(|| link.clone());
        }
        inner.block_links.entry(block).or_default().extend(links.iter().map(|l| l.hash()));
        inner.done.insert(block);
        Ok(())
    }

    fn add_constraint(&self, constraint: LinkConstraint, block: Block) -> StoreResult<()> {
        self.inner.write().constraints.entry(block).or_default().insert(constraint);
        Ok(())
    }

    fn store_link_costs(&self, costs: &HashMap<Hash, f64>, blocks: &BlockSet) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.costs.extend(costs.iter().map(|(h, c)| (*h, *c)));
        inner.costs_done.extend(blocks.iter().copied());
        Ok(())
    }
}

/// A DB + cache implementation of `LinkStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbLinkStore {
    db: Arc<DB>,
    links: CachedDbAccess<Hash, Arc<Link>>,
    block_links: DbSetAccess<BlockKey, Hash>,
    block_constraints: DbSetAccess<BlockKey, LinkConstraint>,
    costs: CachedDbAccess<Hash, f64>,
    done: CachedDbAccess<BlockKey, ()>,
    costs_done: CachedDbAccess<BlockKey, ()>,
}

impl DbLinkStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            links: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Links.into()),
            block_links: DbSetAccess::new(db.clone(), DatabaseStorePrefixes::BlockLinks.into()),
            block_constraints: DbSetAccess::new(db.clone(), DatabaseStorePrefixes::BlockConstraints.into()),
            costs: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::LinkCosts.into()),
            done: CachedDbAccess::new(db.clone(), CachePolicy::Empty, DatabaseStorePrefixes::LinksDone.into()),
            costs_done: CachedDbAccess::new(db, CachePolicy::Empty, DatabaseStorePrefixes::CostsDone.into()),
        }
    }

    pub fn clone_with_new_cache(&self, cache_policy: CachePolicy) -> Self {
        Self::new(Arc::clone(&self.db), cache_policy)
    }

    pub fn num_links(&self) -> usize {
        self.links.iterator().count()
    }
}

impl LinkStoreReader for DbLinkStore {
    fn links_done(&self, block: Block) -> StoreResult<bool> {
        self.done.has(block.into())
    }

    fn get_links_by_blocks(&self, blocks: &BlockSet) -> StoreResult<BlockContents<Link>> {
        let mut hashes = HashSet::new();
        let mut missing = BlockSet::new();
        for &block in blocks {
            if !self.links_done(block)? {
                missing.insert(block);
            }
            for hash in self.block_links.bucket_iterator(block.into()) {
                hashes.insert(hash?);
            }
        }
        let items = hashes.into_iter().map(|hash| self.links.read(hash)).collect::<StoreResult<Vec<_>>>()?;
        Ok(BlockContents::new(items, missing))
    }

    fn get_constraints_by_blocks(&self, blocks: &BlockSet) -> StoreResult<Vec<LinkConstraint>> {
        let mut constraints = BTreeSet::new();
        for block in blocks {
            for constraint in self.block_constraints.bucket_iterator(block.into()) {
                constraints.insert(constraint?);
            }
        }
        Ok(constraints.into_iter().collect())
    }

    fn costs_done(&self, block: Block) -> StoreResult<bool> {
        self.costs_done.has(block.into())
    }

    fn get_link_costs(&self, hashes: &[Hash]) -> StoreResult<HashMap<Hash, f64>> {
        let mut costs = HashMap::with_capacity(hashes.len());
        for &hash in hashes {
            if let Some(cost) = self.costs.read(hash).optional()? {
                costs.insert(hash, cost);
            }
        }
        Ok(costs)
    }
}

impl LinkStore for DbLinkStore {
    fn associate_links(&self, links: &[Arc<Link>], block: Block) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        let mut writer = BatchDbWriter::new(&mut batch);
        let key = BlockKey::from(block);
        for link in links {
            if !self.links.has(link.hash())? {
                self.links.write(&mut writer, link.hash(), link.clone())?;
            }
        }
        self.block_links.write_many(&mut writer, key, links.iter().map(|l| l.hash()).collect::<Vec<_>>().iter())?;
        self.done.write(&mut writer, key, ())?;
        self.db.write(batch)?;
        Ok(())
    }

    fn add_constraint(&self, constraint: LinkConstraint, block: Block) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        self.block_constraints.write(BatchDbWriter::new(&mut batch), block.into(), &constraint)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn store_link_costs(&self, costs: &HashMap<Hash, f64>, blocks: &BlockSet) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        let mut writer = BatchDbWriter::new(&mut batch);
        self.costs.write_many(&mut writer, &mut costs.iter().map(|(h, c)| (*h, *c)))?;
        for block in blocks {
            self.costs_done.write(&mut writer, block.into(), ())?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

pub mod links;
pub mod raster;
pub mod regions;
pub mod solutions;

use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Block, BlockSet,
    link::Link,
    region::{ConflictSet, Region},
};
use itertools::Itertools;
use std::sync::Arc;

pub use blockwise_database::prelude::DB;

/// Entities identified by their content hash
pub trait ContentHashed {
    fn content_hash(&self) -> Hash;
}

impl ContentHashed for Region {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

impl ContentHashed for ConflictSet {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

impl ContentHashed for Link {
    fn content_hash(&self) -> Hash {
        self.hash()
    }
}

/// The entities stored for a set of blocks, along with the requested blocks whose stage is not done yet
#[derive(Clone, Debug)]
pub struct BlockContents<T> {
    /// Distinct entities, ordered by hash
    pub items: Vec<Arc<T>>,
    pub missing: BlockSet,
}

impl<T: ContentHashed> BlockContents<T> {
    pub fn new(items: impl IntoIterator<Item = Arc<T>>, missing: BlockSet) -> Self {
        let items = items.into_iter().sorted_by_key(|item| item.content_hash()).dedup_by(|a, b| a.content_hash() == b.content_hash()).collect();
        Self { items, missing }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn hashes(&self) -> impl Iterator<Item = Hash> + '_ {
        self.items.iter().map(|item| item.content_hash())
    }
}

/// Fixed-width DB key of a block, ordered like the block itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey([u8; 12]);

impl From<Block> for BlockKey {
    fn from(block: Block) -> Self {
        Self(block.to_key_bytes())
    }
}

impl From<&Block> for BlockKey {
    fn from(block: &Block) -> Self {
        Self(block.to_key_bytes())
    }
}

impl AsRef<[u8]> for BlockKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_pipeline_core::region::Pixel;

    #[test]
    fn test_block_contents_dedup_and_order() {
        let a = Arc::new(Region::new(0, vec![Pixel::new(0, 0)], 1.0));
        let b = Arc::new(Region::new(0, vec![Pixel::new(5, 5)], 1.0));
        let contents = BlockContents::new([b.clone(), a.clone(), b.clone()], BlockSet::new());
        assert_eq!(contents.items.len(), 2);
        assert!(contents.items[0].hash() < contents.items[1].hash());
        assert!(contents.is_complete());
    }
}

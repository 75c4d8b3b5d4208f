//! The coordinate model: maps voxel-space boxes to block and core coordinates and back.
//!
//! Block `b` covers the voxels `b * block_size .. (b + 1) * block_size`, clamped to the volume, so a block size
//! which does not divide the volume yields smaller blocks along the far faces. Core `c` covers the blocks
//! `c * core_size .. (c + 1) * core_size`, clamped to the valid block range.

use crate::{
    config::Config,
    coords::{Block, BlockSet, Box3, Core, CoreSet, Point3},
    errors::config::{ConfigError, ConfigResult},
};

/// One of the six axis-aligned directions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    PosX,
    PosY,
    PosZ,
    NegX,
    NegY,
    NegZ,
}

/// Block counts by which to grow a block set in each direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Expansion {
    pub pos: Point3,
    pub neg: Point3,
}

impl Expansion {
    pub const fn new(pos: Point3, neg: Point3) -> Self {
        Self { pos, neg }
    }

    /// `n` blocks in all six directions
    pub const fn uniform(n: u32) -> Self {
        Self::new(Point3::splat(n), Point3::splat(n))
    }

    /// `n` blocks in ±x and ±y
    pub const fn xy(n: u32) -> Self {
        Self::new(Point3::new(n, n, 0), Point3::new(n, n, 0))
    }

    /// `n` blocks in a single direction
    pub fn toward(direction: Direction, n: u32) -> Self {
        let mut expansion = Self::default();
        match direction {
            Direction::PosX => expansion.pos.x = n,
            Direction::PosY => expansion.pos.y = n,
            Direction::PosZ => expansion.pos.z = n,
            Direction::NegX => expansion.neg.x = n,
            Direction::NegY => expansion.neg.y = n,
            Direction::NegZ => expansion.neg.z = n,
        }
        expansion
    }

    /// Combines two expansions, keeping the larger count per direction
    pub fn max(&self, other: &Expansion) -> Expansion {
        Expansion::new(self.pos.component_max(&other.pos), self.neg.component_max(&other.neg))
    }

    pub fn is_none(&self) -> bool {
        self.pos == Point3::ZERO && self.neg == Point3::ZERO
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockGrid {
    volume_size: Point3,
    block_size: Point3,
    core_size: Point3,
    num_blocks: Point3,
    num_cores: Point3,
}

fn div_ceil(a: Point3, b: Point3) -> Point3 {
    Point3::new(a.x.div_ceil(b.x), a.y.div_ceil(b.y), a.z.div_ceil(b.z))
}

impl BlockGrid {
    pub fn new(volume_size: Point3, block_size: Point3, core_size: Point3) -> ConfigResult<Self> {
        if volume_size.has_zero() {
            return Err(ConfigError::ZeroVolume(volume_size));
        }
        if block_size.has_zero() {
            return Err(ConfigError::ZeroBlockSize(block_size));
        }
        if core_size.has_zero() {
            return Err(ConfigError::ZeroCoreSize(core_size));
        }
        let num_blocks = div_ceil(volume_size, block_size);
        let num_cores = div_ceil(num_blocks, core_size);
        Ok(Self { volume_size, block_size, core_size, num_blocks, num_cores })
    }

    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        Self::new(config.volume_size, config.block_size, config.core_size)
    }

    pub fn volume_size(&self) -> Point3 {
        self.volume_size
    }

    pub fn block_size(&self) -> Point3 {
        self.block_size
    }

    pub fn core_size(&self) -> Point3 {
        self.core_size
    }

    pub fn num_blocks(&self) -> Point3 {
        self.num_blocks
    }

    pub fn num_cores(&self) -> Point3 {
        self.num_cores
    }

    pub fn volume_box(&self) -> Box3 {
        Box3::new(Point3::ZERO, self.volume_size)
    }

    pub fn is_valid_block(&self, block: &Block) -> bool {
        block.x < self.num_blocks.x && block.y < self.num_blocks.y && block.z < self.num_blocks.z
    }

    pub fn is_valid_core(&self, core: &Core) -> bool {
        core.x < self.num_cores.x && core.y < self.num_cores.y && core.z < self.num_cores.z
    }

    /// The block containing the voxel, if it lies inside the volume
    pub fn block_at(&self, location: Point3) -> Option<Block> {
        if !self.volume_box().contains(location) {
            return None;
        }
        Some(Block::new(location.x / self.block_size.x, location.y / self.block_size.y, location.z / self.block_size.z))
    }

    /// The core containing the voxel, if it lies inside the volume
    pub fn core_at(&self, location: Point3) -> Option<Core> {
        self.block_at(location).map(|block| self.core_of(&block))
    }

    pub fn core_of(&self, block: &Block) -> Core {
        Core::new(block.x / self.core_size.x, block.y / self.core_size.y, block.z / self.core_size.z)
    }

    /// Voxel box of a block, clamped to the volume
    pub fn block_box(&self, block: &Block) -> Box3 {
        let min = Point3::new(block.x * self.block_size.x, block.y * self.block_size.y, block.z * self.block_size.z);
        let max = Point3::new(min.x + self.block_size.x, min.y + self.block_size.y, min.z + self.block_size.z);
        Box3::new(min, max).intersection(&self.volume_box())
    }

    /// Voxel box of a core, clamped to the volume
    pub fn core_box(&self, core: &Core) -> Box3 {
        self.blocks_box(&self.core_blocks(core))
    }

    /// Bounding voxel box of a block set. Empty for an empty set.
    pub fn blocks_box(&self, blocks: &BlockSet) -> Box3 {
        blocks.iter().filter(|b| self.is_valid_block(b)).fold(Box3::default(), |acc, b| acc.union(&self.block_box(b)))
    }

    /// All blocks intersecting the voxel box. Parts of the box outside the volume are ignored.
    pub fn blocks_in_box(&self, bounds: &Box3) -> BlockSet {
        let clamped = bounds.intersection(&self.volume_box());
        if clamped.is_empty() {
            return BlockSet::new();
        }
        let lo = Point3::new(clamped.min.x / self.block_size.x, clamped.min.y / self.block_size.y, clamped.min.z / self.block_size.z);
        let hi = div_ceil(clamped.max, self.block_size);
        let mut blocks = BlockSet::new();
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    blocks.insert(Block::new(x, y, z));
                }
            }
        }
        blocks
    }

    /// The blocks making up a core. Empty for an invalid core.
    pub fn core_blocks(&self, core: &Core) -> BlockSet {
        if !self.is_valid_core(core) {
            return BlockSet::new();
        }
        let lo = Point3::new(core.x * self.core_size.x, core.y * self.core_size.y, core.z * self.core_size.z);
        let hi = Point3::new(lo.x + self.core_size.x, lo.y + self.core_size.y, lo.z + self.core_size.z).component_min(&self.num_blocks);
        let mut blocks = BlockSet::new();
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    blocks.insert(Block::new(x, y, z));
                }
            }
        }
        blocks
    }

    /// Grows a block set by the given block counts, one dimension at a time so that diagonal
    /// neighbors are covered as well. The result is clamped to the valid block range.
    pub fn expand(&self, blocks: &BlockSet, expansion: Expansion) -> BlockSet {
        let mut current: BlockSet = blocks.iter().filter(|b| self.is_valid_block(b)).copied().collect();
        for axis in 0..3 {
            let (pos, neg, limit) = (expansion.pos.axis(axis), expansion.neg.axis(axis), self.num_blocks.axis(axis));
            if pos == 0 && neg == 0 {
                continue;
            }
            let mut next = BlockSet::new();
            for block in &current {
                let coords = block.coords();
                let c = coords.axis(axis);
                let (lo, hi) = (c.saturating_sub(neg), c.saturating_add(pos).min(limit - 1));
                for v in lo..=hi {
                    next.insert(Block::from_coords(coords.with_axis(axis, v)));
                }
            }
            current = next;
        }
        current
    }

    pub fn all_blocks(&self) -> BlockSet {
        self.blocks_in_box(&self.volume_box())
    }

    pub fn all_cores(&self) -> CoreSet {
        let mut cores = CoreSet::new();
        for z in 0..self.num_cores.z {
            for y in 0..self.num_cores.y {
                for x in 0..self.num_cores.x {
                    cores.insert(Core::new(x, y, z));
                }
            }
        }
        cores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> BlockGrid {
        // 3 x 2 x 2 blocks, the last column and layer are partial
        BlockGrid::new(Point3::new(100, 100, 10), Point3::new(40, 50, 6), Point3::new(2, 2, 1)).unwrap()
    }

    #[test]
    fn test_counts_and_clamped_boxes() {
        let grid = grid();
        assert_eq!(grid.num_blocks(), Point3::new(3, 2, 2));
        assert_eq!(grid.num_cores(), Point3::new(2, 1, 2));
        assert_eq!(grid.block_box(&Block::new(2, 1, 1)), Box3::new(Point3::new(80, 50, 6), Point3::new(100, 100, 10)));
        assert_eq!(grid.core_box(&Core::new(1, 0, 0)), Box3::new(Point3::new(80, 0, 0), Point3::new(100, 100, 6)));
        assert_eq!(grid.core_blocks(&Core::new(1, 0, 1)).len(), 2);
        assert!(grid.core_blocks(&Core::new(2, 0, 0)).is_empty());
        assert_eq!(grid.all_blocks().len(), 12);
        assert_eq!(grid.all_cores().len(), 4);
    }

    #[test]
    fn test_locations() {
        let grid = grid();
        assert_eq!(grid.block_at(Point3::new(79, 50, 5)), Some(Block::new(1, 1, 0)));
        assert_eq!(grid.block_at(Point3::new(80, 50, 6)), Some(Block::new(2, 1, 1)));
        assert_eq!(grid.block_at(Point3::new(100, 0, 0)), None);
        assert_eq!(grid.core_at(Point3::new(99, 99, 9)), Some(Core::new(1, 0, 1)));
        assert_eq!(grid.core_of(&Block::new(1, 1, 1)), Core::new(0, 0, 1));
    }

    #[test]
    fn test_blocks_in_box() {
        let grid = grid();
        let blocks = grid.blocks_in_box(&Box3::new(Point3::new(39, 0, 0), Point3::new(41, 1, 1)));
        assert_eq!(blocks, BlockSet::from([Block::new(0, 0, 0), Block::new(1, 0, 0)]));
        // Half-open: a box ending exactly on a block boundary does not touch the next block
        let blocks = grid.blocks_in_box(&Box3::new(Point3::new(0, 0, 0), Point3::new(40, 50, 6)));
        assert_eq!(blocks, BlockSet::from([Block::new(0, 0, 0)]));
        // Outside parts are ignored
        let blocks = grid.blocks_in_box(&Box3::new(Point3::new(90, 90, 8), Point3::new(500, 500, 500)));
        assert_eq!(blocks, BlockSet::from([Block::new(2, 1, 1)]));
        assert!(grid.blocks_in_box(&Box3::new(Point3::new(100, 0, 0), Point3::new(200, 10, 10))).is_empty());
    }

    #[test]
    fn test_expand_clamps_and_covers_diagonals() {
        let grid = grid();
        let start = BlockSet::from([Block::new(0, 0, 0)]);
        let expanded = grid.expand(&start, Expansion::xy(1));
        assert_eq!(expanded.len(), 4);
        assert!(expanded.contains(&Block::new(1, 1, 0)));

        let expanded = grid.expand(&start, Expansion::uniform(5));
        assert_eq!(expanded, grid.all_blocks());

        let expanded = grid.expand(&start, Expansion::toward(Direction::NegX, 1));
        assert_eq!(expanded, start);

        let expanded = grid.expand(&start, Expansion::toward(Direction::PosZ, 1));
        assert_eq!(expanded, BlockSet::from([Block::new(0, 0, 0), Block::new(0, 0, 1)]));

        // Invalid input blocks are dropped
        assert!(grid.expand(&BlockSet::from([Block::new(9, 9, 9)]), Expansion::uniform(1)).is_empty());
    }

    #[test]
    fn test_blocks_box() {
        let grid = grid();
        assert!(grid.blocks_box(&BlockSet::new()).is_empty());
        let blocks = BlockSet::from([Block::new(0, 0, 0), Block::new(2, 1, 0)]);
        assert_eq!(grid.blocks_box(&blocks), Box3::new(Point3::new(0, 0, 0), Point3::new(100, 100, 6)));
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        assert!(BlockGrid::new(Point3::new(10, 10, 0), Point3::splat(1), Point3::splat(1)).is_err());
        assert!(BlockGrid::new(Point3::splat(10), Point3::new(0, 1, 1), Point3::splat(1)).is_err());
        assert!(BlockGrid::new(Point3::splat(10), Point3::splat(1), Point3::new(1, 0, 1)).is_err());
    }
}

use crate::{coords::Rect, hashing::HasherExtensions};
use blockwise_hashes::{Hash, LinkHash};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::fmt::Display;

/// The side of a link a region sits on: `Left` is the lower section, `Right` the upper one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkKind {
    End = 0,
    Continuation = 1,
    Branch = 2,
}

impl Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkKind::End => f.write_str("end"),
            LinkKind::Continuation => f.write_str("continuation"),
            LinkKind::Branch => f.write_str("branch"),
        }
    }
}

/// Which regions a link connects. Regions are referenced by hash only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkTopology {
    /// A path ends at a region on the left side or begins at a region on the right side
    End { side: Side, region: Hash },
    /// One region on each side
    Continuation { left: Hash, right: Hash },
    /// One region on `single_side` connected to two regions on the opposite side
    Branch { single_side: Side, single: Hash, pair: [Hash; 2] },
}

impl LinkTopology {
    pub fn end(side: Side, region: Hash) -> Self {
        LinkTopology::End { side, region }
    }

    pub fn continuation(left: Hash, right: Hash) -> Self {
        LinkTopology::Continuation { left, right }
    }

    pub fn branch(single_side: Side, single: Hash, a: Hash, b: Hash) -> Self {
        let pair = if a <= b { [a, b] } else { [b, a] };
        LinkTopology::Branch { single_side, single, pair }
    }

    pub fn kind(&self) -> LinkKind {
        match self {
            LinkTopology::End { .. } => LinkKind::End,
            LinkTopology::Continuation { .. } => LinkKind::Continuation,
            LinkTopology::Branch { .. } => LinkKind::Branch,
        }
    }

    /// Regions on the given side, sorted
    pub fn regions_on(&self, side: Side) -> SmallVec<[Hash; 2]> {
        match *self {
            LinkTopology::End { side: s, region } if s == side => smallvec![region],
            LinkTopology::End { .. } => smallvec![],
            LinkTopology::Continuation { left, right } => match side {
                Side::Left => smallvec![left],
                Side::Right => smallvec![right],
            },
            LinkTopology::Branch { single_side, single, pair } => {
                if single_side == side {
                    smallvec![single]
                } else {
                    SmallVec::from_buf(pair)
                }
            }
        }
    }

    pub fn left_regions(&self) -> SmallVec<[Hash; 2]> {
        self.regions_on(Side::Left)
    }

    pub fn right_regions(&self) -> SmallVec<[Hash; 2]> {
        self.regions_on(Side::Right)
    }

    /// All regions, left side first
    pub fn regions(&self) -> SmallVec<[Hash; 3]> {
        self.left_regions().into_iter().chain(self.right_regions()).collect()
    }

    fn compute_hash(&self) -> Hash {
        let mut hasher = LinkHash::new();
        hasher
            .write_u8(self.kind() as u8)
            .write_var_array(self.left_regions().as_slice())
            .write_var_array(self.right_regions().as_slice());
        hasher.finalize()
    }
}

/// A candidate connection between regions of two adjacent sections.
///
/// `section` is the lower of the two sections. The hash covers kind and region hashes only; features are
/// derived data attached after extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    hash: Hash,
    section: u32,
    topology: LinkTopology,
    bounding_box: Rect,
    features: Vec<f64>,
}

impl Link {
    pub fn new(section: u32, topology: LinkTopology, bounding_box: Rect) -> Self {
        Self { hash: topology.compute_hash(), section, topology, bounding_box, features: vec![] }
    }

    pub fn with_features(mut self, features: Vec<f64>) -> Self {
        self.features = features;
        self
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn section(&self) -> u32 {
        self.section
    }

    pub fn kind(&self) -> LinkKind {
        self.topology.kind()
    }

    pub fn topology(&self) -> &LinkTopology {
        &self.topology
    }

    /// Union of the bounding boxes of the connected regions
    pub fn bounding_box(&self) -> Rect {
        self.bounding_box
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn left_regions(&self) -> SmallVec<[Hash; 2]> {
        self.topology.left_regions()
    }

    pub fn right_regions(&self) -> SmallVec<[Hash; 2]> {
        self.topology.right_regions()
    }

    pub fn regions(&self) -> SmallVec<[Hash; 3]> {
        self.topology.regions()
    }
}

/// An explicit requirement that at least one of the given links is part of the solution
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkConstraint {
    links: Vec<Hash>,
}

impl LinkConstraint {
    pub fn at_least_one_of(links: impl IntoIterator<Item = Hash>) -> Self {
        let mut links: Vec<Hash> = links.into_iter().collect();
        links.sort_unstable();
        links.dedup();
        Self { links }
    }

    pub fn links(&self) -> &[Hash] {
        &self.links
    }
}

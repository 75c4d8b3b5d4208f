//! Candidate links between the regions of two adjacent sections.

use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Rect,
    link::{Link, LinkTopology, Side},
    region::{ConflictSet, Region},
};
use itertools::Itertools;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Answers whether two regions are mutually exclusive
#[derive(Default)]
pub struct ConflictIndex {
    sets_of_region: HashMap<Hash, HashSet<Hash>>,
}

impl ConflictIndex {
    pub fn new<'a>(conflict_sets: impl IntoIterator<Item = &'a ConflictSet>) -> Self {
        let mut sets_of_region: HashMap<Hash, HashSet<Hash>> = HashMap::new();
        for set in conflict_sets {
            for region in set.regions() {
                sets_of_region.entry(*region).or_default().insert(set.hash());
            }
        }
        Self { sets_of_region }
    }

    pub fn in_conflict(&self, a: &Hash, b: &Hash) -> bool {
        match (self.sets_of_region.get(a), self.sets_of_region.get(b)) {
            (Some(x), Some(y)) => !x.is_disjoint(y),
            _ => false,
        }
    }
}

fn bounding_box<'a>(regions: impl IntoIterator<Item = &'a Arc<Region>>) -> Rect {
    regions.into_iter().fold(Rect::default(), |acc, r| acc.union(&r.bounding_box()))
}

/// Builds every candidate link of the interval between `section` (left) and `section + 1` (right).
///
/// Overlapping pairs give continuations. A region overlapping two non-conflicting regions on the other side
/// gives a branch. Every region yields an end on its side of the interval. The output is sorted by hash.
pub fn extract_links(section: u32, left: &[Arc<Region>], right: &[Arc<Region>], conflicts: &ConflictIndex) -> Vec<Link> {
    let mut links = Vec::new();
    let mut partners_of_left: HashMap<Hash, Vec<&Arc<Region>>> = HashMap::new();
    let mut partners_of_right: HashMap<Hash, Vec<&Arc<Region>>> = HashMap::new();

    for l in left {
        for r in right {
            if l.overlap(r) > 0 {
                partners_of_left.entry(l.hash()).or_default().push(r);
                partners_of_right.entry(r.hash()).or_default().push(l);
                links.push(Link::new(section, LinkTopology::continuation(l.hash(), r.hash()), bounding_box([l, r])));
            }
        }
    }

    for (side, singles) in [(Side::Left, left), (Side::Right, right)] {
        let partners = if side == Side::Left { &partners_of_left } else { &partners_of_right };
        for single in singles {
            let Some(others) = partners.get(&single.hash()) else { continue };
            for (a, b) in others.iter().tuple_combinations() {
                if conflicts.in_conflict(&a.hash(), &b.hash()) {
                    continue;
                }
                let topology = LinkTopology::branch(side, single.hash(), a.hash(), b.hash());
                links.push(Link::new(section, topology, bounding_box([single, *a, *b])));
            }
        }
    }

    links.extend(left.iter().map(|l| Link::new(section, LinkTopology::end(Side::Left, l.hash()), l.bounding_box())));
    links.extend(right.iter().map(|r| Link::new(section, LinkTopology::end(Side::Right, r.hash()), r.bounding_box())));

    links.sort_by_key(|l| l.hash());
    links.dedup_by_key(|l| l.hash());
    links
}

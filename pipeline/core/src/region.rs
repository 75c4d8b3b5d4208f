use crate::{coords::Rect, hashing::HasherExtensions};
use blockwise_hashes::{ConflictSetHash, Hash, RegionHash};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
};

/// Regions looked up by hash. All cross references between entities go through maps like this one.
pub type RegionMap = HashMap<Hash, Arc<Region>>;

/// A pixel within a section. Ordered row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pixel {
    pub y: u32,
    pub x: u32,
}

impl Pixel {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A candidate 2D connected component within one section.
///
/// Identity is the content hash over section, pixel geometry and value, so the same component extracted
/// from two different windows is the same region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    hash: Hash,
    section: u32,
    value: f64,
    bounding_box: Rect,
    pixels: Arc<Vec<Pixel>>,
}

impl Region {
    pub fn new(section: u32, mut pixels: Vec<Pixel>, value: f64) -> Self {
        pixels.sort_unstable();
        pixels.dedup();
        let bounding_box = pixels.iter().fold(Rect::default(), |acc, p| acc.union(&Rect::new(p.x, p.y, p.x + 1, p.y + 1)));
        let hash = Self::compute_hash(section, &pixels, value);
        Self { hash, section, value, bounding_box, pixels: Arc::new(pixels) }
    }

    fn compute_hash(section: u32, pixels: &[Pixel], value: f64) -> Hash {
        let mut hasher = RegionHash::new();
        hasher.write_u32(section).write_f64(value).write_len(pixels.len());
        for p in pixels {
            hasher.write_u32(p.x).write_u32(p.y);
        }
        hasher.finalize()
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn section(&self) -> u32 {
        self.section
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn bounding_box(&self) -> Rect {
        self.bounding_box
    }

    /// Sorted, distinct pixels
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn size(&self) -> usize {
        self.pixels.len()
    }

    /// The same region shifted by `(dx, dy)`. The hash is recomputed.
    pub fn translated(&self, dx: u32, dy: u32) -> Region {
        let pixels = self.pixels.iter().map(|p| Pixel::new(p.x + dx, p.y + dy)).collect();
        Region::new(self.section, pixels, self.value)
    }

    /// Number of pixel positions shared with `other`, ignoring sections
    pub fn overlap(&self, other: &Region) -> usize {
        if !self.bounding_box.intersects(&other.bounding_box) {
            return 0;
        }
        let (mut i, mut j, mut count) = (0, 0, 0);
        let (a, b) = (self.pixels(), other.pixels());
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        count
    }
}

/// A set of mutually exclusive regions, typically the nested candidates along one path of a component tree
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictSet {
    hash: Hash,
    regions: Vec<Hash>,
    maximal: bool,
}

impl ConflictSet {
    pub fn new(regions: impl IntoIterator<Item = Hash>, maximal: bool) -> Self {
        let mut regions: Vec<Hash> = regions.into_iter().collect();
        regions.sort_unstable();
        regions.dedup();
        let mut hasher = ConflictSetHash::new();
        hasher.write_var_array(&regions);
        Self { hash: hasher.finalize(), regions, maximal }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Sorted member hashes
    pub fn regions(&self) -> &[Hash] {
        &self.regions
    }

    pub fn contains(&self, region: &Hash) -> bool {
        self.regions.binary_search(region).is_ok()
    }

    pub fn is_maximal(&self) -> bool {
        self.maximal
    }

    /// Rewrites member hashes through `map`. Members missing from the map are kept as is.
    pub fn remapped(&self, map: &HashMap<Hash, Hash>) -> ConflictSet {
        ConflictSet::new(self.regions.iter().map(|h| *map.get(h).unwrap_or(h)), self.maximal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: u32, y0: u32, side: u32) -> Vec<Pixel> {
        (y0..y0 + side).flat_map(|y| (x0..x0 + side).map(move |x| Pixel::new(x, y))).collect()
    }

    #[test]
    fn test_identity_is_geometric() {
        let a = Region::new(3, square(0, 0, 4), 100.0);
        let mut reversed = square(0, 0, 4);
        reversed.reverse();
        let b = Region::new(3, reversed, 100.0);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), Region::new(4, square(0, 0, 4), 100.0).hash());
        assert_ne!(a.hash(), Region::new(3, square(0, 0, 4), 101.0).hash());
        assert_eq!(a.bounding_box(), Rect::new(0, 0, 4, 4));
    }

    #[test]
    fn test_translation_matches_direct_construction() {
        let local = Region::new(0, square(2, 3, 5), 7.0);
        let moved = local.translated(100, 50);
        let direct = Region::new(0, square(102, 53, 5), 7.0);
        assert_eq!(moved.hash(), direct.hash());
        assert_eq!(moved.bounding_box(), Rect::new(102, 53, 107, 58));
    }

    #[test]
    fn test_overlap() {
        let a = Region::new(0, square(0, 0, 4), 0.0);
        let b = Region::new(1, square(2, 2, 4), 0.0);
        let c = Region::new(1, square(10, 10, 2), 0.0);
        assert_eq!(a.overlap(&b), 4);
        assert_eq!(b.overlap(&a), 4);
        assert_eq!(a.overlap(&c), 0);
    }

    #[test]
    fn test_conflict_set_remap() {
        let (a, b, c): (Hash, Hash, Hash) = (1.into(), 2.into(), 3.into());
        let set = ConflictSet::new([b, a], true);
        assert_eq!(set.regions(), &[a, b]);
        assert_eq!(set.hash(), ConflictSet::new([a, b, a], false).hash());
        let remapped = set.remapped(&HashMap::from([(a, c)]));
        assert_eq!(remapped.regions(), &[b, c]);
        assert!(remapped.contains(&c));
        assert!(!remapped.contains(&a));
        assert_ne!(remapped.hash(), set.hash());
    }
}

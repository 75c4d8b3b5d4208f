//! Voxel-space geometry primitives and the block/core coordinates of the grid.
//!
//! All boxes are half-open: a box contains the voxels `min <= p < max` in every dimension.

use serde::{Deserialize, Serialize};
use std::{
    cmp::{max, min},
    collections::BTreeSet,
    fmt::Display,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct Point3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Point3 {
    pub const ZERO: Point3 = Point3::new(0, 0, 0);

    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: u32) -> Self {
        Self::new(v, v, v)
    }

    /// The coordinate along `axis` (0 = x, 1 = y, 2 = z)
    #[inline]
    pub fn axis(&self, axis: usize) -> u32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[inline]
    pub fn with_axis(mut self, axis: usize, value: u32) -> Self {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }

    pub fn has_zero(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }

    pub fn component_min(&self, other: &Point3) -> Point3 {
        Point3::new(min(self.x, other.x), min(self.y, other.y), min(self.z, other.z))
    }

    pub fn component_max(&self, other: &Point3) -> Point3 {
        Point3::new(max(self.x, other.x), max(self.y, other.y), max(self.z, other.z))
    }

    pub fn volume(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl From<[u32; 3]> for Point3 {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Point3> for [u32; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

impl Display for Point3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A half-open 2D rectangle in section coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Rect {
    pub const fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether the two rectangles share at least one pixel
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.min_x >= self.min_x && other.max_x <= self.max_x && other.min_y >= self.min_y && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// The smallest rectangle containing both. Empty operands are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(min(self.min_x, other.min_x), min(self.min_y, other.min_y), max(self.max_x, other.max_x), max(self.max_y, other.max_y))
    }

    pub fn translated(&self, dx: u32, dy: u32) -> Rect {
        Rect::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }
}

impl Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}) x [{}, {})", self.min_x, self.max_x, self.min_y, self.max_y)
    }
}

/// A half-open voxel box
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Box3 {
    pub min: Point3,
    pub max: Point3,
}

impl Box3 {
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    pub fn from_rect(rect: Rect, z_begin: u32, z_end: u32) -> Self {
        Self::new(Point3::new(rect.min_x, rect.min_y, z_begin), Point3::new(rect.max_x, rect.max_y, z_end))
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.min.x, self.min.y, self.max.x, self.max.y)
    }

    pub fn size(&self) -> Point3 {
        Point3::new(self.max.x.saturating_sub(self.min.x), self.max.y.saturating_sub(self.min.y), self.max.z.saturating_sub(self.min.z))
    }

    pub fn depth(&self) -> u32 {
        self.size().z
    }

    pub fn is_empty(&self) -> bool {
        self.size().has_zero()
    }

    pub fn contains_z(&self, z: u32) -> bool {
        z >= self.min.z && z < self.max.z
    }

    pub fn contains(&self, p: Point3) -> bool {
        self.contains_z(p.z) && self.rect().contains_point(p.x, p.y)
    }

    pub fn intersects(&self, other: &Box3) -> bool {
        !self.intersection(other).is_empty()
    }

    pub fn intersection(&self, other: &Box3) -> Box3 {
        let lo = self.min.component_max(&other.min);
        let hi = self.max.component_min(&other.max);
        Box3::new(lo, hi.component_max(&lo))
    }

    /// The smallest box containing both. Empty operands are ignored.
    pub fn union(&self, other: &Box3) -> Box3 {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Box3::new(self.min.component_min(&other.min), self.max.component_max(&other.max))
    }
}

impl Display for Box3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} - {})", self.min, self.max)
    }
}

macro_rules! grid_coordinate {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            // Field order gives z-major ordering, matching the section-wise processing order
            pub z: u32,
            pub y: u32,
            pub x: u32,
        }

        impl $name {
            pub const fn new(x: u32, y: u32, z: u32) -> Self {
                Self { x, y, z }
            }

            pub fn coords(&self) -> Point3 {
                Point3::new(self.x, self.y, self.z)
            }

            pub fn from_coords(p: Point3) -> Self {
                Self::new(p.x, p.y, p.z)
            }

            /// Big-endian key bytes, ordered like the coordinate itself
            pub fn to_key_bytes(&self) -> [u8; 12] {
                let mut bytes = [0u8; 12];
                bytes[..4].copy_from_slice(&self.z.to_be_bytes());
                bytes[4..8].copy_from_slice(&self.y.to_be_bytes());
                bytes[8..].copy_from_slice(&self.x.to_be_bytes());
                bytes
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}, {}, {})", stringify!($name), self.x, self.y, self.z)
            }
        }
    };
}

grid_coordinate!(
    /// Integer coordinates of the smallest spatial unit
    Block
);

grid_coordinate!(
    /// Integer coordinates of a group of blocks over which one optimization problem is solved
    Core
);

pub type BlockSet = BTreeSet<Block>;
pub type CoreSet = BTreeSet<Core>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection_is_half_open() {
        let a = Rect::new(0, 0, 50, 50);
        let b = Rect::new(50, 0, 100, 50);
        let c = Rect::new(49, 49, 51, 51);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(b.intersects(&c));
        assert!(!a.intersects(&Rect::new(10, 10, 10, 20)));
        assert_eq!(a.union(&b), Rect::new(0, 0, 100, 50));
        assert_eq!(Rect::default().union(&c), c);
    }

    #[test]
    fn test_box_intersection() {
        let a = Box3::new(Point3::new(0, 0, 0), Point3::new(10, 10, 10));
        let b = Box3::new(Point3::new(5, 5, 9), Point3::new(20, 20, 20));
        assert_eq!(a.intersection(&b), Box3::new(Point3::new(5, 5, 9), Point3::new(10, 10, 10)));
        let far = Box3::new(Point3::new(10, 0, 0), Point3::new(20, 10, 10));
        assert!(!a.intersects(&far));
        assert!(a.intersection(&far).is_empty());
    }

    #[test]
    fn test_block_ordering_and_keys() {
        let mut blocks: Vec<Block> = vec![Block::new(1, 0, 1), Block::new(0, 1, 0), Block::new(1, 0, 0)];
        blocks.sort();
        assert_eq!(blocks, vec![Block::new(1, 0, 0), Block::new(0, 1, 0), Block::new(1, 0, 1)]);
        let keys: Vec<_> = blocks.iter().map(|b| b.to_key_bytes()).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}

pub mod api;
pub mod config;
pub mod coords;
pub mod disjoint;
pub mod errors;
pub mod grid;
pub mod hashing;
pub mod link;
pub mod program;
pub mod raster;
pub mod region;
pub mod solution;

pub use coords::{Block, BlockSet, Box3, Core, CoreSet, Point3, Rect};

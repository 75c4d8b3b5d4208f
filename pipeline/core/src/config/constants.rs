//!
//! Defaults for the reconstruction configuration.
//!

use crate::coords::Point3;

/// Default block size in voxels
pub const DEFAULT_BLOCK_SIZE: Point3 = Point3::new(256, 256, 16);

/// Default core size in blocks
pub const DEFAULT_CORE_SIZE: Point3 = Point3::new(1, 1, 1);

/// Default number of halo blocks added around a core before solving
pub const DEFAULT_CORE_PADDING: u32 = 2;

/// Default bound on solution/link/region rounds per core
pub const DEFAULT_MAX_ROUNDS: usize = 16;

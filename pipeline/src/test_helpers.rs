//! Synthetic volumes and ready-made configurations for tests.

use crate::{
    model::stores::raster::MemoryRasterStore,
    pipeline::storage::Collaborators,
    processes::{
        features::GeometricFeatureExtractor,
        solver::BranchAndBoundSolver,
        threshold_extractor::{ThresholdExtractor, ThresholdExtractorParams},
    },
};
use blockwise_pipeline_core::{Box3, Point3, config::Config, raster::Raster};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::{ops::Range, sync::Arc};

/// Paints simple shapes into an 8-bit volume anchored at the origin
pub struct VolumeBuilder {
    size: Point3,
    data: Vec<u8>,
}

impl VolumeBuilder {
    pub fn new(size: Point3, background: u8) -> Self {
        Self { size, data: vec![background; size.volume() as usize] }
    }

    fn set(&mut self, x: u32, y: u32, z: u32, value: u8) {
        let index = (z as usize * self.size.y as usize + y as usize) * self.size.x as usize + x as usize;
        self.data[index] = value;
    }

    /// Fills `bounds`, clipped to the volume
    pub fn fill_box(mut self, bounds: Box3, value: u8) -> Self {
        let b = bounds.intersection(&Box3::new(Point3::ZERO, self.size));
        for z in b.min.z..b.max.z {
            for y in b.min.y..b.max.y {
                for x in b.min.x..b.max.x {
                    self.set(x, y, z, value);
                }
            }
        }
        self
    }

    fn fill_disc(&mut self, (cx, cy): (f64, f64), radius: f64, z: u32, value: u8) {
        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil() as u32 + 1).min(self.size.x);
        let max_y = ((cy + radius).ceil() as u32 + 1).min(self.size.y);
        for y in min_y..max_y {
            for x in min_x..max_x {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                if dx * dx + dy * dy <= radius * radius {
                    self.set(x, y, z, value);
                }
            }
        }
    }

    /// A disc of constant position over the sections of `sections`
    pub fn blob(mut self, center: (f64, f64), radius: f64, sections: Range<u32>, value: u8) -> Self {
        for z in sections.start..sections.end.min(self.size.z) {
            self.fill_disc(center, radius, z, value);
        }
        self
    }

    /// A disc moving linearly from `start` in the first section to `end` in the last one
    pub fn tube(mut self, start: (f64, f64), end: (f64, f64), radius: f64, value: u8) -> Self {
        let steps = self.size.z.saturating_sub(1).max(1) as f64;
        for z in 0..self.size.z {
            let t = z as f64 / steps;
            let center = (start.0 + (end.0 - start.0) * t, start.1 + (end.1 - start.1) * t);
            self.fill_disc(center, radius, z, value);
        }
        self
    }

    /// `count` blobs at reproducible random positions, each spanning a random run of sections
    pub fn random_blobs(mut self, seed: u64, count: usize, radius: Range<u32>, value: u8) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..count {
            let r = rng.gen_range(radius.clone()) as f64;
            let center = (rng.gen_range(0..self.size.x) as f64, rng.gen_range(0..self.size.y) as f64);
            let first = rng.gen_range(0..self.size.z);
            let last = rng.gen_range(first..self.size.z) + 1;
            self = self.blob(center, r, first..last, value);
        }
        self
    }

    pub fn build(self) -> Raster {
        Raster::new(Box3::new(Point3::ZERO, self.size), self.data).expect("buffer is sized from the volume")
    }

    pub fn into_store(self) -> MemoryRasterStore {
        MemoryRasterStore::new(self.build())
    }
}

/// A test configuration with padding 1, a single worker thread and weights favouring long continuations
pub fn test_config(volume_size: Point3, block_size: Point3, core_size: Point3) -> Config {
    Config {
        core_padding: 1,
        feature_weights: feature_weights(),
        num_threads: 1,
        ..Config::new(volume_size, block_size, core_size)
    }
}

/// Weights for the geometric features: ends are penalized, well-overlapping continuations rewarded
pub fn feature_weights() -> Vec<f64> {
    vec![0.0, 4.0, -1.0, 2.0, -3.0, 1.0, 0.0]
}

/// Reference collaborators over `raster_store`, extracting components at `thresholds`
pub fn test_collaborators(raster_store: MemoryRasterStore, thresholds: Vec<u8>) -> Collaborators {
    Collaborators {
        raster_store: Arc::new(raster_store),
        region_extractor: Arc::new(ThresholdExtractor::new(ThresholdExtractorParams { thresholds, ..Default::default() })),
        feature_extractor: Arc::new(GeometricFeatureExtractor::default()),
        solver: Arc::new(BranchAndBoundSolver::new()),
    }
}

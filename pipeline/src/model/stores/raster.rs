use blockwise_pipeline_core::{
    Box3, Point3,
    api::RasterStore,
    errors::collaborator::RasterError,
    raster::Raster,
};

/// A `RasterStore` serving crops of a single in-memory image stack
pub struct MemoryRasterStore {
    raster: Raster,
}

impl MemoryRasterStore {
    pub fn new(raster: Raster) -> Self {
        Self { raster }
    }

    /// A stack of `size` voxels at the origin, all set to `value`
    pub fn filled(size: Point3, value: u8) -> Self {
        Self::new(Raster::filled(Box3::new(Point3::ZERO, size), value))
    }

    pub fn bounds(&self) -> Box3 {
        self.raster.bounds()
    }
}

impl RasterStore for MemoryRasterStore {
    fn get_raster(&self, bounds: Box3) -> Result<Raster, RasterError> {
        self.raster.crop(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_request() {
        let store = MemoryRasterStore::filled(Point3::new(10, 10, 2), 7);
        let inner = Box3::new(Point3::new(2, 2, 1), Point3::new(5, 5, 2));
        assert_eq!(store.get_raster(inner).unwrap().get(Point3::new(4, 4, 1)), Some(7));
        let outside = Box3::new(Point3::new(8, 8, 0), Point3::new(12, 12, 1));
        assert!(matches!(store.get_raster(outside), Err(RasterError::OutOfBounds { .. })));
    }
}

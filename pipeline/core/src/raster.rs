use crate::{
    coords::{Box3, Point3},
    errors::collaborator::RasterError,
};
use std::sync::Arc;

/// An 8-bit intensity image over a voxel box, stored z-major then row-major
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    bounds: Box3,
    data: Arc<[u8]>,
}

impl Raster {
    /// Wraps `data` as the raster of `bounds`. Fails if the buffer length does not match the box volume.
    pub fn new(bounds: Box3, data: Vec<u8>) -> Result<Self, RasterError> {
        let expected = bounds.size().volume();
        if data.len() as u64 != expected {
            return Err(RasterError::SizeMismatch { bounds, expected, actual: data.len() as u64 });
        }
        Ok(Self { bounds, data: data.into() })
    }

    /// A raster of `bounds` with every voxel set to `value`
    pub fn filled(bounds: Box3, value: u8) -> Self {
        Self { bounds, data: vec![value; bounds.size().volume() as usize].into() }
    }

    pub fn bounds(&self) -> Box3 {
        self.bounds
    }

    pub fn origin(&self) -> Point3 {
        self.bounds.min
    }

    #[inline]
    fn index(&self, p: Point3) -> usize {
        let size = self.bounds.size();
        let (x, y, z) = ((p.x - self.bounds.min.x) as usize, (p.y - self.bounds.min.y) as usize, (p.z - self.bounds.min.z) as usize);
        (z * size.y as usize + y) * size.x as usize + x
    }

    /// The intensity at an absolute voxel position, if inside the raster
    pub fn get(&self, p: Point3) -> Option<u8> {
        self.bounds.contains(p).then(|| self.data[self.index(p)])
    }

    /// Copies out the sub-raster of `bounds`, which must lie within this raster
    pub fn crop(&self, bounds: Box3) -> Result<Raster, RasterError> {
        if self.bounds.intersection(&bounds) != bounds {
            return Err(RasterError::OutOfBounds { requested: bounds, available: self.bounds });
        }
        let mut data = Vec::with_capacity(bounds.size().volume() as usize);
        for z in bounds.min.z..bounds.max.z {
            for y in bounds.min.y..bounds.max.y {
                let start = self.index(Point3::new(bounds.min.x, y, z));
                data.extend_from_slice(&self.data[start..start + bounds.size().x as usize]);
            }
        }
        Ok(Self { bounds, data: data.into() })
    }
}

use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    Point3,
    api::FeatureExtractor,
    errors::collaborator::FeatureError,
    link::{Link, LinkTopology},
    raster::Raster,
    region::{Region, RegionMap},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const NUM_GEOMETRIC_FEATURES: usize = 7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GeometricFeatureParams {
    /// Divisor mapping raw intensities to the unit interval
    pub intensity_scale: f64,
}

impl Default for GeometricFeatureParams {
    fn default() -> Self {
        Self { intensity_scale: 255.0 }
    }
}

/// Reference feature extractor. Every link gets the vector
/// `[1, is_end, is_continuation, is_branch, overlap / union, relative size difference, mean intensity]`.
/// Features depend on the link's regions only, never on the extent of the raster crop.
#[derive(Clone, Debug, Default)]
pub struct GeometricFeatureExtractor {
    params: GeometricFeatureParams,
}

impl GeometricFeatureExtractor {
    pub fn new(params: GeometricFeatureParams) -> Self {
        Self { params }
    }

    fn link_features(&self, link: &Link, regions: &RegionMap, raster: &Raster) -> Result<Vec<f64>, FeatureError> {
        let lookup = |hash: &Hash| regions.get(hash).ok_or(FeatureError::UnknownRegion(link.hash(), *hash));

        let (kind, overlap_ratio, size_difference) = match link.topology() {
            LinkTopology::End { region, .. } => {
                lookup(region)?;
                ([1.0, 0.0, 0.0], 0.0, 0.0)
            }
            LinkTopology::Continuation { left, right } => {
                let (l, r) = (lookup(left)?, lookup(right)?);
                let overlap = l.overlap(r) as f64;
                let union = (l.size() + r.size()) as f64 - overlap;
                ([0.0, 1.0, 0.0], overlap / union, relative_difference(l.size(), r.size()))
            }
            LinkTopology::Branch { single, pair, .. } => {
                let (s, a, b) = (lookup(single)?, lookup(&pair[0])?, lookup(&pair[1])?);
                let overlap = (s.overlap(a) + s.overlap(b)) as f64;
                let union = (s.size() + a.size() + b.size()) as f64 - overlap;
                ([0.0, 0.0, 1.0], overlap / union, relative_difference(s.size(), a.size() + b.size()))
            }
        };

        let (mut sum, mut count) = (0u64, 0u64);
        for hash in link.regions() {
            let region = lookup(&hash)?;
            sum += intensity_sum(region, raster)?;
            count += region.size() as u64;
        }
        let mean_intensity = if count == 0 { 0.0 } else { sum as f64 / count as f64 / self.params.intensity_scale };

        Ok(vec![1.0, kind[0], kind[1], kind[2], overlap_ratio, size_difference, mean_intensity])
    }
}

fn relative_difference(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 { 0.0 } else { a.abs_diff(b) as f64 / max as f64 }
}

fn intensity_sum(region: &Region, raster: &Raster) -> Result<u64, FeatureError> {
    let mut sum = 0u64;
    for p in region.pixels() {
        let value = raster.get(Point3::new(p.x, p.y, region.section())).ok_or(FeatureError::OutsideRaster(region.hash(), raster.bounds()))?;
        sum += value as u64;
    }
    Ok(sum)
}

impl FeatureExtractor for GeometricFeatureExtractor {
    fn num_features(&self) -> usize {
        NUM_GEOMETRIC_FEATURES
    }

    fn features(&self, links: &[Link], regions: &RegionMap, raster: &Raster, _crop_offset: Point3) -> Result<HashMap<Hash, Vec<f64>>, FeatureError> {
        // Raster lookups use absolute coordinates, so the crop offset is implied by the raster bounds
        links.iter().map(|link| Ok((link.hash(), self.link_features(link, regions, raster)?))).collect()
    }
}

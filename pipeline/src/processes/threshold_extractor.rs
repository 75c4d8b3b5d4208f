//! Reference region extractor: a component tree over a fixed list of intensity thresholds.
//!
//! Components at a higher threshold are nested within components at lower thresholds, so every
//! root-to-leaf path of the tree is a set of mutually exclusive candidates.
//!
//! Components are 4-connected and depend only on their own pixels, so a component which does not touch the
//! raster border is the same in every raster containing it. `min-size` must not exceed the block width or
//! height, otherwise a component cut by a window border may be filtered out before it can trigger growth.

use blockwise_pipeline_core::{
    Point3,
    api::{Extraction, RegionExtractor},
    errors::collaborator::ExtractionError,
    raster::Raster,
    region::{ConflictSet, Pixel, Region},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThresholdExtractorParams {
    /// Foreground intensity levels, one tree level each
    pub thresholds: Vec<u8>,
    pub min_size: usize,
    /// Upper bound on component size, unbounded if unset
    pub max_size: Option<usize>,
    /// Treat low intensities as foreground
    pub foreground_is_dark: bool,
}

impl Default for ThresholdExtractorParams {
    fn default() -> Self {
        Self { thresholds: vec![128], min_size: 1, max_size: None, foreground_is_dark: false }
    }
}

struct Node {
    pixels: Vec<Pixel>,
    threshold: u8,
    parent: Option<usize>,
    is_leaf: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ThresholdExtractor {
    params: ThresholdExtractorParams,
}

impl ThresholdExtractor {
    pub fn new(mut params: ThresholdExtractorParams) -> Self {
        params.thresholds.sort_unstable();
        params.thresholds.dedup();
        Self { params }
    }

    fn accepts(&self, size: usize) -> bool {
        size >= self.params.min_size && self.params.max_size.is_none_or(|max| size <= max)
    }

    fn build_tree(&self, raster: &Raster) -> Vec<Node> {
        let (origin, size) = (raster.origin(), raster.bounds().size());
        let (width, height) = (size.x as usize, size.y as usize);
        let intensity = |x: usize, y: usize| {
            let v = raster.get(Point3::new(origin.x + x as u32, origin.y + y as u32, origin.z)).unwrap_or_default();
            if self.params.foreground_is_dark { u8::MAX - v } else { v }
        };

        let mut nodes: Vec<Node> = Vec::new();
        // Index of the innermost accepted component covering each pixel
        let mut ancestor: Vec<Option<usize>> = vec![None; width * height];

        for &threshold in &self.params.thresholds {
            let mut visited = vec![false; width * height];
            for start in 0..width * height {
                if visited[start] || intensity(start % width, start / width) < threshold {
                    continue;
                }
                visited[start] = true;
                let mut component = vec![start];
                let mut cursor = 0;
                while cursor < component.len() {
                    let i = component[cursor];
                    cursor += 1;
                    let (x, y) = (i % width, i / width);
                    let mut neighbors = [None; 4];
                    if x > 0 {
                        neighbors[0] = Some(i - 1);
                    }
                    if x + 1 < width {
                        neighbors[1] = Some(i + 1);
                    }
                    if y > 0 {
                        neighbors[2] = Some(i - width);
                    }
                    if y + 1 < height {
                        neighbors[3] = Some(i + width);
                    }
                    for j in neighbors.into_iter().flatten() {
                        if !visited[j] && intensity(j % width, j / width) >= threshold {
                            visited[j] = true;
                            component.push(j);
                        }
                    }
                }

                if !self.accepts(component.len()) {
                    continue;
                }
                let parent = ancestor[start];
                // Same pixels as the parent: nothing new to offer
                if parent.is_some_and(|p| nodes[p].pixels.len() == component.len()) {
                    continue;
                }
                let index = nodes.len();
                if let Some(p) = parent {
                    nodes[p].is_leaf = false;
                }
                for &i in &component {
                    ancestor[i] = Some(index);
                }
                let pixels = component.iter().map(|&i| Pixel::new((i % width) as u32, (i / width) as u32)).collect();
                nodes.push(Node { pixels, threshold, parent, is_leaf: true });
            }
        }
        nodes
    }
}

impl RegionExtractor for ThresholdExtractor {
    fn extract(&self, raster: &Raster) -> Result<Extraction, ExtractionError> {
        let depth = raster.bounds().depth();
        if depth != 1 {
            return Err(ExtractionError::NotASection(depth));
        }
        let section = raster.origin().z;

        let nodes = self.build_tree(raster);
        let regions: Vec<Region> = nodes.iter().map(|n| Region::new(section, n.pixels.clone(), n.threshold as f64)).collect();

        let mut conflict_sets = Vec::new();
        for (leaf, _) in nodes.iter().enumerate().filter(|(_, n)| n.is_leaf) {
            let mut path = vec![regions[leaf].hash()];
            let mut current = nodes[leaf].parent;
            while let Some(p) = current {
                path.push(regions[p].hash());
                current = nodes[p].parent;
            }
            conflict_sets.push(ConflictSet::new(path, true));
        }

        Ok(Extraction { regions, conflict_sets })
    }
}

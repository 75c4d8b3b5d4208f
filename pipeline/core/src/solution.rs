use crate::{coords::Core, disjoint::DisjointSets, link::Link};
use blockwise_hashes::Hash;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The chosen links of one core, together with their connected components ("assemblies")
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    core: Core,
    links: Vec<Hash>,
    assemblies: Vec<Vec<Hash>>,
}

impl Solution {
    /// Builds the solution of `core` from the chosen links. Two links belong to the same assembly
    /// when they share a region, directly or through other chosen links.
    pub fn from_links<'a>(core: Core, links: impl IntoIterator<Item = &'a Link>) -> Self {
        let links: Vec<&Link> = links.into_iter().sorted_by_key(|l| l.hash()).dedup_by(|a, b| a.hash() == b.hash()).collect();

        let mut sets = DisjointSets::new(links.len());
        let mut owner_of_region: HashMap<Hash, usize> = HashMap::new();
        for (i, link) in links.iter().enumerate() {
            for region in link.regions() {
                match owner_of_region.get(&region) {
                    Some(&j) => sets.union(i, j),
                    None => {
                        owner_of_region.insert(region, i);
                    }
                }
            }
        }

        let mut groups: HashMap<usize, Vec<Hash>> = HashMap::new();
        for (i, link) in links.iter().enumerate() {
            groups.entry(sets.find(i)).or_default().push(link.hash());
        }
        // Members are pushed in hash order, so sorting by first member fully orders the assemblies
        let assemblies = groups.into_values().sorted_by_key(|g| g[0]).collect();

        Self { core, links: links.iter().map(|l| l.hash()).collect(), assemblies }
    }

    pub fn core(&self) -> Core {
        self.core
    }

    /// Sorted hashes of the chosen links
    pub fn links(&self) -> &[Hash] {
        &self.links
    }

    pub fn assemblies(&self) -> &[Vec<Hash>] {
        &self.assemblies
    }

    pub fn contains(&self, link: &Hash) -> bool {
        self.links.binary_search(link).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coords::Rect,
        link::{LinkTopology, Side},
    };

    #[test]
    fn test_assemblies_follow_shared_regions() {
        let (r0, r1, r2, s0, s1): (Hash, Hash, Hash, Hash, Hash) = (1.into(), 2.into(), 3.into(), 10.into(), 11.into());
        let chain_a = Link::new(0, LinkTopology::continuation(r0, r1), Rect::default());
        let chain_b = Link::new(1, LinkTopology::continuation(r1, r2), Rect::default());
        let chain_end = Link::new(2, LinkTopology::end(Side::Left, r2), Rect::default());
        let lone = Link::new(0, LinkTopology::continuation(s0, s1), Rect::default());

        let solution = Solution::from_links(Core::new(0, 0, 0), [&chain_b, &lone, &chain_a, &chain_end, &lone]);
        assert_eq!(solution.links().len(), 4);
        assert!(solution.links().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(solution.assemblies().len(), 2);
        let sizes = solution.assemblies().iter().map(|a| a.len()).sorted().collect_vec();
        assert_eq!(sizes, vec![1, 3]);
        assert!(solution.contains(&lone.hash()));
    }

    #[test]
    fn test_empty_solution() {
        let solution = Solution::from_links(Core::new(1, 2, 3), []);
        assert!(solution.links().is_empty());
        assert!(solution.assemblies().is_empty());
        assert_eq!(solution.core(), Core::new(1, 2, 3));
    }
}

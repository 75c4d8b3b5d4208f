//! Assembly of the binary program selecting links for one core.

use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    link::{Link, LinkConstraint, Side},
    program::{LinearConstraint, LinearProgram, Relation},
    region::ConflictSet,
};
use indexmap::IndexSet;
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

/// A program over the links of a padded core. Variable `i` selects `links[i]`.
pub struct Problem {
    pub links: Vec<Arc<Link>>,
    pub program: LinearProgram,
}

impl Problem {
    /// The links selected by an assignment of the program's variables
    pub fn selected(&self, assignment: &[bool]) -> Vec<Arc<Link>> {
        self.links.iter().zip(assignment).filter(|(_, selected)| **selected).map(|(link, _)| link.clone()).collect()
    }
}

/// Which variables use each region, by side
#[derive(Default)]
struct RegionUses {
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegionUses {
    fn on(&self, side: Side) -> &[usize] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Builds the program over `links` with one cost per link.
///
/// Each conflict set admits at most one consumer (exactly one under `force_explanation`), where regions are
/// consumed by the links using them on their left side, or on their right side for regions of the last
/// section. Regions strictly between the first and last section conserve flow. Each explicit constraint
/// requires at least one of its links that are part of the problem.
pub fn build_problem(
    links: &[Arc<Link>],
    costs: &HashMap<Hash, f64>,
    conflict_sets: &[Arc<ConflictSet>],
    explicit: &[LinkConstraint],
    force_explanation: bool,
) -> Problem {
    let links: Vec<Arc<Link>> = links.iter().sorted_by_key(|l| l.hash()).dedup_by(|a, b| a.hash() == b.hash()).cloned().collect();
    let index: IndexSet<Hash> = links.iter().map(|l| l.hash()).collect();
    let objective = links.iter().map(|l| costs.get(&l.hash()).copied().unwrap_or_default()).collect();
    let mut program = LinearProgram::new(objective);

    let Some((first_section, max_section)) = links.iter().map(|l| l.section()).minmax().into_option() else {
        return Problem { links, program };
    };

    let mut uses: BTreeMap<Hash, RegionUses> = BTreeMap::new();
    let mut first_regions = BTreeSet::new();
    let mut last_regions = BTreeSet::new();
    for (i, link) in links.iter().enumerate() {
        for region in link.left_regions() {
            uses.entry(region).or_default().left.push(i);
            if link.section() == first_section {
                first_regions.insert(region);
            }
        }
        for region in link.right_regions() {
            uses.entry(region).or_default().right.push(i);
            if link.section() == max_section {
                last_regions.insert(region);
            }
        }
    }

    let exclusivity = if force_explanation { Relation::Equal } else { Relation::LessEqual };
    let consumers = |region: &Hash| -> Vec<(usize, f64)> {
        let side = if last_regions.contains(region) { Side::Right } else { Side::Left };
        uses.get(region).map(|u| u.on(side).iter().map(|&i| (i, 1.0)).collect()).unwrap_or_default()
    };

    let mut covered = BTreeSet::new();
    for set in conflict_sets.iter().sorted_by_key(|s| s.hash()).dedup_by(|a, b| a.hash() == b.hash()) {
        let terms: Vec<(usize, f64)> = set.regions().iter().flat_map(|r| consumers(r)).collect();
        covered.extend(set.regions().iter().copied());
        program.add_constraint(LinearConstraint::new(terms, exclusivity, 1.0));
    }
    for region in uses.keys().filter(|r| !covered.contains(*r)) {
        program.add_constraint(LinearConstraint::new(consumers(region), exclusivity, 1.0));
    }

    let inner = uses.iter().filter(|(r, _)| !first_regions.contains(*r) && !last_regions.contains(*r)).map(|(_, u)| u);
    for u in inner {
        let terms = u.right.iter().map(|&i| (i, 1.0)).chain(u.left.iter().map(|&i| (i, -1.0))).collect();
        program.add_constraint(LinearConstraint::new(terms, Relation::Equal, 0.0));
    }

    for constraint in explicit {
        let terms: Vec<(usize, f64)> = constraint.links().iter().filter_map(|h| index.get_index_of(h)).map(|i| (i, 1.0)).collect();
        program.add_constraint(LinearConstraint::new(terms, Relation::GreaterEqual, 1.0));
    }

    Problem { links, program }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_pipeline_core::{
        Rect,
        link::{LinkKind, LinkTopology},
    };

    fn link(section: u32, topology: LinkTopology) -> Arc<Link> {
        Arc::new(Link::new(section, topology, Rect::default()))
    }

    /// Regions a(0) -> b(1) -> c(2) with ends on both sides of every interval
    fn chain() -> (Vec<Arc<Link>>, [Hash; 3]) {
        let [a, b, c]: [Hash; 3] = [1.into(), 2.into(), 3.into()];
        let links = vec![
            link(0, LinkTopology::continuation(a, b)),
            link(1, LinkTopology::continuation(b, c)),
            link(0, LinkTopology::end(Side::Left, a)),
            link(0, LinkTopology::end(Side::Right, b)),
            link(1, LinkTopology::end(Side::Left, b)),
            link(1, LinkTopology::end(Side::Right, c)),
        ];
        (links, [a, b, c])
    }

    #[test]
    fn test_chain_program_shape() {
        let (links, _) = chain();
        let problem = build_problem(&links, &HashMap::new(), &[], &[], false);
        assert_eq!(problem.program.num_variables, 6);
        assert!(problem.links.windows(2).all(|w| w[0].hash() < w[1].hash()));

        // One exclusivity per region (a, b on the left, c on the right) and conservation for b only
        let relations = problem.program.constraints.iter().map(|c| c.relation).counts();
        assert_eq!(relations[&Relation::LessEqual], 3);
        assert_eq!(relations[&Relation::Equal], 1);
    }

    #[test]
    fn test_conservation_and_exclusivity_hold() {
        let (links, [a, b, _]) = chain();
        let costs: HashMap<Hash, f64> = links
            .iter()
            .map(|l| (l.hash(), if l.kind() == LinkKind::Continuation { -2.0 } else { 0.5 }))
            .collect();
        let sets = [Arc::new(ConflictSet::new([a, b], true))];
        let problem = build_problem(&links, &costs, &sets, &[], true);

        // a and b now share one exclusivity row: only one of them may be consumed on its left
        let row = problem.program.constraints.iter().find(|c| c.relation == Relation::Equal && c.value == 1.0).unwrap();
        assert_eq!(row.coefficients.len(), 4);

        let select = |hashes: &[Hash]| problem.links.iter().map(|l| hashes.contains(&l.hash())).collect::<Vec<_>>();
        let full_path = select(&[links[0].hash(), links[1].hash()]);
        assert!(!problem.program.is_feasible(&full_path));
        let begin_at_b = select(&[links[3].hash(), links[1].hash()]);
        assert!(problem.program.is_feasible(&begin_at_b));
    }

    #[test]
    fn test_explicit_constraints_ignore_foreign_links() {
        let (links, _) = chain();
        let foreign: Hash = 99.into();
        let explicit = [LinkConstraint::at_least_one_of([links[0].hash(), foreign]), LinkConstraint::at_least_one_of([foreign])];
        let problem = build_problem(&links, &HashMap::new(), &[], &explicit, false);
        let at_least: Vec<_> = problem.program.constraints.iter().filter(|c| c.relation == Relation::GreaterEqual).collect();
        assert_eq!(at_least.len(), 1);
        assert_eq!(at_least[0].coefficients.len(), 1);
    }
}

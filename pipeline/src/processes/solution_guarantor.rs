use crate::{
    errors::{GuaranteeError, GuaranteeResult},
    model::stores::{links::LinkStore, regions::RegionStore, solutions::SolutionStore},
    pipeline::ProcessingCounters,
    processes::problem::build_problem,
};
use blockwise_core::{debug, trace};
use blockwise_hashes::Hash;
use blockwise_pipeline_core::{
    BlockSet, Core,
    api::LinearSolver,
    config::Config,
    grid::{BlockGrid, Expansion},
    link::Link,
    solution::Solution,
};
use std::{
    collections::HashMap,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

/// The part of the configuration the solution stage depends on
#[derive(Clone, Debug)]
pub struct SolveParams {
    pub core_padding: u32,
    pub force_explanation: bool,
    pub feature_weights: Vec<f64>,
    pub solve_time_budget: Option<Duration>,
    pub read_costs: bool,
    pub store_costs: bool,
}

impl From<&Config> for SolveParams {
    fn from(config: &Config) -> Self {
        Self {
            core_padding: config.core_padding,
            force_explanation: config.force_explanation,
            feature_weights: config.feature_weights.clone(),
            solve_time_budget: config.solve_time_budget(),
            read_costs: config.read_costs,
            store_costs: config.store_costs,
        }
    }
}

/// Solves the link selection of one core over its padded neighborhood and stores the core's share
pub struct SolutionGuarantor {
    grid: BlockGrid,
    region_store: Arc<dyn RegionStore>,
    link_store: Arc<dyn LinkStore>,
    solution_store: Arc<dyn SolutionStore>,
    solver: Arc<dyn LinearSolver>,
    params: SolveParams,
    counters: Arc<ProcessingCounters>,
}

impl SolutionGuarantor {
    pub fn new(
        grid: BlockGrid,
        region_store: Arc<dyn RegionStore>,
        link_store: Arc<dyn LinkStore>,
        solution_store: Arc<dyn SolutionStore>,
        solver: Arc<dyn LinearSolver>,
        params: SolveParams,
        counters: Arc<ProcessingCounters>,
    ) -> Self {
        Self { grid, region_store, link_store, solution_store, solver, params, counters }
    }

    /// Solves and stores the solution of `core`. Returns the blocks whose links must be guaranteed first;
    /// nothing is written in that case.
    pub fn guarantee_solution(&self, core: Core) -> GuaranteeResult<BlockSet> {
        self.counters.solution_calls.fetch_add(1, Ordering::Relaxed);
        let core_blocks = self.grid.core_blocks(&core);
        if core_blocks.is_empty() {
            return Err(GuaranteeError::ConsistencyViolation(format!("{core} lies outside the grid")));
        }
        let padded = self.grid.expand(&core_blocks, Expansion::uniform(self.params.core_padding));

        let links = self.link_store.get_links_by_blocks(&padded)?;
        if !links.is_complete() {
            debug!("Solution of {} waits for the links of {} blocks", core, links.missing.len());
            self.counters.deficits.fetch_add(1, Ordering::Relaxed);
            return Ok(links.missing);
        }

        let conflict_sets = self.region_store.get_conflict_sets_by_blocks(&padded)?;
        if !conflict_sets.is_complete() {
            return Err(GuaranteeError::ConsistencyViolation(format!(
                "links of {} blocks around {} are done while their regions are not",
                conflict_sets.missing.len(),
                core
            )));
        }
        let explicit = self.link_store.get_constraints_by_blocks(&padded)?;
        let costs = self.costs(&links.items, &padded)?;

        let problem = build_problem(&links.items, &costs, &conflict_sets.items, &explicit, self.params.force_explanation);
        trace!(
            "Solving {} over {} links with {} constraints",
            core,
            problem.program.num_variables,
            problem.program.constraints.len()
        );
        let assignment = self.solver.solve(&problem.program, self.params.solve_time_budget)?;

        let core_box = self.grid.core_box(&core);
        let selected: Vec<_> = problem
            .selected(&assignment)
            .into_iter()
            .filter(|l| core_box.contains_z(l.section()) && core_box.rect().contains(&l.bounding_box()))
            .collect();

        if self.params.store_costs {
            self.link_store.store_link_costs(&costs, &core_blocks)?;
        }
        let solution = Solution::from_links(core, selected.iter().map(|l| l.as_ref()));
        debug!("{} selects {} links in {} assemblies", core, solution.links().len(), solution.assemblies().len());
        self.solution_store.store_solution(solution)?;
        self.counters.solutions_stored.fetch_add(1, Ordering::Relaxed);
        Ok(BlockSet::new())
    }

    /// Link costs, read from the store when enabled and complete, computed from the features otherwise
    fn costs(&self, links: &[Arc<Link>], padded: &BlockSet) -> GuaranteeResult<HashMap<Hash, f64>> {
        if self.params.read_costs && self.costs_done(padded)? {
            let hashes: Vec<Hash> = links.iter().map(|l| l.hash()).collect();
            let stored = self.link_store.get_link_costs(&hashes)?;
            if stored.len() == hashes.len() {
                return Ok(stored);
            }
        }

        let weights = &self.params.feature_weights;
        links
            .iter()
            .map(|link| {
                let features = link.features();
                if features.len() != weights.len() {
                    return Err(GuaranteeError::FeatureWeightMismatch { features: features.len(), weights: weights.len() });
                }
                Ok((link.hash(), features.iter().zip(weights).map(|(f, w)| f * w).sum()))
            })
            .collect()
    }

    fn costs_done(&self, blocks: &BlockSet) -> GuaranteeResult<bool> {
        for &block in blocks {
            if !self.link_store.costs_done(block)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

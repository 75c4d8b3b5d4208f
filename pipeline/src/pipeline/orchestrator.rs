use crate::{
    errors::{GuaranteeError, GuaranteeResult},
    pipeline::{
        ProcessingCounters,
        storage::{Collaborators, PipelineStorage},
    },
    processes::{
        link_guarantor::LinkGuarantor,
        region_guarantor::RegionGuarantor,
        solution_guarantor::{SolutionGuarantor, SolveParams},
    },
};
use blockwise_core::{debug, info, warn};
use blockwise_pipeline_core::{Core, CoreSet, config::Config, grid::BlockGrid};
use rayon::{ThreadPool, prelude::*};
use std::sync::{Arc, atomic::Ordering};

/// Drives the three guarantors of a core in dependency order until its solution is stored
pub struct Orchestrator {
    grid: BlockGrid,
    max_rounds: usize,
    storage: PipelineStorage,
    region_guarantor: RegionGuarantor,
    link_guarantor: LinkGuarantor,
    solution_guarantor: SolutionGuarantor,
    thread_pool: Arc<ThreadPool>,
    counters: Arc<ProcessingCounters>,
}

impl Orchestrator {
    pub fn new(config: &Config, storage: PipelineStorage, collaborators: Collaborators) -> GuaranteeResult<Self> {
        Self::with_counters(config, storage, collaborators, Default::default())
    }

    pub fn with_counters(
        config: &Config,
        storage: PipelineStorage,
        collaborators: Collaborators,
        counters: Arc<ProcessingCounters>,
    ) -> GuaranteeResult<Self> {
        config.validate()?;
        let grid = BlockGrid::from_config(config)?;
        // Costs read back from the store need no weights
        let features = collaborators.feature_extractor.num_features();
        if features != config.feature_weights.len() && !config.read_costs {
            return Err(GuaranteeError::FeatureWeightMismatch { features, weights: config.feature_weights.len() });
        }
        let num_threads = if config.num_threads == 0 { num_cpus::get() } else { config.num_threads };
        let thread_pool =
            Arc::new(rayon::ThreadPoolBuilder::new().num_threads(num_threads).thread_name(|i| format!("blockwise-pool-{i}")).build()?);

        let region_guarantor = RegionGuarantor::new(
            grid.clone(),
            storage.region_store.clone(),
            collaborators.raster_store.clone(),
            collaborators.region_extractor,
            thread_pool.clone(),
            counters.clone(),
        );
        let link_guarantor = LinkGuarantor::new(
            grid.clone(),
            storage.region_store.clone(),
            storage.link_store.clone(),
            collaborators.raster_store,
            collaborators.feature_extractor,
            counters.clone(),
        );
        let solution_guarantor = SolutionGuarantor::new(
            grid.clone(),
            storage.region_store.clone(),
            storage.link_store.clone(),
            storage.solution_store.clone(),
            collaborators.solver,
            SolveParams::from(config),
            counters.clone(),
        );

        Ok(Self {
            grid,
            max_rounds: config.max_rounds,
            storage,
            region_guarantor,
            link_guarantor,
            solution_guarantor,
            thread_pool,
            counters,
        })
    }

    pub fn grid(&self) -> &BlockGrid {
        &self.grid
    }

    pub fn storage(&self) -> &PipelineStorage {
        &self.storage
    }

    pub fn counters(&self) -> &Arc<ProcessingCounters> {
        &self.counters
    }

    pub fn region_guarantor(&self) -> &RegionGuarantor {
        &self.region_guarantor
    }

    pub fn link_guarantor(&self) -> &LinkGuarantor {
        &self.link_guarantor
    }

    pub fn solution_guarantor(&self) -> &SolutionGuarantor {
        &self.solution_guarantor
    }

    /// Runs solution, link and region rounds for `core` until its solution is stored
    pub fn guarantee_core(&self, core: Core) -> GuaranteeResult<()> {
        for round in 1..=self.max_rounds {
            self.counters.orchestration_rounds.fetch_add(1, Ordering::Relaxed);
            let missing_links = self.solution_guarantor.guarantee_solution(core)?;
            if missing_links.is_empty() {
                info!("Solved {} after {} rounds", core, round);
                return Ok(());
            }
            debug!("Round {} of {}: links of {} blocks are missing", round, core, missing_links.len());

            let missing_regions = self.link_guarantor.guarantee_links(&missing_links)?;
            if !missing_regions.is_empty() {
                debug!("Round {} of {}: regions of {} blocks are missing", round, core, missing_regions.len());
                self.region_guarantor.guarantee_regions(&missing_regions)?;
            }
        }
        warn!("{} did not converge within {} rounds", core, self.max_rounds);
        Err(GuaranteeError::NotConverged { core, rounds: self.max_rounds })
    }

    /// Guarantees many cores concurrently on the worker pool. Outcomes are ordered like `cores`.
    pub fn guarantee_cores(&self, cores: &CoreSet) -> Vec<(Core, GuaranteeResult<()>)> {
        let cores: Vec<Core> = cores.iter().copied().collect();
        self.thread_pool.install(|| cores.into_par_iter().map(|core| (core, self.guarantee_core(core))).collect())
    }

    pub fn guarantee_all(&self) -> Vec<(Core, GuaranteeResult<()>)> {
        let cores = self.grid.all_cores();
        info!("Guaranteeing all {} cores of a {} grid", cores.len(), self.grid.num_blocks());
        self.guarantee_cores(&cores)
    }
}

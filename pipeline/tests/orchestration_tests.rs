mod common;

use blockwise_core::log::try_init_logger;
use blockwise_hashes::Hash;
use blockwise_database::{create_temp_db, prelude::ConnBuilder};
use blockwise_pipeline::{
    errors::GuaranteeError,
    model::stores::{
        links::{LinkStore, LinkStoreReader, MemoryLinkStore},
        raster::MemoryRasterStore,
        regions::{MemoryRegionStore, RegionStoreReader},
        solutions::{MemorySolutionStore, SolutionStoreReader},
    },
    pipeline::{orchestrator::Orchestrator, storage::PipelineStorage},
    test_helpers::{VolumeBuilder, test_collaborators, test_config},
};
use blockwise_pipeline_core::{
    Block, BlockSet, Box3, Core, Point3,
    api::LinearSolver,
    config::Config,
    errors::solver::{SolverError, SolverResult},
    link::{Link, LinkConstraint, LinkKind},
    program::LinearProgram,
};
use common::MemoryPipeline;
use std::{collections::HashMap, sync::Arc, time::Duration};

const VOLUME: Point3 = Point3::new(100, 100, 6);
const BLOCK: Point3 = Point3::new(50, 50, 3);

fn scene() -> MemoryRasterStore {
    VolumeBuilder::new(VOLUME, 0)
        .tube((20.0, 20.0), (30.0, 26.0), 5.0, 200)
        .tube((45.0, 60.0), (56.0, 64.0), 5.0, 200)
        .blob((75.0, 75.0), 8.0, 1..5, 200)
        .into_store()
}

fn config() -> Config {
    test_config(VOLUME, BLOCK, Point3::splat(1))
}

struct FailingSolver;

impl LinearSolver for FailingSolver {
    fn solve(&self, _program: &LinearProgram, budget: Option<Duration>) -> SolverResult<Vec<bool>> {
        Err(SolverError::Timeout(budget.unwrap_or_default()))
    }
}

#[test]
fn test_guarantee_all_converges() {
    try_init_logger("info");
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    let outcomes = pipeline.orchestrator.guarantee_all();
    assert_eq!(outcomes.len(), 8);
    for (core, outcome) in outcomes {
        assert!(outcome.is_ok(), "{core}: {outcome:?}");
        assert!(pipeline.solutions.get_solution(core).unwrap().is_some());
    }

    let counters = pipeline.orchestrator.counters().snapshot();
    assert_eq!(counters.solutions_stored, 8);
    assert!(counters.deficits > 0);
    // The first core resolves every deficit, the others find their links done
    assert!(counters.orchestration_rounds >= 10);
    assert!(pipeline.links.num_links() > 0);
}

#[test]
fn test_guarantors_are_idempotent() {
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    let block = Block::new(0, 1, 0);
    let request = BlockSet::from([block]);
    let regions = pipeline.orchestrator.region_guarantor();
    let links = pipeline.orchestrator.link_guarantor();

    assert!(regions.guarantee_regions(&request).unwrap().is_empty());
    let stored = pipeline.regions.num_regions();
    let before = pipeline.orchestrator.counters().snapshot();
    assert!(regions.guarantee_regions(&request).unwrap().is_empty());
    let delta = &pipeline.orchestrator.counters().snapshot() - &before;
    assert_eq!(delta.region_calls, 1);
    assert_eq!(delta.regions_stored, 0);
    assert_eq!(pipeline.regions.num_regions(), stored);

    let mut missing = links.guarantee_links(&request).unwrap();
    while !missing.is_empty() {
        assert!(missing.iter().all(|b| !pipeline.regions.regions_done(*b).unwrap()));
        regions.guarantee_regions(&missing).unwrap();
        missing = links.guarantee_links(&request).unwrap();
    }
    let stored = pipeline.links.num_links();
    let before = pipeline.orchestrator.counters().snapshot();
    assert!(links.guarantee_links(&request).unwrap().is_empty());
    let delta = &pipeline.orchestrator.counters().snapshot() - &before;
    assert_eq!(delta.links_stored, 0);
    assert_eq!(delta.deficits, 0);
    assert_eq!(pipeline.links.num_links(), stored);
}

#[test]
fn test_overlapping_requests_store_each_region_once() {
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    let (left, right) = (Block::new(0, 1, 0), Block::new(1, 1, 0));
    let regions = pipeline.orchestrator.region_guarantor();
    regions.guarantee_regions(&BlockSet::from([left])).unwrap();
    regions.guarantee_regions(&BlockSet::from([right])).unwrap();

    // The tube crossing both blocks is discovered from either side
    let of_left: Vec<_> = pipeline.regions.get_regions_by_blocks(&BlockSet::from([left])).unwrap().hashes().collect();
    let of_right = pipeline.regions.get_regions_by_blocks(&BlockSet::from([right])).unwrap();
    assert!(of_right.hashes().any(|h| of_left.contains(&h)));

    let monolithic = MemoryPipeline::new(&test_config(VOLUME, VOLUME, Point3::splat(1)), scene(), vec![128]);
    monolithic.regions_block_by_block();
    let reference = monolithic.region_summary();
    let stored = pipeline.region_summary();
    assert!(stored.keys().all(|h| reference.contains_key(h)));
    assert_eq!(pipeline.regions.num_regions(), stored.len());
}

#[test]
fn test_completion_flags_are_monotonic() {
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    let blocks: Vec<Block> = pipeline.all_blocks().into_iter().collect();
    let mut done = BlockSet::new();
    for block in blocks.iter().copied() {
        pipeline.orchestrator.region_guarantor().guarantee_regions(&BlockSet::from([block])).unwrap();
        done.insert(block);
        for b in &blocks {
            assert_eq!(pipeline.regions.regions_done(*b).unwrap(), done.contains(b));
        }
    }
    pipeline.links_block_by_block();
    assert!(blocks.iter().all(|b| pipeline.regions.regions_done(*b).unwrap() && pipeline.links.links_done(*b).unwrap()));
}

#[test]
fn test_unavailable_raster_persists_nothing() {
    // The raster covers only half of the configured volume
    let raster = MemoryRasterStore::filled(Point3::new(50, 100, 6), 200);
    let pipeline = MemoryPipeline::new(&config(), raster, vec![128]);
    let result = pipeline.orchestrator.region_guarantor().guarantee_regions(&BlockSet::from([Block::new(0, 0, 0)]));
    assert!(matches!(result, Err(GuaranteeError::RasterUnavailable { .. })));
    assert_eq!(pipeline.regions.num_regions(), 0);
    assert!(pipeline.all_blocks().into_iter().all(|b| !pipeline.regions.regions_done(b).unwrap()));

    let result = pipeline.orchestrator.guarantee_core(Core::new(0, 0, 0));
    assert!(matches!(result, Err(GuaranteeError::RasterUnavailable { .. })));
    assert_eq!(pipeline.links.num_links(), 0);
}

#[test]
fn test_solver_failure_persists_nothing() {
    let regions = Arc::new(MemoryRegionStore::new());
    let links = Arc::new(MemoryLinkStore::new());
    let solutions = Arc::new(MemorySolutionStore::new());
    let storage = PipelineStorage { region_store: regions.clone(), link_store: links.clone(), solution_store: solutions.clone() };
    let mut collaborators = test_collaborators(scene(), vec![128]);
    collaborators.solver = Arc::new(FailingSolver);
    let mut config = config();
    config.store_costs = true;
    config.solve_time_budget_ms = Some(10);
    let orchestrator = Orchestrator::new(&config, storage, collaborators).unwrap();

    let core = Core::new(0, 0, 0);
    let result = orchestrator.guarantee_core(core);
    assert!(matches!(result, Err(GuaranteeError::Solver(SolverError::Timeout(budget))) if budget == Duration::from_millis(10)));
    assert!(solutions.get_solution(core).unwrap().is_none());
    assert_eq!(solutions.num_solutions(), 0);
    assert!(!links.costs_done(Block::new(0, 0, 0)).unwrap());
    assert_eq!(orchestrator.counters().snapshot().solutions_stored, 0);
    // Upstream stages completed before the solve
    assert!(links.links_done(Block::new(0, 0, 0)).unwrap());
    assert!(regions.num_regions() > 0);
}

#[test]
fn test_links_without_regions_violate_consistency() {
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    for block in pipeline.all_blocks() {
        pipeline.links.associate_links(&[], block).unwrap();
    }
    let result = pipeline.orchestrator.solution_guarantor().guarantee_solution(Core::new(0, 0, 0));
    assert!(matches!(result, Err(GuaranteeError::ConsistencyViolation(_))));
    assert_eq!(pipeline.solutions.num_solutions(), 0);
}

#[test]
fn test_round_bound_is_enforced() {
    let mut bounded = config();
    bounded.max_rounds = 1;
    let pipeline = MemoryPipeline::new(&bounded, scene(), vec![128]);
    let core = Core::new(0, 0, 0);
    let result = pipeline.orchestrator.guarantee_core(core);
    assert!(matches!(result, Err(GuaranteeError::NotConverged { core: c, rounds: 1 }) if c == core));
    assert_eq!(pipeline.orchestrator.counters().snapshot().orchestration_rounds, 1);
    assert!(pipeline.solutions.get_solution(core).unwrap().is_none());

    // Progress is kept, so a fresh attempt with more rounds completes
    let fresh = Orchestrator::new(&config(), pipeline.orchestrator.storage().clone(), test_collaborators(scene(), vec![128])).unwrap();
    assert!(fresh.guarantee_core(core).is_ok());
    assert!(pipeline.solutions.get_solution(core).unwrap().is_some());
}

#[test]
fn test_explicit_constraint_is_honoured() {
    let pipeline = MemoryPipeline::new(&config(), scene(), vec![128]);
    let core = Core::new(0, 0, 0);
    pipeline.orchestrator.guarantee_core(core).unwrap();
    let solution = pipeline.solutions.get_solution(core).unwrap().unwrap();

    // Force an end which the unconstrained optimum leaves out
    let blocks = pipeline.orchestrator.grid().core_blocks(&core);
    let end = pipeline
        .links
        .get_links_by_blocks(&blocks)
        .unwrap()
        .items
        .into_iter()
        .find(|l| l.kind() == LinkKind::End && l.section() == 0 && !solution.contains(&l.hash()))
        .unwrap();
    let block = *blocks.first().unwrap();
    pipeline.links.add_constraint(LinkConstraint::at_least_one_of([end.hash()]), block).unwrap();

    assert!(pipeline.orchestrator.solution_guarantor().guarantee_solution(core).unwrap().is_empty());
    let constrained = pipeline.solutions.get_solution(core).unwrap().unwrap();
    assert!(constrained.contains(&end.hash()));
}

#[test]
fn test_stored_costs_are_reused() {
    let mut config = config();
    config.store_costs = true;
    config.read_costs = true;
    let pipeline = MemoryPipeline::new(&config, scene(), vec![128]);
    let core = Core::new(0, 0, 0);
    pipeline.orchestrator.guarantee_core(core).unwrap();
    let first = pipeline.solutions.get_solution(core).unwrap().unwrap();

    let core_blocks = pipeline.orchestrator.grid().core_blocks(&core);
    assert!(core_blocks.iter().all(|b| pipeline.links.costs_done(*b).unwrap()));
    let stored = pipeline.links.get_link_costs(first.links()).unwrap();
    assert_eq!(stored.len(), first.links().len());
    assert!(stored.values().all(|c| c.is_finite()));

    assert!(pipeline.orchestrator.solution_guarantor().guarantee_solution(core).unwrap().is_empty());
    assert_eq!(pipeline.solutions.get_solution(core).unwrap().unwrap(), first);
}

#[test]
fn test_db_backed_run_matches_memory() {
    let memory = MemoryPipeline::new(&config(), scene(), vec![128]);
    assert!(memory.orchestrator.guarantee_all().into_iter().all(|(_, result)| result.is_ok()));

    let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
    let storage = PipelineStorage::db(db.clone());
    let orchestrator = Orchestrator::new(&config(), storage.clone(), test_collaborators(scene(), vec![128])).unwrap();
    assert!(orchestrator.guarantee_all().into_iter().all(|(_, result)| result.is_ok()));

    for core in orchestrator.grid().all_cores() {
        let expected = memory.solutions.get_solution(core).unwrap().unwrap();
        let actual = storage.solution_store.get_solution(core).unwrap().unwrap();
        assert_eq!(actual, expected);
    }
    let blocks = orchestrator.grid().all_blocks();
    assert_eq!(
        storage.link_store.get_links_by_blocks(&blocks).unwrap().hashes().collect::<Vec<_>>(),
        memory.links.get_links_by_blocks(&blocks).unwrap().hashes().collect::<Vec<_>>()
    );
    drop(orchestrator);
    drop(storage);
    drop(db);
}

#[test]
fn test_forced_explanation_consumes_every_conflict_set_once() {
    // Two bright cores nested in one dim region, over three sections
    let volume = Point3::new(200, 50, 3);
    let raster = VolumeBuilder::new(volume, 0)
        .fill_box(Box3::new(Point3::new(60, 15, 0), Point3::new(140, 35, 3)), 120)
        .fill_box(Box3::new(Point3::new(64, 18, 0), Point3::new(96, 32, 3)), 220)
        .fill_box(Box3::new(Point3::new(104, 18, 0), Point3::new(136, 32, 3)), 220)
        .into_store();
    let mut config = test_config(volume, volume, Point3::splat(1));
    config.force_explanation = true;
    let pipeline = MemoryPipeline::new(&config, raster, vec![100, 200]);
    let core = Core::new(0, 0, 0);
    pipeline.orchestrator.guarantee_core(core).unwrap();

    let all = pipeline.all_blocks();
    let links: HashMap<Hash, Arc<Link>> =
        pipeline.links.get_links_by_blocks(&all).unwrap().items.into_iter().map(|l| (l.hash(), l)).collect();
    let conflict_sets = pipeline.regions.get_conflict_sets_by_blocks(&all).unwrap().items;
    assert_eq!(conflict_sets.len(), 6);

    // The core spans the volume, so the solution is the full assignment. The top section closes with
    // left ends, hence every region is consumed on the left side of a link.
    let solution = pipeline.solutions.get_solution(core).unwrap().unwrap();
    let chosen: Vec<&Arc<Link>> = solution.links().iter().map(|h| &links[h]).collect();
    for set in &conflict_sets {
        let consumers = chosen.iter().filter(|l| l.left_regions().iter().any(|r| set.contains(r))).count();
        assert_eq!(consumers, 1, "conflict set {} has {consumers} consumers", set.hash());
    }
}

#[test]
fn test_feature_weights_must_match_extractor() {
    let mut config = config();
    config.feature_weights = vec![1.0, 2.0, 3.0];
    let built = Orchestrator::new(&config, PipelineStorage::memory(), test_collaborators(scene(), vec![128]));
    assert!(matches!(built, Err(GuaranteeError::FeatureWeightMismatch { features: 7, weights: 3 })));

    // Stored costs make the weights optional
    config.feature_weights = vec![];
    config.read_costs = true;
    assert!(Orchestrator::new(&config, PipelineStorage::memory(), test_collaborators(scene(), vec![128])).is_ok());
}

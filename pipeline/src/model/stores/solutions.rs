use blockwise_database::{
    prelude::{CachePolicy, CachedDbAccess, DB, DirectDbWriter, StoreResult, StoreResultExt},
    registry::DatabaseStorePrefixes,
};
use blockwise_pipeline_core::{Core, solution::Solution};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Fixed-width DB key of a core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CoreKey([u8; 12]);

impl From<Core> for CoreKey {
    fn from(core: Core) -> Self {
        Self(core.to_key_bytes())
    }
}

impl AsRef<[u8]> for CoreKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reader API for `SolutionStore`.
pub trait SolutionStoreReader {
    fn get_solution(&self, core: Core) -> StoreResult<Option<Arc<Solution>>>;
}

pub trait SolutionStore: SolutionStoreReader + Send + Sync {
    /// Stores the solution, replacing any previous solution of the same core
    fn store_solution(&self, solution: Solution) -> StoreResult<()>;
}

/// An in-memory implementation of `SolutionStore`
#[derive(Default)]
pub struct MemorySolutionStore {
    solutions: RwLock<HashMap<Core, Arc<Solution>>>,
}

impl MemorySolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_solutions(&self) -> usize {
        self.solutions.read().len()
    }
}

impl SolutionStoreReader for MemorySolutionStore {
    fn get_solution(&self, core: Core) -> StoreResult<Option<Arc<Solution>>> {
        Ok(self.solutions.read().get(&core).cloned())
    }
}

impl SolutionStore for MemorySolutionStore {
    fn store_solution(&self, solution: Solution) -> StoreResult<()> {
        self.solutions.write().insert(solution.core(), Arc::new(solution));
        Ok(())
    }
}

/// A DB + cache implementation of `SolutionStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbSolutionStore {
    db: Arc<DB>,
    access: CachedDbAccess<CoreKey, Arc<Solution>>,
}

impl DbSolutionStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::Solutions.into()) }
    }

    pub fn clone_with_new_cache(&self, cache_policy: CachePolicy) -> Self {
        Self::new(Arc::clone(&self.db), cache_policy)
    }
}

impl SolutionStoreReader for DbSolutionStore {
    fn get_solution(&self, core: Core) -> StoreResult<Option<Arc<Solution>>> {
        self.access.read(core.into()).optional()
    }
}

impl SolutionStore for DbSolutionStore {
    fn store_solution(&self, solution: Solution) -> StoreResult<()> {
        self.access.write(DirectDbWriter::new(&self.db), solution.core().into(), Arc::new(solution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_database::{create_temp_db, prelude::ConnBuilder};
    use blockwise_pipeline_core::{
        Rect,
        link::{Link, LinkTopology},
    };

    fn check_store(store: &dyn SolutionStore) {
        let core = Core::new(1, 0, 0);
        let link = Link::new(0, LinkTopology::continuation(1.into(), 2.into()), Rect::new(0, 0, 1, 1));
        assert!(store.get_solution(core).unwrap().is_none());

        store.store_solution(Solution::from_links(core, [&link])).unwrap();
        store.store_solution(Solution::from_links(core, [])).unwrap();
        let stored = store.get_solution(core).unwrap().unwrap();
        assert!(stored.links().is_empty());
        assert_eq!(stored.core(), core);
    }

    #[test]
    fn test_memory_solution_store() {
        let store = MemorySolutionStore::new();
        check_store(&store);
        assert_eq!(store.num_solutions(), 1);
    }

    #[test]
    fn test_db_solution_store() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let store = DbSolutionStore::new(db.clone(), CachePolicy::Count(4));
        check_store(&store);
        let store = store.clone_with_new_cache(CachePolicy::Empty);
        assert!(store.get_solution(Core::new(1, 0, 0)).unwrap().unwrap().links().is_empty());
    }
}

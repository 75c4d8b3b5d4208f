pub mod orchestrator;
pub mod storage;

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct ProcessingCounters {
    pub region_calls: AtomicU64,
    pub regions_stored: AtomicU64,
    pub window_growths: AtomicU64,
    pub link_calls: AtomicU64,
    pub links_stored: AtomicU64,
    pub solution_calls: AtomicU64,
    pub solutions_stored: AtomicU64,
    pub deficits: AtomicU64,
    pub orchestration_rounds: AtomicU64,
}

impl ProcessingCounters {
    pub fn snapshot(&self) -> ProcessingCountersSnapshot {
        ProcessingCountersSnapshot {
            region_calls: self.region_calls.load(Ordering::Relaxed),
            regions_stored: self.regions_stored.load(Ordering::Relaxed),
            window_growths: self.window_growths.load(Ordering::Relaxed),
            link_calls: self.link_calls.load(Ordering::Relaxed),
            links_stored: self.links_stored.load(Ordering::Relaxed),
            solution_calls: self.solution_calls.load(Ordering::Relaxed),
            solutions_stored: self.solutions_stored.load(Ordering::Relaxed),
            deficits: self.deficits.load(Ordering::Relaxed),
            orchestration_rounds: self.orchestration_rounds.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingCountersSnapshot {
    pub region_calls: u64,
    pub regions_stored: u64,
    pub window_growths: u64,
    pub link_calls: u64,
    pub links_stored: u64,
    pub solution_calls: u64,
    pub solutions_stored: u64,
    pub deficits: u64,
    pub orchestration_rounds: u64,
}

impl core::ops::Sub for &ProcessingCountersSnapshot {
    type Output = ProcessingCountersSnapshot;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            region_calls: self.region_calls.saturating_sub(rhs.region_calls),
            regions_stored: self.regions_stored.saturating_sub(rhs.regions_stored),
            window_growths: self.window_growths.saturating_sub(rhs.window_growths),
            link_calls: self.link_calls.saturating_sub(rhs.link_calls),
            links_stored: self.links_stored.saturating_sub(rhs.links_stored),
            solution_calls: self.solution_calls.saturating_sub(rhs.solution_calls),
            solutions_stored: self.solutions_stored.saturating_sub(rhs.solutions_stored),
            deficits: self.deficits.saturating_sub(rhs.deficits),
            orchestration_rounds: self.orchestration_rounds.saturating_sub(rhs.orchestration_rounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_delta() {
        let counters = ProcessingCounters::default();
        counters.window_growths.fetch_add(2, Ordering::Relaxed);
        let before = counters.snapshot();
        counters.window_growths.fetch_add(3, Ordering::Relaxed);
        counters.deficits.fetch_add(1, Ordering::Relaxed);
        let delta = &counters.snapshot() - &before;
        assert_eq!(delta, ProcessingCountersSnapshot { window_growths: 3, deficits: 1, ..Default::default() });
    }
}

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every stage
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub(crate) admitted: AtomicU64,
    pub(crate) shed: AtomicU64,
    pub(crate) rejected_closed: AtomicU64,
    pub(crate) extracted: AtomicU64,
    pub(crate) aggregated: AtomicU64,
    pub(crate) deduplicated: AtomicU64,
    pub(crate) counter_failures: AtomicU64,
    pub(crate) ignored: AtomicU64,
    pub(crate) whitelisted: AtomicU64,
    pub(crate) persisted: AtomicU64,
    pub(crate) persist_failures: AtomicU64,
    pub(crate) associations: AtomicU64,
    pub(crate) association_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub shed: u64,
    pub rejected_closed: u64,
    pub extracted: u64,
    pub aggregated: u64,
    pub deduplicated: u64,
    pub counter_failures: u64,
    /// Drop decisions taken by the ignore stage
    pub ignored: u64,
    pub whitelisted: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub associations: u64,
    pub association_failures: u64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            admitted: load(&self.admitted),
            shed: load(&self.shed),
            rejected_closed: load(&self.rejected_closed),
            extracted: load(&self.extracted),
            aggregated: load(&self.aggregated),
            deduplicated: load(&self.deduplicated),
            counter_failures: load(&self.counter_failures),
            ignored: load(&self.ignored),
            whitelisted: load(&self.whitelisted),
            persisted: load(&self.persisted),
            persist_failures: load(&self.persist_failures),
            associations: load(&self.associations),
            association_failures: load(&self.association_failures),
        }
    }
}

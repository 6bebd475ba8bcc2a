//! Per-sender hit counters
//!
//! The aggregation stage counts keywords per `(area, sender)` and only lets
//! the first one of each window through.
//!
//! - [`memory`]: In-process store with INCR/EXPIRE semantics

pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use memory::MemoryCounterStore;

/// Counter store consumed by the aggregation stage
///
/// Both calls must be atomic per key and safe to call concurrently for
/// different keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the `(area, sender_id)` counter and return the new value
    async fn incr_area_sender(&self, area: &str, sender_id: i64) -> Result<i64>;

    /// Let the `(area, sender_id)` counter expire after `window`
    async fn expire_area_sender(&self, area: &str, sender_id: i64, window: Duration)
        -> Result<()>;
}

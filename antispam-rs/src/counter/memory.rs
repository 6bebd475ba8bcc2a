use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

use super::CounterStore;
use crate::error::Result;

#[derive(Debug, Clone)]
struct CounterEntry {
    count: i64,
    /// `None` until an expiry is set, like a fresh Redis key
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// In-memory expiring counters keyed by `area:sender_id`
pub struct MemoryCounterStore {
    entries: Arc<RwLock<HashMap<String, CounterEntry>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        MemoryCounterStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn key(area: &str, sender_id: i64) -> String {
        format!("{}:{}", area, sender_id)
    }

    /// Current value, `None` if absent or expired
    pub async fn get(&self, area: &str, sender_id: i64) -> Option<i64> {
        let entries = self.entries.read().await;
        entries
            .get(&Self::key(area, sender_id))
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.count)
    }

    /// Drop expired counters
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let initial_count = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        initial_count - entries.len()
    }

    pub async fn entry_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Run `cleanup_expired` every `period` until the store is dropped
    pub fn spawn_cleanup(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut timer = interval(period);
            // first tick completes immediately
            timer.tick().await;

            loop {
                timer.tick().await;

                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.cleanup_expired().await;
                if removed > 0 {
                    debug!("Evicted {} expired sender counters", removed);
                }
            }
        })
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_area_sender(&self, area: &str, sender_id: i64) -> Result<i64> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries
            .entry(Self::key(area, sender_id))
            .or_insert(CounterEntry {
                count: 0,
                expires_at: None,
            });

        if entry.is_expired(now) {
            entry.count = 0;
            entry.expires_at = None;
        }

        entry.count += 1;
        Ok(entry.count)
    }

    async fn expire_area_sender(
        &self,
        area: &str,
        sender_id: i64,
        window: Duration,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(&Self::key(area, sender_id)) {
            if !entry.is_expired(now) {
                entry.expires_at = Some(now + window);
            }
        }
        Ok(())
    }
}

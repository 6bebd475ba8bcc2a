//! Aggregation stage
//!
//! Only the first keyword per `(area, sender)` within the aggregation window
//! goes downstream. A counter store failure drops the keyword.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::stats::{bump, PipelineStats};
use crate::counter::CounterStore;
use crate::types::Keyword;

pub struct AggregateStage {
    counter: Arc<dyn CounterStore>,
    window: Duration,
    stats: Arc<PipelineStats>,
}

impl AggregateStage {
    pub fn new(counter: Arc<dyn CounterStore>, window: Duration, stats: Arc<PipelineStats>) -> Self {
        Self {
            counter,
            window,
            stats,
        }
    }

    pub fn spawn(
        self,
        mut input: mpsc::Receiver<Keyword>,
        tracker: &TaskTracker,
        chan_size: usize,
    ) -> mpsc::Receiver<Keyword> {
        let (tx, rx) = mpsc::channel(chan_size);

        tracker.spawn(async move {
            while let Some(keyword) = input.recv().await {
                if !self.admit(&keyword).await {
                    continue;
                }
                if tx.send(keyword).await.is_err() {
                    warn!("Ignore stage gone, stopping aggregation");
                    break;
                }
            }
            info!("Aggregate stage input closed");
        });

        rx
    }

    /// Count the keyword against its sender and decide whether it passes
    async fn admit(&self, keyword: &Keyword) -> bool {
        let count = match self
            .counter
            .incr_area_sender(&keyword.area, keyword.sender_id)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!(
                    "Failed to count keyword {:?} for sender {} in {}: {}",
                    keyword.content, keyword.sender_id, keyword.area, e
                );
                bump(&self.stats.counter_failures);
                return false;
            }
        };

        if let Err(e) = self
            .counter
            .expire_area_sender(&keyword.area, keyword.sender_id, self.window)
            .await
        {
            warn!(
                "Failed to set expiry for sender {} in {}: {}",
                keyword.sender_id, keyword.area, e
            );
        }

        if count == 1 {
            bump(&self.stats.aggregated);
            true
        } else {
            debug!(
                "Sender {} already reported in {} ({} hits), dropping {:?}",
                keyword.sender_id, keyword.area, count, keyword.content
            );
            bump(&self.stats.deduplicated);
            false
        }
    }
}

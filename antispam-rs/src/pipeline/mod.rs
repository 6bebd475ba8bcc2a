//! Keyword extraction pipeline
//!
//! # Architecture
//! ```text
//! submit ─▶ [Gate] ─▶ Extract ─▶ Aggregate ─▶ Ignore ─▶ Whitelist ─▶ Digest
//!                        │                      │                       │
//!                        └──── Limiter ─────────┘                 KeywordStore
//! ```
//!
//! Every arrow is a bounded queue. Each stage runs as one task tracked by a
//! single [`TaskTracker`]. Extract and Ignore spawn short-lived rule
//! evaluations per item and join them before taking the next item, so a full
//! queue stalls everything upstream of it down to the gate. Closing the gate
//! drains the pipeline: each stage ends when its input is exhausted, which
//! closes the next queue.

pub mod aggregate;
pub mod digest;
pub mod extract;
pub mod gate;
pub mod ignore;
pub mod limiter;
pub mod stats;
pub mod whitelist;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::PipelineConfig;
use crate::counter::CounterStore;
use crate::rules::RuleSource;
use crate::store::KeywordStore;
use crate::types::Keyword;

pub use aggregate::AggregateStage;
pub use digest::{Digest, DigestReport};
pub use extract::ExtractStage;
pub use gate::{Admission, IngressGate};
pub use ignore::IgnoreStage;
pub use limiter::{Limiter, LimiterPermit};
pub use stats::{PipelineStats, StatsSnapshot};
pub use whitelist::WhitelistStage;

/// External collaborators the pipeline calls into
#[derive(Clone)]
pub struct Services {
    pub rules: Arc<dyn RuleSource>,
    pub counter: Arc<dyn CounterStore>,
    pub store: Arc<dyn KeywordStore>,
}

/// A running pipeline
///
/// Stage workers start in [`Pipeline::spawn`]; the digest loop runs in
/// [`Pipeline::run`].
pub struct Pipeline {
    gate: IngressGate,
    output: mpsc::Receiver<Keyword>,
    digest: Digest,
    tracker: TaskTracker,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Wire the stages and start their workers. Must be called inside a
    /// Tokio runtime.
    pub fn spawn(config: &PipelineConfig, services: Services) -> Self {
        let chan_size = config.chan_size.max(1);
        let stats = Arc::new(PipelineStats::default());
        let tracker = TaskTracker::new();
        let limiter = Limiter::new(config.max_concurrency);

        let (tx, input) = mpsc::channel(chan_size);
        let gate = IngressGate::new(tx, Arc::clone(&stats));

        let extracted = ExtractStage::new(
            Arc::clone(&services.rules),
            limiter.clone(),
            config.min_keyword_len,
            Arc::clone(&stats),
        )
        .spawn(input, &tracker, chan_size);

        let aggregated = AggregateStage::new(
            Arc::clone(&services.counter),
            config.aggregation_window(),
            Arc::clone(&stats),
        )
        .spawn(extracted, &tracker, chan_size);

        let filtered = IgnoreStage::new(
            Arc::clone(&services.rules),
            limiter.clone(),
            config.min_keyword_len,
            Arc::clone(&stats),
        )
        .spawn(aggregated, &tracker, chan_size);

        let output = WhitelistStage::new(Arc::clone(&services.rules), Arc::clone(&stats))
            .spawn(filtered, &tracker, chan_size);

        info!(
            "Pipeline started (queue size: {}, max concurrency: {}, min keyword length: {}, window: {}s)",
            chan_size,
            limiter.capacity(),
            config.min_keyword_len,
            config.aggregation_window_secs
        );

        Self {
            gate,
            output,
            digest: Digest::new(Arc::clone(&services.store), Arc::clone(&stats)),
            tracker,
            stats,
        }
    }

    /// Handle for submitting content; clone freely
    pub fn gate(&self) -> IngressGate {
        self.gate.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Run the digest loop until the pipeline has drained.
    ///
    /// Returns once the gate is closed (or every [`IngressGate`] handle is
    /// dropped), every queued item has been processed and every spawned task
    /// has finished.
    pub async fn run(self) -> DigestReport {
        let Pipeline {
            gate,
            output,
            digest,
            tracker,
            stats,
        } = self;

        // Only handles held by callers keep ingress open now
        drop(gate);

        let report = digest.run(output).await;

        tracker.close();
        tracker.wait().await;

        info!("Pipeline stopped: {:?}", stats.snapshot());
        report
    }
}

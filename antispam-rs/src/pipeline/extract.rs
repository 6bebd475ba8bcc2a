//! Extraction stage
//!
//! Matches each item against the limit/restrict rules of its area. Every
//! rule is evaluated in its own task under a limiter permit, so one item can
//! yield several keywords, in no particular order. The worker waits for all
//! evaluations of an item before taking the next one, so a full downstream
//! queue stalls this stage too.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::limiter::Limiter;
use super::stats::{bump, PipelineStats};
use crate::rules::{Rule, RulePurpose, RuleSource};
use crate::types::{Keyword, Ugc};
use crate::utils::byte_len_below;

pub struct ExtractStage {
    rules: Arc<dyn RuleSource>,
    limiter: Limiter,
    min_keyword_len: usize,
    stats: Arc<PipelineStats>,
}

impl ExtractStage {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        limiter: Limiter,
        min_keyword_len: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            rules,
            limiter,
            min_keyword_len,
            stats,
        }
    }

    /// Start the stage worker; the returned queue closes once `input` is
    /// exhausted
    pub fn spawn(
        self,
        mut input: mpsc::Receiver<Ugc>,
        tracker: &TaskTracker,
        chan_size: usize,
    ) -> mpsc::Receiver<Keyword> {
        let (tx, rx) = mpsc::channel(chan_size);

        tracker.spawn(async move {
            while let Some(ugc) = input.recv().await {
                if !self.extract(ugc, &tx).await {
                    break;
                }
            }
            info!("Extract keyword stage input closed");
        });

        rx
    }

    /// Returns false when the stage should stop
    async fn extract(&self, ugc: Ugc, out: &mpsc::Sender<Keyword>) -> bool {
        let ugc = Arc::new(ugc);
        let mut evaluations = JoinSet::new();
        let mut running = true;

        for rule in self.rules.rules(&ugc.area, RulePurpose::LimitOrRestrict).await {
            debug!("Evaluating limit/restrict rule {} on ugc {}", rule, ugc.id);

            let permit = match self.limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Limiter unavailable, stopping extraction: {}", e);
                    running = false;
                    break;
                }
            };

            let ugc = Arc::clone(&ugc);
            let out = out.clone();
            let stats = Arc::clone(&self.stats);
            let min_keyword_len = self.min_keyword_len;

            evaluations.spawn(async move {
                let keyword = {
                    let _permit = permit;
                    extract_hit(&rule, &ugc, min_keyword_len)
                };

                if let Some(keyword) = keyword {
                    bump(&stats.extracted);
                    if out.send(keyword).await.is_err() {
                        debug!("Aggregation stage gone, keyword from ugc {} lost", ugc.id);
                    }
                }
            });
        }

        while let Some(result) = evaluations.join_next().await {
            if let Err(e) = result {
                warn!("Extraction task for ugc {} failed: {}", ugc.id, e);
            }
        }

        running
    }
}

/// Keyword produced by `rule` on `ugc`, if any
pub(crate) fn extract_hit(rule: &Rule, ugc: &Ugc, min_keyword_len: usize) -> Option<Keyword> {
    let tag = rule.operation.extraction_tag()?;
    let hit = rule.find(&ugc.content)?.trim();

    if hit.is_empty() || byte_len_below(hit, min_keyword_len) {
        return None;
    }

    Some(Keyword::from_hit(ugc, hit, &rule.name, tag))
}

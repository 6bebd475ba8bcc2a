//! Whitelist stage: re-tags, never drops

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::stats::{bump, PipelineStats};
use crate::rules::{RulePurpose, RuleSource};
use crate::types::Keyword;

pub struct WhitelistStage {
    rules: Arc<dyn RuleSource>,
    stats: Arc<PipelineStats>,
}

impl WhitelistStage {
    pub fn new(rules: Arc<dyn RuleSource>, stats: Arc<PipelineStats>) -> Self {
        Self { rules, stats }
    }

    pub fn spawn(
        self,
        mut input: mpsc::Receiver<Keyword>,
        tracker: &TaskTracker,
        chan_size: usize,
    ) -> mpsc::Receiver<Keyword> {
        let (tx, rx) = mpsc::channel(chan_size);

        tracker.spawn(async move {
            while let Some(mut keyword) = input.recv().await {
                self.classify(&mut keyword).await;
                if tx.send(keyword).await.is_err() {
                    warn!("Digest gone, stopping whitelist stage");
                    break;
                }
            }
            info!("Exclude whitelist stage input closed");
        });

        rx
    }

    /// First matching whitelist rule wins
    pub async fn classify(&self, keyword: &mut Keyword) {
        for rule in self.rules.rules(&keyword.area, RulePurpose::Whitelist).await {
            debug!("Evaluating whitelist rule {} on {:?}", rule, keyword.content);
            if rule.find(&keyword.content).is_some() {
                info!("Keyword {:?} matches whitelist rule {}", keyword.content, rule.name);
                keyword.mark_white(&rule.name);
                bump(&self.stats.whitelisted);
                return;
            }
        }
    }
}

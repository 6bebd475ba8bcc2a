//! Ignore stage
//!
//! Drops keywords that are too short or made of one repeated character,
//! then runs the area's ignore rules. Each ignore rule is evaluated in its
//! own task: a match drops that path, a miss forwards the keyword. With
//! several ignore rules and no match the keyword is forwarded once per rule.
//! The worker waits for every evaluation of a keyword before taking the next.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::limiter::Limiter;
use super::stats::{bump, PipelineStats};
use crate::rules::{RulePurpose, RuleSource};
use crate::types::Keyword;
use crate::utils::{byte_len_below, same_char};

pub struct IgnoreStage {
    rules: Arc<dyn RuleSource>,
    limiter: Limiter,
    min_keyword_len: usize,
    stats: Arc<PipelineStats>,
}

impl IgnoreStage {
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

    pub fn spawn(
        self,
        mut input: mpsc::Receiver<Keyword>,
        tracker: &TaskTracker,
        chan_size: usize,
    ) -> mpsc::Receiver<Keyword> {
        let (tx, rx) = mpsc::channel(chan_size);

        tracker.spawn(async move {
            while let Some(keyword) = input.recv().await {
                if !self.ignore(keyword, &tx).await {
                    break;
                }
            }
            info!("Ignore stage input closed");
        });

        rx
    }

    /// Returns false when the stage should stop
    async fn ignore(&self, keyword: Keyword, out: &mpsc::Sender<Keyword>) -> bool {
        if byte_len_below(&keyword.content, self.min_keyword_len) {
            warn!(
                "Keyword {:?} shorter than {} bytes, ignored",
                keyword.content, self.min_keyword_len
            );
            bump(&self.stats.ignored);
            return true;
        }

        if same_char(&keyword.content) {
            warn!(
                "Keyword {:?} consists of repeated chars, ignored",
                keyword.content
            );
            bump(&self.stats.ignored);
            return true;
        }

        let rules = self.rules.rules(&keyword.area, RulePurpose::Ignore).await;

        // Nothing below would emit the keyword
        if rules.is_empty() {
            if out.send(keyword).await.is_err() {
                warn!("Whitelist stage gone, stopping ignore stage");
                return false;
            }
            return true;
        }

        let keyword = Arc::new(keyword);
        let mut evaluations = JoinSet::new();
        let mut running = true;
        for rule in rules {
            debug!("Evaluating ignore rule {} on {:?}", rule, keyword.content);

            let permit = match self.limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Limiter unavailable, stopping ignore stage: {}", e);
                    running = false;
                    break;
                }
            };

            let keyword = Arc::clone(&keyword);
            let out = out.clone();
            let stats = Arc::clone(&self.stats);

            evaluations.spawn(async move {
                let hit = {
                    let _permit = permit;
                    rule.find(&keyword.content).is_some()
                };

                if hit {
                    warn!("Keyword {:?} hit ignore rule {}", keyword.content, rule);
                    bump(&stats.ignored);
                    return;
                }

                if out.send(Keyword::clone(&keyword)).await.is_err() {
                    debug!("Whitelist stage gone, keyword {:?} lost", keyword.content);
                }
            });
        }

        while let Some(result) = evaluations.join_next().await {
            if let Err(e) = result {
                warn!("Ignore task for {:?} failed: {}", keyword.content, e);
            }
        }

        running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Operation, Rule, RuleBook};
    use crate::types::{KeywordTag, Ugc};

    fn keyword(content: &str) -> Keyword {
        let ugc = Ugc::new(1, 1, 42, "comment", format!("text {}", content));
        Keyword::from_hit(&ugc, content, "spam", KeywordTag::DefaultLimit)
    }

    async fn run_stage(book: RuleBook, keywords: Vec<Keyword>) -> (Vec<Keyword>, Arc<PipelineStats>) {
        let stats = Arc::new(PipelineStats::default());
        let stage = IgnoreStage::new(Arc::new(book), Limiter::new(2), 5, Arc::clone(&stats));
        let tracker = TaskTracker::new();
        let (tx, input) = mpsc::channel(keywords.len().max(1));
        let mut output = stage.spawn(input, &tracker, 16);

        for keyword in keywords {
            tx.send(keyword).await.unwrap();
        }
        drop(tx);

        let mut forwarded = Vec::new();
        while let Some(keyword) = output.recv().await {
            forwarded.push(keyword);
        }
        tracker.close();
        tracker.wait().await;
        (forwarded, stats)
    }

    #[tokio::test]
    async fn test_no_ignore_rules_forwards() {
        let (forwarded, _) = run_stage(RuleBook::new(), vec![keyword("cheap followers")]).await;
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].content, "cheap followers");
    }

    #[tokio::test]
    async fn test_repeated_chars_dropped_regardless_of_rules() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("never", "comment", Operation::Ignore, "^nomatch$").unwrap())
            .await;

        let (forwarded, stats) = run_stage(book, vec![keyword("zzzzzzzz")]).await;
        assert!(forwarded.is_empty());
        assert_eq!(stats.snapshot().ignored, 1);

        let (forwarded, _) = run_stage(RuleBook::new(), vec![keyword("aaaaa")]).await;
        assert!(forwarded.is_empty());
    }

    #[tokio::test]
    async fn test_short_keyword_dropped() {
        let (forwarded, stats) = run_stage(RuleBook::new(), vec![keyword("abc")]).await;
        assert!(forwarded.is_empty());
        assert_eq!(stats.snapshot().ignored, 1);
    }

    #[tokio::test]
    async fn test_matching_ignore_rule_drops() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("greeting", "comment", Operation::Ignore, "^hello").unwrap())
            .await;

        let (forwarded, _) = run_stage(book, vec![keyword("hello world")]).await;
        assert!(forwarded.is_empty());
    }

    #[tokio::test]
    async fn test_ignore_rules_of_other_area_do_not_apply() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("greeting", "danmaku", Operation::Ignore, "^hello").unwrap())
            .await;

        let (forwarded, _) = run_stage(book, vec![keyword("hello world")]).await;
        assert_eq!(forwarded.len(), 1);
    }

    #[tokio::test]
    async fn test_forwarded_once_per_non_matching_rule() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("a", "comment", Operation::Ignore, "^nope").unwrap())
            .await;
        book.add_rule(Rule::new("b", "comment", Operation::Ignore, "^never").unwrap())
            .await;

        let (forwarded, _) = run_stage(book, vec![keyword("cheap followers")]).await;
        assert_eq!(forwarded.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_rules_forward_non_matching_paths() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("hit", "comment", Operation::Ignore, "cheap").unwrap())
            .await;
        book.add_rule(Rule::new("miss", "comment", Operation::Ignore, "^never").unwrap())
            .await;

        let (forwarded, stats) = run_stage(book, vec![keyword("cheap followers")]).await;
        assert_eq!(forwarded.len(), 1);
        assert_eq!(stats.snapshot().ignored, 1);
    }

    #[tokio::test]
    async fn test_full_output_stalls_input() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("never", "comment", Operation::Ignore, "^never").unwrap())
            .await;

        let stage = IgnoreStage::new(
            Arc::new(book),
            Limiter::new(4),
            5,
            Arc::new(PipelineStats::default()),
        );
        let tracker = TaskTracker::new();
        let (tx, input) = mpsc::channel(1);
        let output = stage.spawn(input, &tracker, 1);

        let mut accepted = 0;
        let mut refused = 0;
        for _ in 0..200 {
            match tx.try_send(keyword("cheap followers")) {
                Ok(()) => accepted += 1,
                Err(_) => refused += 1,
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        assert!(accepted <= 3, "accepted {}", accepted);
        assert!(refused > 0);

        drop(output);
        drop(tx);
        tracker.close();
        tracker.wait().await;
    }
}

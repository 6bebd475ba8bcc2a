//! Digest: terminal, sequential consumer of classified keywords
//!
//! Persists every keyword and, for non-white keywords from a real sender,
//! the sender association. Failures are logged and the loop moves on.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::stats::{bump, PipelineStats};
use crate::store::KeywordStore;
use crate::types::Keyword;

/// What the digest loop did before its input closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub persisted: u64,
    pub associations: u64,
    pub persist_failures: u64,
    pub association_failures: u64,
}

pub struct Digest {
    store: Arc<dyn KeywordStore>,
    stats: Arc<PipelineStats>,
}

impl Digest {
    pub fn new(store: Arc<dyn KeywordStore>, stats: Arc<PipelineStats>) -> Self {
        Self { store, stats }
    }

    /// Drain `input` until every upstream sender is gone
    pub async fn run(&self, mut input: mpsc::Receiver<Keyword>) -> DigestReport {
        let mut report = DigestReport::default();

        while let Some(keyword) = input.recv().await {
            info!(
                "Catch keyword {:?} (area: {}, sender: {}, tag: {})",
                keyword.content, keyword.area, keyword.sender_id, keyword.tag
            );
            self.digest(&keyword, &mut report).await;
        }

        info!("Digest input closed");
        report
    }

    async fn digest(&self, keyword: &Keyword, report: &mut DigestReport) {
        let persisted = match self.store.persist_keyword(keyword).await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!("Failed to persist keyword {:?}: {}", keyword.content, e);
                report.persist_failures += 1;
                bump(&self.stats.persist_failures);
                return;
            }
        };

        let Some(id) = persisted.id else {
            error!("Keyword store returned {:?} without an id", keyword.content);
            report.persist_failures += 1;
            bump(&self.stats.persist_failures);
            return;
        };

        report.persisted += 1;
        bump(&self.stats.persisted);

        if persisted.is_white() || keyword.sender_id <= 0 {
            return;
        }

        match self
            .store
            .persist_sender_association(id, keyword.sender_id)
            .await
        {
            Ok(()) => {
                report.associations += 1;
                bump(&self.stats.associations);
            }
            Err(e) => {
                error!(
                    "Failed to persist sender {} for keyword {}: {}",
                    keyword.sender_id, id, e
                );
                report.association_failures += 1;
                bump(&self.stats.association_failures);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AntispamError;
    use crate::store::MockKeywordStore;
    use crate::types::{KeywordTag, Ugc};
    use mockall::predicate::eq;

    fn keyword(content: &str, sender_id: i64, tag: KeywordTag) -> Keyword {
        let ugc = Ugc::new(1, 1, sender_id, "comment", content);
        Keyword::from_hit(&ugc, content, "spam", tag)
    }

    fn with_id(keyword: &Keyword, id: i64) -> Keyword {
        Keyword {
            id: Some(id),
            ..keyword.clone()
        }
    }

    async fn run_digest(store: MockKeywordStore, keywords: Vec<Keyword>) -> DigestReport {
        let digest = Digest::new(Arc::new(store), Arc::new(PipelineStats::default()));
        let (tx, rx) = mpsc::channel(keywords.len().max(1));
        for keyword in keywords {
            tx.send(keyword).await.unwrap();
        }
        drop(tx);
        digest.run(rx).await
    }

    #[tokio::test]
    async fn test_persists_keyword_and_sender() {
        let mut store = MockKeywordStore::new();
        store
            .expect_persist_keyword()
            .times(1)
            .returning(|k| Ok(with_id(k, 10)));
        store
            .expect_persist_sender_association()
            .with(eq(10), eq(42))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = run_digest(store, vec![keyword("cheap followers", 42, KeywordTag::DefaultLimit)]).await;
        assert_eq!(report.persisted, 1);
        assert_eq!(report.associations, 1);
    }

    #[tokio::test]
    async fn test_white_keyword_has_no_sender_association() {
        let mut store = MockKeywordStore::new();
        store.expect_persist_keyword().returning(|k| Ok(with_id(k, 10)));
        store.expect_persist_sender_association().never();

        let mut white = keyword("official store", 42, KeywordTag::DefaultLimit);
        white.mark_white("partner");

        let report = run_digest(store, vec![white]).await;
        assert_eq!(report.persisted, 1);
        assert_eq!(report.associations, 0);
    }

    #[tokio::test]
    async fn test_stored_white_tag_wins() {
        let mut store = MockKeywordStore::new();
        store.expect_persist_keyword().returning(|k| {
            let mut stored = with_id(k, 10);
            stored.mark_white("partner");
            Ok(stored)
        });
        store.expect_persist_sender_association().never();

        let report = run_digest(store, vec![keyword("official store", 42, KeywordTag::DefaultLimit)]).await;
        assert_eq!(report.associations, 0);
    }

    #[tokio::test]
    async fn test_anonymous_sender_has_no_association() {
        let mut store = MockKeywordStore::new();
        store.expect_persist_keyword().returning(|k| Ok(with_id(k, 10)));
        store.expect_persist_sender_association().never();

        let report = run_digest(store, vec![keyword("cheap followers", 0, KeywordTag::DefaultLimit)]).await;
        assert_eq!(report.persisted, 1);
    }

    #[tokio::test]
    async fn test_persist_failure_moves_on() {
        let mut store = MockKeywordStore::new();
        store
            .expect_persist_keyword()
            .with(mockall::predicate::function(|k: &Keyword| k.content == "broken keyword"))
            .returning(|_| Err(AntispamError::Persistence("disk full".to_string())));
        store
            .expect_persist_keyword()
            .with(mockall::predicate::function(|k: &Keyword| k.content == "cheap followers"))
            .returning(|k| Ok(with_id(k, 11)));
        store
            .expect_persist_sender_association()
            .with(eq(11), eq(7))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = run_digest(
            store,
            vec![
                keyword("broken keyword", 42, KeywordTag::DefaultLimit),
                keyword("cheap followers", 7, KeywordTag::DefaultLimit),
            ],
        )
        .await;

        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.associations, 1);
    }

    #[tokio::test]
    async fn test_association_failure_keeps_keyword() {
        let mut store = MockKeywordStore::new();
        store.expect_persist_keyword().returning(|k| Ok(with_id(k, 10)));
        store
            .expect_persist_sender_association()
            .returning(|_, _| Err(AntispamError::Persistence("locked".to_string())));

        let report = run_digest(
            store,
            vec![
                keyword("cheap followers", 42, KeywordTag::DefaultLimit),
                keyword("free coins now", 43, KeywordTag::RestrictLimit),
            ],
        )
        .await;

        assert_eq!(report.persisted, 2);
        assert_eq!(report.association_failures, 2);
    }

    #[tokio::test]
    async fn test_missing_id_counts_as_failure() {
        let mut store = MockKeywordStore::new();
        store.expect_persist_keyword().returning(|k| Ok(k.clone()));
        store.expect_persist_sender_association().never();

        let report = run_digest(store, vec![keyword("cheap followers", 42, KeywordTag::DefaultLimit)]).await;
        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.persisted, 0);
    }
}

//! Keyword persistence
//!
//! - [`sqlite`]: SQLite-backed keyword store

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Keyword;

pub use sqlite::SqliteKeywordStore;

/// Persistence sink consumed by the digest stage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Store `keyword` and return the stored record with its assigned ID
    async fn persist_keyword(&self, keyword: &Keyword) -> Result<Keyword>;

    /// Record that `sender_id` produced the keyword `keyword_id`
    async fn persist_sender_association(&self, keyword_id: i64, sender_id: i64) -> Result<()>;
}

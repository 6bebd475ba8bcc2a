//! SQLite keyword store
//!
//! Keywords are unique per `(area, content)`: persisting a known keyword
//! bumps its hit count instead of inserting a new row. A keyword stored as
//! white stays white.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

use super::KeywordStore;
use crate::error::{AntispamError, Result};
use crate::types::{Keyword, KeywordTag};

type KeywordRow = (i64, String, String, String, i64, String, String, String);

const SELECT_KEYWORD: &str = "SELECT id, area, content, origin_content, sender_id, regexp_name, tag, ctime FROM keywords";

/// Keyword store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteKeywordStore {
    db: SqlitePool,
}

impl SqliteKeywordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open `database_url`, creating the database file when missing
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self::new(db))
    }

    /// Private in-memory database, one connection so every query sees it
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(db))
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS keywords (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                area TEXT NOT NULL,
                content TEXT NOT NULL,
                origin_content TEXT NOT NULL,
                sender_id INTEGER NOT NULL,
                regexp_name TEXT NOT NULL,
                tag TEXT NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 1,
                ctime TEXT NOT NULL,
                mtime TEXT NOT NULL,
                UNIQUE (area, content)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS keyword_sender_ids (
                keyword_id INTEGER NOT NULL,
                sender_id INTEGER NOT NULL,
                ctime TEXT NOT NULL,
                PRIMARY KEY (keyword_id, sender_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get a keyword by ID
    pub async fn get_keyword(&self, id: i64) -> Result<Option<Keyword>> {
        let row = sqlx::query_as::<_, KeywordRow>(&format!("{} WHERE id = ?", SELECT_KEYWORD))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(keyword_from_row).transpose()
    }

    /// List keywords of an area, oldest first
    pub async fn list_keywords(&self, area: &str) -> Result<Vec<Keyword>> {
        let rows = sqlx::query_as::<_, KeywordRow>(&format!(
            "{} WHERE area = ? ORDER BY id ASC",
            SELECT_KEYWORD
        ))
        .bind(area)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(keyword_from_row).collect()
    }

    /// Number of times a keyword has been persisted
    pub async fn hit_count(&self, id: i64) -> Result<Option<i64>> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT hit_count FROM keywords WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|(count,)| count))
    }

    /// Senders associated with a keyword
    pub async fn sender_ids(&self, keyword_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT sender_id FROM keyword_sender_ids WHERE keyword_id = ? ORDER BY sender_id",
        )
        .bind(keyword_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|(sender_id,)| sender_id).collect())
    }
}

fn keyword_from_row(row: KeywordRow) -> Result<Keyword> {
    let (id, area, content, origin_content, sender_id, regexp_name, tag, ctime) = row;

    let tag = KeywordTag::parse(&tag)
        .ok_or_else(|| AntispamError::Persistence(format!("unknown keyword tag: {}", tag)))?;
    let ctime = DateTime::parse_from_rfc3339(&ctime)
        .map_err(|e| AntispamError::Persistence(e.to_string()))?
        .with_timezone(&Utc);

    Ok(Keyword {
        id: Some(id),
        content,
        origin_content,
        sender_id,
        area,
        regexp_name,
        tag,
        ctime,
    })
}

#[async_trait]
impl KeywordStore for SqliteKeywordStore {
    async fn persist_keyword(&self, keyword: &Keyword) -> Result<Keyword> {
        sqlx::query(
            r#"
            INSERT INTO keywords (
                area, content, origin_content, sender_id, regexp_name,
                tag, hit_count, ctime, mtime
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT (area, content) DO UPDATE SET
                hit_count = keywords.hit_count + 1,
                origin_content = excluded.origin_content,
                sender_id = excluded.sender_id,
                regexp_name = CASE WHEN keywords.tag = 'white'
                    THEN keywords.regexp_name ELSE excluded.regexp_name END,
                tag = CASE WHEN keywords.tag = 'white'
                    THEN keywords.tag ELSE excluded.tag END,
                mtime = excluded.mtime
            "#,
        )
        .bind(&keyword.area)
        .bind(&keyword.content)
        .bind(&keyword.origin_content)
        .bind(keyword.sender_id)
        .bind(&keyword.regexp_name)
        .bind(keyword.tag.as_str())
        .bind(keyword.ctime.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        let row = sqlx::query_as::<_, KeywordRow>(&format!(
            "{} WHERE area = ? AND content = ?",
            SELECT_KEYWORD
        ))
        .bind(&keyword.area)
        .bind(&keyword.content)
        .fetch_one(&self.db)
        .await?;

        let stored = keyword_from_row(row)?;
        debug!("Persisted keyword {:?} as id {:?}", stored.content, stored.id);
        Ok(stored)
    }

    async fn persist_sender_association(&self, keyword_id: i64, sender_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO keyword_sender_ids (keyword_id, sender_id, ctime) VALUES (?, ?, ?)",
        )
        .bind(keyword_id)
        .bind(sender_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

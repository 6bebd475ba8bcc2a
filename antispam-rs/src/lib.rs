//! antispam-rs: keyword extraction and spam classification for UGC
//!
//! Screens user-generated content for abusive or restricted terms before it
//! is persisted. Content enters through a non-blocking gate, is matched
//! against per-area regex rules, deduplicated per sender, filtered, tagged
//! and finally handed to a keyword store.
//!
//! # Example
//!
//! ```no_run
//! use antispam_rs::config::Config;
//! use antispam_rs::counter::MemoryCounterStore;
//! use antispam_rs::pipeline::{Pipeline, Services};
//! use antispam_rs::rules::RuleBook;
//! use antispam_rs::store::SqliteKeywordStore;
//! use antispam_rs::types::Ugc;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("antispam.toml")?;
//!     let store = SqliteKeywordStore::connect(&config.storage.database_url).await?;
//!     store.init_db().await?;
//!
//!     let pipeline = Pipeline::spawn(
//!         &config.pipeline,
//!         Services {
//!             rules: Arc::new(RuleBook::from_definitions(&config.rules)?),
//!             counter: Arc::new(MemoryCounterStore::new()),
//!             store: Arc::new(store),
//!         },
//!     );
//!
//!     let gate = pipeline.gate();
//!     gate.submit(Ugc::new(1, 1, 42, "comment", "buy cheap followers now"));
//!     gate.close();
//!
//!     let report = pipeline.run().await;
//!     println!("persisted {} keywords", report.persisted);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`pipeline`]: Gate, limiter, stages and digest
//! - [`rules`]: Classification rules and rule lookup
//! - [`counter`]: Per-sender counters used for aggregation
//! - [`store`]: Keyword persistence
//! - [`types`]: Content and keyword records

pub mod config;
pub mod counter;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod rules;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AntispamError, Result};
pub use pipeline::{Admission, IngressGate, Pipeline, Services};
pub use types::{Keyword, KeywordTag, Ugc};

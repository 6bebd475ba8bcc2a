//! Host process for the keyword pipeline
//!
//! Reads one JSON-encoded UGC item per line from stdin and feeds it through
//! the pipeline. Stops on EOF or Ctrl-C once everything in flight is stored.
//!
//! ```bash
//! echo '{"id":1,"sender_id":42,"area":"comment","content":"buy cheap followers now"}' \
//!     | antispam-rs --config antispam.toml
//! ```

use antispam_rs::config::Config;
use antispam_rs::counter::MemoryCounterStore;
use antispam_rs::logging;
use antispam_rs::pipeline::{Admission, IngressGate, Pipeline, Services};
use antispam_rs::rules::RuleBook;
use antispam_rs::store::SqliteKeywordStore;
use antispam_rs::types::Ugc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "antispam-rs")]
#[command(about = "Screen user-generated content for restricted keywords", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, overrides storage.database_url
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(url) = cli.database_url {
        config.storage.database_url = url;
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting antispam-rs");
    info!("  Rules loaded: {}", config.rules.len());
    info!("  Database: {}", config.storage.database_url);

    let rules = RuleBook::from_definitions(&config.rules)?;
    let store = SqliteKeywordStore::connect(&config.storage.database_url).await?;
    store.init_db().await?;

    let counter = Arc::new(MemoryCounterStore::new());
    let cleanup = counter.spawn_cleanup(config.storage.counter_cleanup_interval());

    let pipeline = Pipeline::spawn(
        &config.pipeline,
        Services {
            rules: Arc::new(rules),
            counter: counter.clone(),
            store: Arc::new(store),
        },
    );
    let gate = pipeline.gate();
    let stats = pipeline.stats();
    let digest = tokio::spawn(pipeline.run());

    tokio::select! {
        result = feed_stdin(&gate) => {
            if let Err(e) = result {
                error!("Failed to read stdin: {}", e);
            }
            info!("Input exhausted, draining pipeline");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, draining pipeline");
        }
    }

    gate.close();
    let report = digest.await?;
    cleanup.abort();

    info!("Digest report: {:?}", report);
    info!("Pipeline stats: {}", serde_json::to_string(&stats.snapshot())?);

    Ok(())
}

async fn feed_stdin(gate: &IngressGate) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let ugc: Ugc = match serde_json::from_str(line) {
            Ok(ugc) => ugc,
            Err(e) => {
                warn!("Skipping malformed line: {}", e);
                continue;
            }
        };

        if gate.submit(ugc) == Admission::Closed {
            break;
        }
    }

    Ok(())
}

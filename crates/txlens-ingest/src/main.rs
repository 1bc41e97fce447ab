//! CLI entry point for the txlens ingestion service.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use txlens_graph::{GraphConfig, GraphStore, MemoryStore, Neo4jStore};

use txlens_ingest::config::IngestConfig;
use txlens_ingest::source::{load_edges, load_transactions};
use txlens_ingest::supervisor::IngestionSupervisor;
use txlens_ingest::TokioClock;

#[derive(Parser)]
#[command(name = "txlens-ingest")]
#[command(about = "Streaming ingestion for the txlens transaction graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: txlens).
    #[arg(short, long, default_value = "txlens")]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run ingestion, resuming from the checkpoint if one exists.
    Run {
        /// JSONL file of transaction records.
        #[arg(long)]
        nodes: PathBuf,

        /// JSONL file of edge records.
        #[arg(long)]
        edges: PathBuf,

        /// Use the in-memory store instead of Neo4j (dry runs).
        #[arg(long)]
        memory: bool,
    },
    /// Print the persisted checkpoint, if any.
    Status,
    /// Drop the checkpoint and start over from step 1 on the next run.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let ingest_config = load_ingest_config(&cli.config)?;

    match cli.command {
        Command::Run { nodes, edges, memory } => {
            let store: Arc<dyn GraphStore> = if memory {
                Arc::new(MemoryStore::new())
            } else {
                let graph_config = load_graph_config(&cli.config);
                Arc::new(Neo4jStore::connect(&graph_config).await?)
            };

            let node_records = load_transactions(&nodes)?;
            let edge_records = load_edges(&edges)?;

            let supervisor =
                IngestionSupervisor::new(store, Arc::new(TokioClock), ingest_config)?;

            // Ctrl-C asks the run to stop at the next step boundary; the
            // checkpoint keeps everything written so far.
            let stats = supervisor.stats();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received; stopping at the next step boundary");
                    stats.request_cancel();
                }
            });

            let state = supervisor.start(node_records, edge_records).await?;
            let report = serde_json::json!({
                "state": state,
                "dataset_version": supervisor.dataset_version(),
                "stats": supervisor.stats().snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => {
            let store = txlens_ingest::CheckpointStore::new(&ingest_config.checkpoint_path);
            match store.load()? {
                Some(cp) => println!("{}", serde_json::to_string_pretty(&cp)?),
                None => println!("{}", serde_json::json!({ "checkpoint": null })),
            }
        }
        Command::Reset => {
            let store = txlens_ingest::CheckpointStore::new(&ingest_config.checkpoint_path);
            store.clear()?;
            tracing::info!("Checkpoint cleared");
        }
    }

    Ok(())
}

fn load_ingest_config(file_prefix: &str) -> anyhow::Result<IngestConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("TXLENS_INGEST")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Only a genuinely absent [ingest] section falls back to defaults;
    // a malformed one is a hard error.
    match cfg.get::<IngestConfig>("ingest") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(IngestConfig::default()),
        Err(e) => Err(e.into()),
    }
}


fn load_graph_config(file_prefix: &str) -> GraphConfig {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("TXLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    match cfg {
        Ok(c) => GraphConfig {
            uri: c
                .get_string("neo4j.uri")
                .unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            user: c
                .get_string("neo4j.user")
                .unwrap_or_else(|_| "neo4j".to_string()),
            password: c
                .get_string("neo4j.password")
                .unwrap_or_else(|_| "txlens-dev".to_string()),
            ..Default::default()
        },
        Err(_) => GraphConfig::default(),
    }
}

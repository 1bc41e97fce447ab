//! CLI entry point for the txlens query catalog.
//!
//! Runs a single named query against the graph and writes the result
//! rows as JSON to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use txlens_graph::{GraphConfig, Neo4jStore, QueryParams};
use txlens_query::QueryCatalog;

#[derive(Parser)]
#[command(name = "txlens-query")]
#[command(about = "Named queries over the txlens transaction graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: txlens).
    #[arg(short, long, default_value = "txlens", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a named query.
    Run {
        /// Query name, e.g. count-by-class or hub-detection.
        name: String,

        /// Query parameter as key=value; repeatable.
        /// Values parse as JSON first, then fall back to plain strings.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// List the queries the catalog answers to.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { name, params } => {
            let params = parse_params(&params)?;
            let graph_config = load_graph_config(&cli.config);
            let store = Neo4jStore::connect(&graph_config).await?;
            let catalog = QueryCatalog::new(Arc::new(store), 4);

            let rows = catalog.run(&name, params).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::List => {
            for name in QueryCatalog::names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn parse_params(raw: &[String]) -> anyhow::Result<QueryParams> {
    let mut params = QueryParams::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid parameter `{item}`; expected key=value"))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
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

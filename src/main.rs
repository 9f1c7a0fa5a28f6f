//! modgraph command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use modgraph::api;
use modgraph::catalog::EntityCatalog;
use modgraph::config::Config;
use modgraph::error::{GraphError, Result};
use modgraph::graph::store::GraphBackend;
use modgraph::graph::traversal::TraversalEngine;
use modgraph::observability::init_logging;
use modgraph::types::{Direction, Entity, EntityId, Relation};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "modgraph", version, about = "Module and model dependency graph engine")]
struct Cli {
    /// Config file (defaults to the per-user location).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend database path (overrides the config).
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a JSON dump of entities and relations into the backend.
    Load {
        /// Dump file with `{"entities": [...], "relations": [...]}`.
        file: PathBuf,
    },

    /// Run one traversal and print the resulting subgraph as JSON.
    Traverse {
        /// Seed entity ids (repeatable).
        #[arg(long = "seed", required = true)]
        seeds: Vec<EntityId>,

        /// Walk incoming relations instead of outgoing ones.
        #[arg(long)]
        reverse: bool,

        /// Depth bound; omit for unbounded.
        #[arg(long)]
        max_depth: Option<u32>,

        /// Stop expanding past installed modules.
        #[arg(long)]
        stop_installed: bool,

        /// Stop expanding past entities in this category (repeatable).
        #[arg(long = "stop-category")]
        stop_categories: Vec<i64>,

        /// Stop expanding past non-custom entities.
        #[arg(long)]
        stop_non_custom: bool,
    },

    /// Print backend row counts.
    Stats,

    /// Serve the JSON HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

// ---------------------------------------------------------------------------
// Dump format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Dump {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    relations: Vec<Relation>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    match cli.command {
        Command::Load { file } => cmd_load(&config, &file),
        Command::Traverse {
            seeds,
            reverse,
            max_depth,
            stop_installed,
            stop_categories,
            stop_non_custom,
        } => cmd_traverse(
            &config,
            &seeds,
            reverse,
            max_depth,
            stop_installed,
            &stop_categories,
            stop_non_custom,
        ),
        Command::Stats => cmd_stats(&config),
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .map_err(|e| GraphError::Config(format!("invalid listen address: {e}")))?;
            api::run_server(&config, addr).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_load(config: &Config, file: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let dump: Dump = serde_json::from_str(&raw)?;

    let mut backend = GraphBackend::new(&config.database.path)?;
    backend.upsert_entities(&dump.entities)?;
    backend.insert_relations(&dump.relations)?;

    tracing::info!(
        entities = dump.entities.len(),
        relations = dump.relations.len(),
        "dump loaded"
    );
    println!(
        "loaded {} entities and {} relations into {}",
        dump.entities.len(),
        dump.relations.len(),
        config.database.path
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_traverse(
    config: &Config,
    seeds: &[EntityId],
    reverse: bool,
    max_depth: Option<u32>,
    stop_installed: bool,
    stop_categories: &[i64],
    stop_non_custom: bool,
) -> Result<()> {
    let backend = GraphBackend::new(&config.database.path)?;
    let catalog = EntityCatalog::load(&backend)?;

    // CLI flags layer on top of the configured defaults.
    let mut options = config.traversal.stop_conditions();
    if max_depth.is_some() {
        options.max_depth = max_depth;
    }
    if stop_installed {
        options = options.stop_on_installed();
    }
    for &category in stop_categories {
        options = options.stop_on_category(category);
    }
    if stop_non_custom {
        options = options.stop_on_non_custom();
    }

    let direction = if reverse {
        Direction::Reverse
    } else {
        Direction::Forward
    };

    let engine = TraversalEngine::new(&catalog, &backend);
    let result = engine.traverse(seeds, direction, &options)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let backend = GraphBackend::new(&config.database.path)?;
    let stats = backend.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

//! Agent Hub operator tool
//!
//! ## Usage
//!
//! ```bash
//! # Create the storage directory, schema and a default config file
//! agent-hub init
//!
//! # Use a different storage directory
//! agent-hub --storage-dir /data/hub init
//!
//! # Seed a community
//! agent-hub create-community --name rust --description "Systems talk"
//!
//! # Leaderboards and row counts
//! agent-hub leaderboard points --limit 10
//! agent-hub stats
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent_hub::services::spawn_logging_listener;
use agent_hub::{Config, HubDb, HubError, Services};

#[derive(Parser, Debug)]
#[command(name = "agent-hub")]
#[command(about = "Operator tool for the agent hub database")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "AGENT_HUB_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "AGENT_HUB_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create storage directory, schema and default config
    Init,

    /// Create a community
    CreateCommunity {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Print a leaderboard as JSON
    Leaderboard {
        #[arg(value_enum)]
        board: Board,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Print row counts as JSON
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Board {
    Points,
    Followers,
    Posts,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .map_err(|e| HubError::Config(format!("{}: {}", path.display(), e)))?,
        None => {
            let default_path = Config::default().config_path();
            if default_path.exists() {
                Config::load(&default_path)
                    .map_err(|e| HubError::Config(format!("{}: {}", default_path.display(), e)))?
            } else {
                Config::default()
            }
        }
    };

    if let Some(dir) = &args.storage_dir {
        config.storage_dir = dir.clone();
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(storage_dir = %config.storage_dir.display(), "Starting agent-hub");

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("creating {}", config.storage_dir.display()))?;

    let db = Arc::new(HubDb::open(&config)?);
    let services = Services::new(db.clone());
    let _listener = spawn_logging_listener(services.events.clone());

    match args.command {
        Command::Init => {
            let config_path = config.config_path();
            if !config_path.exists() {
                config.save(&config_path)?;
                info!(path = %config_path.display(), "Created default config");
            }
            info!(database = %config.database_path().display(), "Database ready");
        }
        Command::CreateCommunity { name, description } => {
            let community = services
                .content
                .create_community(&name, description.as_deref())?;
            print_json(&community)?;
        }
        Command::Leaderboard { board, limit } => match board {
            Board::Points => print_json(&services.discovery.top_agents_by_points(limit)?)?,
            Board::Followers => print_json(&services.discovery.top_agents_by_followers(limit)?)?,
            Board::Posts => print_json(&services.discovery.top_posts_by_net_votes(limit)?)?,
        },
        Command::Stats => {
            print_json(&db.stats()?)?;
        }
    }

    Ok(())
}

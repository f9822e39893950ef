//! minirest: file-based dev router
//!
//! Watches a source tree, compiles every changed handler module, maps each
//! file under `routes/` to a URL pattern and serves requests through the
//! compiled modules.
//!
//! # Architecture Overview
//!
//! ```text
//!   src/routes/**/*.rhai
//!          │  notify events
//!          ▼
//!   ┌─────────────┐  compile   ┌─────────────┐  add/remove   ┌──────────────┐
//!   │    watch    │──────────▶│  compiler   │─────────────▶│    table     │
//!   │  pipeline   │            │ (validate)  │               │ routes.json  │
//!   └─────────────┘            └─────────────┘               └──────┬───────┘
//!                                                                   │ snapshot
//!                                                                   ▼
//!   Client ──▶ http server ──▶ registry (RouteSet) ──▶ dispatch::resolve ──▶ module
//! ```
//!
//! # Commands
//!
//! - `dev`: scan, watch, compile and serve in one process
//! - `build`: compile everything once and write `routes.json`
//! - `serve`: serve from `routes.json`, following changes to it
//! - `routes`: print the persisted route table

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use minirest::config::{load_config_or_default, validate_config, ConfigError, MinirestConfig};
use minirest::layout::ROUTES_FILE;
use minirest::lifecycle::{signals, startup, Shutdown};
use minirest::observability::logging;
use minirest::table::persist::read_table_or_empty;

#[derive(Parser)]
#[command(name = "minirest")]
#[command(about = "File-based dev router", long_about = None)]
struct Cli {
    /// Configuration file, resolved against --root when relative
    #[arg(short, long, global = true, default_value = "minirest.toml")]
    config: PathBuf,

    /// Project root
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch, compile and serve
    Dev {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Compile every source once
    Build,
    /// Serve an existing route table
    Serve {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the route table
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let bind = match &cli.command {
        Commands::Dev { bind } | Commands::Serve { bind } => bind.clone(),
        Commands::Build | Commands::Routes => None,
    };
    let config = resolve_config(&cli.config, cli.root.as_deref(), bind)?;

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.project.root.display(),
        "minirest starting"
    );

    match cli.command {
        Commands::Dev { .. } => {
            startup::init_metrics(&config);
            let listener = startup::bind(&config.server.bind_address).await?;
            let shutdown = Shutdown::new();
            signals::spawn_ctrl_c(shutdown.clone());
            startup::run_dev(&config, listener, shutdown).await?;
        }
        Commands::Serve { .. } => {
            startup::init_metrics(&config);
            let listener = startup::bind(&config.server.bind_address).await?;
            let shutdown = Shutdown::new();
            signals::spawn_ctrl_c(shutdown.clone());
            startup::run_serve(&config, listener, shutdown).await?;
        }
        Commands::Build => {
            let report = startup::run_build(&config).await?;
            if report.failed > 0 {
                return Err(format!("{} file(s) failed to compile", report.failed).into());
            }
        }
        Commands::Routes => print_routes(&config)?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the config file and apply command-line overrides.
fn resolve_config(
    path: &Path,
    root: Option<&Path>,
    bind: Option<String>,
) -> Result<MinirestConfig, ConfigError> {
    let path = match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    };
    let mut config = load_config_or_default(&path)?;

    match root {
        Some(root) => config.project.root = root.to_path_buf(),
        None if config.project.root.is_relative() => {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            config.project.root = base.join(&config.project.root);
        }
        None => {}
    }
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn print_routes(config: &MinirestConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.project.out_path().join(ROUTES_FILE);
    let table = read_table_or_empty(&path)?;

    if table.is_empty() {
        println!("No routes in {}", path.display());
        return Ok(());
    }
    for (pattern, entry) in table.iter() {
        println!("{:<32} {} ({})", pattern.to_string(), entry.path, entry.version);
    }
    Ok(())
}

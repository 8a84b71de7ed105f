//! bibgraph CLI - inspect and feed a persistent bibliographic graph cache
//!
//! # Usage
//!
//! ```bash
//! # Load discovered entities from a JSON Lines dump
//! bibgraph import crawl.jsonl
//!
//! # Summarize the cache
//! bibgraph stats
//!
//! # Who authored W2741809807?
//! bibgraph neighbors W2741809807 -d outbound -t authored
//!
//! # Everything between a set of works, as JSON
//! bibgraph subgraph W1 W2 W3
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use bibgraph_config::{BibgraphConfig, ConfigOverrides, LogFormat, LoggingConfig, StorageBackend};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// bibgraph - persistent bibliographic graph cache
#[derive(Parser, Debug)]
#[command(name = "bibgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding `.bibgraph/` (defaults to the current directory)
    #[arg(long, short = 'w', global = true, env = "BIBGRAPH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to a configuration file (skips global/local lookup)
    #[arg(long, short = 'c', global = true, env = "BIBGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite graph database
    #[arg(long, global = true, env = "BIBGRAPH_STORE")]
    store: Option<PathBuf>,

    /// Durable store backend (sqlite, memory, none)
    #[arg(long, global = true, env = "BIBGRAPH_BACKEND", value_parser = parse_backend)]
    backend: Option<StorageBackend>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

fn parse_backend(s: &str) -> Result<StorageBackend, String> {
    s.parse()
        .map_err(|e: bibgraph_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        let log_level = if self.quiet {
            Some("error")
        } else if self.verbose {
            Some("debug")
        } else {
            None
        };

        ConfigOverrides {
            store_path: self.store.clone(),
            backend: self.backend,
            log_level: log_level.map(str::to_string),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show graph statistics and durable store counts
    Stats(commands::stats::StatsArgs),

    /// Show a single node
    Node(commands::query::NodeArgs),

    /// List the ids of adjacent nodes
    Neighbors(commands::query::NeighborsArgs),

    /// List the edges touching a node
    Edges(commands::query::EdgesArgs),

    /// Print the nodes and edges among a set of ids as JSON
    Subgraph(commands::query::SubgraphArgs),

    /// Import nodes and edges from a JSON Lines file
    Import(commands::import::ImportArgs),

    /// Mark a node as expanded
    Expand(commands::expand::ExpandArgs),

    /// Remove every node and edge from the cache
    Clear(commands::clear::ClearArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Install the global tracing subscriber, writing to stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let log_level = Level::from_str(&logging.level).unwrap_or(Level::INFO);

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command itself
    let logging = commands::resolve_workspace(&cli.global)
        .and_then(|workspace| commands::load_config(&cli.global, &workspace))
        .map(|config| config.logging)
        .unwrap_or_else(|_| {
            let mut config = BibgraphConfig::default();
            config.apply_overrides(&cli.global.to_config_overrides());
            config.logging
        });
    init_tracing(&logging)?;

    match cli.command {
        Commands::Stats(args) => commands::stats::execute(args, cli.global).await,
        Commands::Node(args) => commands::query::execute_node(args, cli.global).await,
        Commands::Neighbors(args) => commands::query::execute_neighbors(args, cli.global).await,
        Commands::Edges(args) => commands::query::execute_edges(args, cli.global).await,
        Commands::Subgraph(args) => commands::query::execute_subgraph(args, cli.global).await,
        Commands::Import(args) => commands::import::execute(args, cli.global).await,
        Commands::Expand(args) => commands::expand::execute(args, cli.global).await,
        Commands::Clear(args) => commands::clear::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> ConfigOverrides {
        let cli = Cli::try_parse_from(args).unwrap();
        cli.global.to_config_overrides()
    }

    #[test]
    fn test_verbosity_maps_to_log_level() {
        assert_eq!(overrides(&["bibgraph", "stats"]).log_level, None);
        assert_eq!(
            overrides(&["bibgraph", "-v", "stats"]).log_level.as_deref(),
            Some("debug")
        );
        assert_eq!(
            overrides(&["bibgraph", "stats", "--quiet"]).log_level.as_deref(),
            Some("error")
        );
        // Quiet wins when both are given
        assert_eq!(
            overrides(&["bibgraph", "-v", "-q", "stats"]).log_level.as_deref(),
            Some("error")
        );
    }

    #[test]
    fn test_log_level_override_beats_config_file() {
        let mut config = BibgraphConfig::default();
        config.logging.level = "trace".to_string();
        config.apply_overrides(&overrides(&["bibgraph", "--quiet", "stats"]));
        assert_eq!(config.logging.level, "error");
    }
}

//! CLI command implementations

pub mod clear;
pub mod config;
pub mod expand;
pub mod import;
pub mod query;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bibgraph_config::{BibgraphConfig, ConfigLoader, StorageBackend};
use bibgraph_core::{IndexTier, MemoryStore, PersistentGraph, SqliteStoreFactory, TierState};
use serde::Serialize;

use crate::progress;
use crate::GlobalOptions;

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        return ws
            .canonicalize()
            .with_context(|| format!("Workspace not found: {}", ws.display()));
    }

    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration (file, or global → local) with CLI overrides applied.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<BibgraphConfig> {
    let loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    loader
        .load(workspace, Some(&overrides))
        .context("Failed to load configuration")
}

/// Graph opened and hydrated from the configured store.
pub struct OpenGraph {
    pub graph: PersistentGraph,
    pub config: BibgraphConfig,
}

/// Build the persistent graph described by the configuration and hydrate it.
pub async fn open_graph(global: &GlobalOptions) -> Result<OpenGraph> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace)?;

    let graph = match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = config.store_path(&workspace);
            tracing::debug!("Opening graph store at {}", path.display());
            PersistentGraph::new(IndexTier::new(Arc::new(SqliteStoreFactory::new(path))))
        }
        StorageBackend::Memory => PersistentGraph::with_store(Arc::new(MemoryStore::new())),
        StorageBackend::None => PersistentGraph::in_memory(),
    };

    let spinner = progress::spinner("Loading graph...", global.quiet);
    graph
        .initialize()
        .await
        .context("Failed to load graph from store")?;
    let nodes = graph.get_node_count().await?;
    let edges = graph.get_edge_count().await?;

    if config.storage.backend == StorageBackend::Sqlite
        && graph.store_state() == TierState::Unavailable
    {
        progress::finish_spinner_warn(
            spinner,
            "Graph store unavailable, changes will not be persisted",
        );
    } else {
        progress::finish_spinner(
            spinner,
            &format!("Loaded {} nodes, {} edges", nodes, edges),
        );
    }

    Ok(OpenGraph { graph, config })
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

//! Import command - feed nodes and edges from a JSON Lines file
//!
//! Each non-empty line is one record, tagged by `kind`:
//!
//! ```text
//! {"kind":"node","id":"W1","entity_type":"work","completeness":"full","label":"Attention"}
//! {"kind":"node","id":"A1","entity_type":"author"}
//! {"kind":"edge","source":"W1","target":"A1","type":"authored","author_position":"first"}
//! ```
//!
//! All nodes are written before any edge so endpoints exist first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bibgraph_core::{EdgeInput, NodeInput};
use clap::Args;
use serde::Deserialize;

use super::{open_graph, print_info};
use crate::progress;
use crate::GlobalOptions;

/// Records written per bulk call
const BATCH_SIZE: usize = 500;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines file of node and edge records
    pub file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ImportRecord {
    Node(NodeInput),
    Edge(EdgeInput),
}

#[derive(Debug, Default)]
struct ImportBatch {
    nodes: Vec<NodeInput>,
    edges: Vec<EdgeInput>,
}

impl ImportBatch {
    fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }
}

fn parse_records(content: &str, path: &Path) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), index + 1))?;
        match record {
            ImportRecord::Node(node) => batch.nodes.push(node),
            ImportRecord::Edge(edge) => batch.edges.push(edge),
        }
    }
    Ok(batch)
}

pub async fn execute(args: ImportArgs, global: GlobalOptions) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let batch = parse_records(&content, &args.file)?;

    let opened = open_graph(&global).await?;
    let graph = &opened.graph;

    let pb = progress::progress_bar(batch.len() as u64, "Importing", global.quiet);
    let mut nodes_added = 0;
    for chunk in batch.nodes.chunks(BATCH_SIZE) {
        nodes_added += graph.add_nodes(chunk.to_vec()).await?;
        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    let mut edges_added = 0;
    for chunk in batch.edges.chunks(BATCH_SIZE) {
        edges_added += graph.add_edges(chunk.to_vec()).await?;
        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    progress::finish_progress(pb);

    tracing::info!(
        nodes = batch.nodes.len(),
        edges = batch.edges.len(),
        "Imported {}",
        args.file.display()
    );
    print_info(
        &format!(
            "Imported {} node records ({} changed) and {} edge records ({} new)",
            batch.nodes.len(),
            nodes_added,
            batch.edges.len(),
            edges_added
        ),
        global.quiet,
    );
    Ok(())
}

//! Expand command - record that a node's neighbourhood has been fetched

use anyhow::{bail, Result};
use clap::Args;

use super::{open_graph, print_info};
use crate::GlobalOptions;

/// Arguments for the expand command
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Entity id
    pub id: String,
}

pub async fn execute(args: ExpandArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;
    let graph = &opened.graph;

    if !graph.has_node(&args.id).await? {
        bail!("Node not found: {}", args.id);
    }

    if graph.mark_node_expanded(&args.id).await? {
        print_info(&format!("Marked {} as expanded", args.id), global.quiet);
    } else {
        print_info(&format!("{} was already expanded", args.id), global.quiet);
    }
    Ok(())
}

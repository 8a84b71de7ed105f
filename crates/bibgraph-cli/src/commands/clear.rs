//! Clear command - drop every node and edge

use anyhow::{bail, Result};
use clap::Args;

use super::{open_graph, print_info};
use crate::GlobalOptions;

/// Arguments for the clear command
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Confirm removal of all cached data
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn execute(args: ClearArgs, global: GlobalOptions) -> Result<()> {
    if !args.yes {
        bail!("Refusing to clear the graph without --yes");
    }

    let opened = open_graph(&global).await?;
    let nodes = opened.graph.get_node_count().await?;
    let edges = opened.graph.get_edge_count().await?;
    opened.graph.clear().await?;

    print_info(
        &format!("Removed {} nodes and {} edges", nodes, edges),
        global.quiet,
    );
    Ok(())
}

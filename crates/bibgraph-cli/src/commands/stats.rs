//! Stats command - summarize the cached graph and the durable store

use anyhow::Result;
use bibgraph_core::{GraphStatistics, IndexStats, TierState};
use clap::Args;
use serde::Serialize;

use super::{open_graph, print_json};
use crate::GlobalOptions;

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatsOutput {
    graph: GraphStatistics,
    store_state: TierState,
    store: IndexStats,
}

pub async fn execute(args: StatsArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;
    let graph = &opened.graph;

    let output = StatsOutput {
        graph: graph.get_statistics().await?,
        store_state: graph.store_state(),
        store: graph.durable_stats().await?,
    };

    if args.json {
        return print_json(&output);
    }

    let stats = &output.graph;
    println!("Graph");
    println!("  Nodes: {}", stats.total_nodes);
    for (completeness, count) in &stats.nodes_by_completeness {
        println!("    {:<10} {}", completeness.as_str(), count);
    }
    if !stats.nodes_by_type.is_empty() {
        println!("  By entity type:");
        for (entity_type, count) in &stats.nodes_by_type {
            println!("    {:<14} {}", entity_type.as_str(), count);
        }
    }
    println!("  Edges: {}", stats.total_edges);
    for (relation_type, count) in &stats.edges_by_type {
        println!("    {:<16} {}", relation_type.as_str(), count);
    }

    println!();
    match output.store_state {
        TierState::Unavailable => println!("Store: unavailable"),
        _ => {
            let store = &output.store;
            println!("Store");
            println!(
                "  Nodes: {} ({} stub, {} partial, {} full)",
                store.node_count, store.stub_count, store.partial_count, store.full_count
            );
            println!("  Edges: {}", store.edge_count);
        }
    }

    Ok(())
}

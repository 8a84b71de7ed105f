//! Read-only graph queries: node, neighbors, edges, subgraph

use anyhow::{bail, Result};
use bibgraph_core::{
    EdgePropertyFilter, GraphEdgeRecord, NeighborOptions, RelationType, TraversalDirection,
};
use clap::Args;

use super::{open_graph, print_json};
use crate::GlobalOptions;

/// Arguments for the node command
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Entity id (e.g. W2741809807)
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the neighbors command
#[derive(Args, Debug)]
pub struct NeighborsArgs {
    /// Entity id
    pub id: String,

    /// Edge direction to follow (outbound, inbound, both)
    #[arg(long, short = 'd', default_value = "both")]
    pub direction: TraversalDirection,

    /// Only follow these relation types (repeatable)
    #[arg(long = "type", short = 't')]
    pub types: Vec<RelationType>,

    /// Maximum number of neighbours (defaults to query.default_neighbor_limit)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the edges command
#[derive(Args, Debug)]
pub struct EdgesArgs {
    /// Entity id
    pub id: String,

    /// Edge direction (outbound, inbound, both)
    #[arg(long, short = 'd', default_value = "both")]
    pub direction: TraversalDirection,

    /// Only edges of this relation type
    #[arg(long = "type", short = 't')]
    pub relation_type: Option<RelationType>,

    /// Only edges whose open access flag matches
    #[arg(long)]
    pub open_access: Option<bool>,

    /// Only edges whose corresponding-author flag matches
    #[arg(long)]
    pub corresponding: Option<bool>,

    /// Only edges scored at least this high
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EdgesArgs {
    fn property_filter(&self) -> Option<EdgePropertyFilter> {
        let filter = EdgePropertyFilter {
            is_open_access: self.open_access,
            is_corresponding: self.corresponding,
            score_min: self.min_score,
            ..Default::default()
        };
        (!filter.is_empty()).then_some(filter)
    }
}

/// Arguments for the subgraph command
#[derive(Args, Debug)]
pub struct SubgraphArgs {
    /// Entity ids to include
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub async fn execute_node(args: NodeArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;

    let Some(node) = opened.graph.get_node(&args.id).await? else {
        bail!("Node not found: {}", args.id);
    };

    if args.json {
        return print_json(&node);
    }

    println!("{} ({})", node.id, node.entity_type);
    if let Some(ref label) = node.label {
        println!("  Label:        {}", label);
    }
    println!("  Completeness: {}", node.completeness);
    println!("  Discovered:   {}", node.discovered_at.to_rfc3339());
    println!("  Updated:      {}", node.updated_at.to_rfc3339());
    match node.expanded_at {
        Some(at) => println!("  Expanded:     {}", at.to_rfc3339()),
        None => println!("  Expanded:     no"),
    }
    for (key, value) in &node.metadata {
        println!("  {}: {}", key, value);
    }
    Ok(())
}

pub async fn execute_neighbors(args: NeighborsArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;

    let options = NeighborOptions {
        direction: args.direction,
        types: (!args.types.is_empty()).then_some(args.types),
        limit: args.limit.or(opened.config.query.default_neighbor_limit),
    };
    let neighbors = opened.graph.get_neighbors(&args.id, &options).await?;

    if args.json {
        return print_json(&neighbors);
    }
    for id in &neighbors {
        println!("{}", id);
    }
    Ok(())
}

pub async fn execute_edges(args: EdgesArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;
    let filter = args.property_filter();

    let edges = opened
        .graph
        .get_edges_by_direction(&args.id, args.direction, args.relation_type, filter.as_ref())
        .await?;

    if args.json {
        return print_json(&edges);
    }
    for edge in &edges {
        println!("{}", format_edge(edge));
    }
    Ok(())
}

pub async fn execute_subgraph(args: SubgraphArgs, global: GlobalOptions) -> Result<()> {
    let opened = open_graph(&global).await?;
    let subgraph = opened.graph.get_subgraph(&args.ids).await?;
    print_json(&subgraph)
}

fn format_edge(edge: &GraphEdgeRecord) -> String {
    let arrow = match edge.direction {
        bibgraph_core::EdgeDirection::Directed => "->",
        bibgraph_core::EdgeDirection::Undirected => "--",
    };
    let mut line = format!(
        "{} {} {} [{}]",
        edge.source, arrow, edge.target, edge.relation_type
    );
    if let Some(score) = edge.properties.score {
        line.push_str(&format!(" score={}", score));
    }
    line
}

//! Behavioural tests for the persistent graph.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package bibgraph-core --test persistent_graph
//! ```

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bibgraph_core::{
    Completeness, EdgeInput, EdgeProperties, EntityType, GraphEdgeRecord, GraphError,
    GraphNodeRecord, GraphStore, HydrationState, IndexTier, MemoryStore, NeighborOptions,
    NodeInput, PersistentGraph, RelationType, TierState,
};
use common::{CountingStore, FailingFactory};
use pretty_assertions::assert_eq;

fn work(id: &str, completeness: Completeness) -> NodeInput {
    NodeInput::new(id, EntityType::Work, completeness)
}

// ============================================================================
// Completeness
// ============================================================================

#[tokio::test]
async fn test_completeness_is_running_maximum() {
    let graph = PersistentGraph::in_memory();
    graph.add_node(work("W1", Completeness::Stub)).await.unwrap();

    let sequence = [
        Completeness::Partial,
        Completeness::Stub,
        Completeness::Full,
        Completeness::Partial,
        Completeness::Stub,
    ];
    let mut expected = Completeness::Stub;
    for completeness in sequence {
        graph
            .update_node_completeness("W1", completeness, None, None)
            .await
            .unwrap();
        expected = expected.max(completeness);
        let node = graph.get_node("W1").await.unwrap().unwrap();
        assert_eq!(node.completeness, expected);
    }
}

#[tokio::test]
async fn test_redundant_update_skips_store() {
    let store = CountingStore::new();
    let graph = PersistentGraph::with_store(store.clone());
    graph.add_node(work("W1", Completeness::Full)).await.unwrap();
    let writes = store.writes();

    let changed = graph
        .update_node_completeness("W1", Completeness::Full, None, None)
        .await
        .unwrap();
    assert!(!changed);
    assert!(!graph
        .update_node_completeness("missing", Completeness::Full, None, None)
        .await
        .unwrap());
    assert_eq!(store.writes(), writes);
}

// ============================================================================
// Edges
// ============================================================================

#[tokio::test]
async fn test_add_edge_is_idempotent() {
    let graph = PersistentGraph::with_store(Arc::new(MemoryStore::new()));
    let edge = EdgeInput::new("W1", "A1", RelationType::Authored);

    assert!(graph.add_edge(edge.clone()).await.unwrap());
    assert_eq!(graph.get_edge_count().await.unwrap(), 1);

    assert!(!graph.add_edge(edge.clone()).await.unwrap());
    assert_eq!(graph.get_edge_count().await.unwrap(), 1);
    assert!(graph.has_edge(&edge.id()).await.unwrap());
}

#[tokio::test]
async fn test_bulk_edges_overwrite_in_store() {
    let store = Arc::new(MemoryStore::new());
    let tier = IndexTier::with_store(store.clone());

    let scored = |score: f64| {
        GraphEdgeRecord::new(
            EdgeInput::new("W1", "T1", RelationType::HasTopic).with_properties(EdgeProperties {
                score: Some(score),
                ..Default::default()
            }),
        )
    };

    assert!(tier.add_edge(&scored(0.2)).await.unwrap());
    tier.add_edges(&[scored(0.9)]).await.unwrap();

    let id = scored(0.0).id;
    let stored = tier.get_edge(&id).await.unwrap().unwrap();
    assert_eq!(stored.properties.score, Some(0.9));
    assert_eq!(tier.count_edges().await.unwrap(), 1);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_subgraph_stays_inside_requested_ids() {
    let graph = PersistentGraph::in_memory();
    for id in ["W1", "W2", "W3"] {
        graph.add_node(work(id, Completeness::Stub)).await.unwrap();
    }
    graph
        .add_edges(vec![
            EdgeInput::new("W1", "W2", RelationType::References),
            EdgeInput::new("W2", "W3", RelationType::References),
            EdgeInput::new("W1", "A9", RelationType::Authored),
        ])
        .await
        .unwrap();

    let ids = ["W1", "W2", "unknown"];
    let subgraph = graph.get_subgraph(&ids).await.unwrap();
    let allowed: HashSet<&str> = ids.into_iter().collect();

    let mut node_ids: Vec<_> = subgraph.nodes.iter().map(|n| n.id.as_str()).collect();
    node_ids.sort();
    assert_eq!(node_ids, vec!["W1", "W2"]);

    assert_eq!(subgraph.edges.len(), 1);
    for edge in &subgraph.edges {
        assert!(allowed.contains(edge.source.as_str()));
        assert!(allowed.contains(edge.target.as_str()));
    }
}

#[tokio::test]
async fn test_outbound_neighbors_exclude_inbound_only() {
    let graph = PersistentGraph::in_memory();
    graph
        .add_edges(vec![
            EdgeInput::new("W1", "W2", RelationType::References),
            EdgeInput::new("W3", "W1", RelationType::References),
        ])
        .await
        .unwrap();

    let outbound = graph
        .get_neighbors("W1", &NeighborOptions::outbound())
        .await
        .unwrap();
    assert_eq!(outbound, vec!["W2"]);

    let inbound = graph
        .get_neighbors("W1", &NeighborOptions::inbound())
        .await
        .unwrap();
    assert_eq!(inbound, vec!["W3"]);
}

#[tokio::test]
async fn test_mark_expanded_is_idempotent() {
    let store = CountingStore::new();
    let graph = PersistentGraph::with_store(store.clone());
    graph.add_node(work("W1", Completeness::Stub)).await.unwrap();

    assert!(graph.mark_node_expanded("W1").await.unwrap());
    let first = graph.get_node("W1").await.unwrap().unwrap().expanded_at;
    assert!(first.is_some());
    let writes = store.writes();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(!graph.mark_node_expanded("W1").await.unwrap());
    let second = graph.get_node("W1").await.unwrap().unwrap().expanded_at;
    assert_eq!(first, second);
    assert_eq!(store.writes(), writes);

    assert!(graph.get_unexpanded_nodes().await.unwrap().is_empty());
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn test_concurrent_initialize_loads_once() {
    let store = CountingStore::new();
    let graph = PersistentGraph::with_store(store.clone());

    let mut handles = Vec::new();
    for i in 0..10 {
        let graph = graph.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                graph.initialize().await.map(|_| ())
            } else {
                graph.get_node_count().await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.loads(), 1);
    assert_eq!(graph.hydration_state(), HydrationState::Hydrated);
}

#[tokio::test]
async fn test_cancelled_initialize_resumes_shared_load() {
    let store = CountingStore::new();
    store
        .put_node(&GraphNodeRecord::new(work("W1", Completeness::Stub)))
        .await
        .unwrap();
    let graph = PersistentGraph::with_store(store.clone());

    // The store's load sleeps longer than this
    let cut_short = tokio::time::timeout(Duration::from_millis(1), graph.initialize()).await;
    assert!(cut_short.is_err());

    graph.initialize().await.unwrap();
    assert_eq!(graph.hydration_state(), HydrationState::Hydrated);
    assert_eq!(store.loads(), 1);
    assert!(graph.has_node("W1").await.unwrap());
}

#[tokio::test]
async fn test_hydration_restores_persisted_graph() {
    let store = Arc::new(MemoryStore::new());
    {
        let graph = PersistentGraph::with_store(store.clone());
        graph.add_node(work("W1", Completeness::Full)).await.unwrap();
        graph
            .add_edge(EdgeInput::new("W1", "A1", RelationType::Authored))
            .await
            .unwrap();
    }

    let graph = PersistentGraph::with_store(store);
    assert_eq!(graph.hydration_state(), HydrationState::NotStarted);
    assert_eq!(
        graph.get_neighbors("W1", &NeighborOptions::default()).await.unwrap(),
        vec!["A1"]
    );
    assert_eq!(
        graph.get_node("W1").await.unwrap().unwrap().completeness,
        Completeness::Full
    );
}

#[tokio::test]
async fn test_failed_hydration_is_retryable() {
    let store = CountingStore::new();
    store
        .put_node(&GraphNodeRecord::new(work("W1", Completeness::Stub)))
        .await
        .unwrap();
    store.fail_next_loads(1);
    let graph = PersistentGraph::with_store(store.clone());

    let err = graph.initialize().await.unwrap_err();
    assert!(matches!(err, GraphError::Hydration(_)));
    assert_eq!(graph.hydration_state(), HydrationState::Error);

    assert!(graph.has_node("W1").await.unwrap());
    assert_eq!(graph.hydration_state(), HydrationState::Hydrated);
    assert_eq!(store.loads(), 2);
}

// ============================================================================
// Durable write failures
// ============================================================================

#[tokio::test]
async fn test_failed_write_leaves_cache_untouched() {
    let store = CountingStore::new();
    let graph = PersistentGraph::with_store(store.clone());
    graph.add_node(work("W1", Completeness::Stub)).await.unwrap();

    store.fail_writes(true);

    assert!(graph.add_node(work("W2", Completeness::Full)).await.is_err());
    assert!(graph
        .add_nodes(vec![work("W3", Completeness::Stub), work("W4", Completeness::Stub)])
        .await
        .is_err());
    assert!(graph
        .add_edge(EdgeInput::new("W1", "A1", RelationType::Authored))
        .await
        .is_err());
    assert!(graph
        .add_edges(vec![EdgeInput::new("W1", "W9", RelationType::References)])
        .await
        .is_err());
    assert!(graph
        .update_node_completeness("W1", Completeness::Full, Some("Upgraded"), None)
        .await
        .is_err());
    assert!(graph.mark_node_expanded("W1").await.is_err());

    assert_eq!(graph.get_node_count().await.unwrap(), 1);
    assert_eq!(graph.get_edge_count().await.unwrap(), 0);
    let w1 = graph.get_node("W1").await.unwrap().unwrap();
    assert_eq!(w1.completeness, Completeness::Stub);
    assert_eq!(w1.label, None);
    assert!(!w1.is_expanded());

    // Cache and store still agree once writes work again
    store.fail_writes(false);
    assert!(graph.add_node(work("W2", Completeness::Full)).await.unwrap());
    assert_eq!(store.count_nodes().await.unwrap(), 2);
}

// ============================================================================
// Degraded mode
// ============================================================================

#[tokio::test]
async fn test_unavailable_store_runs_in_memory() {
    let graph = PersistentGraph::new(IndexTier::new(Arc::new(FailingFactory)));

    assert!(graph.add_node(work("W1", Completeness::Stub)).await.unwrap());
    assert!(graph
        .add_edge(EdgeInput::new("W1", "A1", RelationType::Authored))
        .await
        .unwrap());
    assert!(graph
        .update_node_completeness("W1", Completeness::Partial, Some("Title"), None)
        .await
        .unwrap());
    assert!(graph.mark_node_expanded("W1").await.unwrap());

    assert_eq!(graph.store_state(), TierState::Unavailable);
    assert_eq!(graph.get_node_count().await.unwrap(), 1);
    assert_eq!(
        graph.get_node("W1").await.unwrap().unwrap().completeness,
        Completeness::Partial
    );
    assert_eq!(graph.durable_stats().await.unwrap().node_count, 0);
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scenario() {
    let graph = PersistentGraph::with_store(Arc::new(MemoryStore::new()));

    graph.add_node(work("W1", Completeness::Stub)).await.unwrap();
    graph
        .add_edge(EdgeInput::new("W1", "A1", RelationType::Authored))
        .await
        .unwrap();

    assert_eq!(
        graph.get_neighbors("W1", &NeighborOptions::default()).await.unwrap(),
        vec!["A1"]
    );

    graph
        .update_node_completeness("W1", Completeness::Full, None, None)
        .await
        .unwrap();
    assert_eq!(
        graph.get_node("W1").await.unwrap().unwrap().completeness,
        Completeness::Full
    );

    graph
        .update_node_completeness("W1", Completeness::Stub, None, None)
        .await
        .unwrap();
    assert_eq!(
        graph.get_node("W1").await.unwrap().unwrap().completeness,
        Completeness::Full
    );
}

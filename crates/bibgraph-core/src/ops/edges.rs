//! Edge operations.
//!
//! Single and bulk insertion deliberately differ: [`add_edge`] never touches
//! an existing row, while [`add_edges`] overwrites rows that share a derived
//! id. Bulk ingestion is the refresh path for re-fetched relationship batches,
//! where stale property values must be replaced.

use crate::filter::{selects, EdgePropertyFilter};
use crate::graph::{GraphEdgeRecord, RelationType};
use crate::store::{GraphStore, StoreError};

/// Insert an edge unless its derived id is already stored.
///
/// Returns `true` when the edge was inserted, `false` when a record with the
/// same `(source, target, type)` already existed (left unmodified).
pub async fn add_edge(store: &dyn GraphStore, edge: &GraphEdgeRecord) -> Result<bool, StoreError> {
    store.insert_edge(edge).await
}

/// Upsert a batch of edges, replacing records with matching ids.
pub async fn add_edges(store: &dyn GraphStore, edges: &[GraphEdgeRecord]) -> Result<(), StoreError> {
    if edges.is_empty() {
        return Ok(());
    }
    store.put_edges(edges).await
}

pub async fn get_edge(store: &dyn GraphStore, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError> {
    store.get_edge(id).await
}

pub async fn has_edge(store: &dyn GraphStore, id: &str) -> Result<bool, StoreError> {
    Ok(store.get_edge(id).await?.is_some())
}

fn select(
    edges: Vec<GraphEdgeRecord>,
    relation_type: Option<RelationType>,
    filter: Option<&EdgePropertyFilter>,
) -> Vec<GraphEdgeRecord> {
    edges
        .into_iter()
        .filter(|e| selects(e, relation_type, filter))
        .collect()
}

/// Outgoing edges of `source`, optionally narrowed by type and properties.
pub async fn get_edges_from(
    store: &dyn GraphStore,
    source: &str,
    relation_type: Option<RelationType>,
    filter: Option<&EdgePropertyFilter>,
) -> Result<Vec<GraphEdgeRecord>, StoreError> {
    Ok(select(store.edges_from(source).await?, relation_type, filter))
}

/// Incoming edges of `target`, optionally narrowed by type and properties.
pub async fn get_edges_to(
    store: &dyn GraphStore,
    target: &str,
    relation_type: Option<RelationType>,
    filter: Option<&EdgePropertyFilter>,
) -> Result<Vec<GraphEdgeRecord>, StoreError> {
    Ok(select(store.edges_to(target).await?, relation_type, filter))
}

pub async fn get_all_edges(
    store: &dyn GraphStore,
    relation_type: Option<RelationType>,
    filter: Option<&EdgePropertyFilter>,
) -> Result<Vec<GraphEdgeRecord>, StoreError> {
    Ok(select(store.all_edges().await?, relation_type, filter))
}

pub async fn count_edges(store: &dyn GraphStore) -> Result<usize, StoreError> {
    store.count_edges().await
}

pub async fn delete_edge(store: &dyn GraphStore, id: &str) -> Result<bool, StoreError> {
    Ok(store.delete_edges(&[id.to_string()]).await? > 0)
}

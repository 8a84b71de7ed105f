//! Node operations.

use tracing::debug;

use crate::graph::{timestamp_now, Completeness, GraphNodeRecord, Metadata};
use crate::store::{GraphStore, StoreError};

/// Persist a freshly created node record.
///
/// Records come from [`GraphNodeRecord::new`], so `discovered_at` is the
/// creation time and `expanded_at` is unset. An existing row with the same id
/// is replaced, not merged; repeats belong on the update path.
pub async fn add_node(store: &dyn GraphStore, node: &GraphNodeRecord) -> Result<(), StoreError> {
    store.put_node(node).await
}

/// Persist a batch of node records in one call.
pub async fn add_nodes(store: &dyn GraphStore, nodes: &[GraphNodeRecord]) -> Result<(), StoreError> {
    if nodes.is_empty() {
        return Ok(());
    }
    store.put_nodes(nodes).await
}

pub async fn get_node(store: &dyn GraphStore, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
    store.get_node(id).await
}

/// Overwrite a node's completeness and merge in label/metadata.
///
/// No ordering rule is enforced at this layer. Returns the stored record, or
/// `None` when the id is unknown to the store.
pub async fn update_node_completeness(
    store: &dyn GraphStore,
    id: &str,
    completeness: Completeness,
    label: Option<&str>,
    metadata: Option<&Metadata>,
) -> Result<Option<GraphNodeRecord>, StoreError> {
    let Some(existing) = store.get_node(id).await? else {
        debug!("update_node_completeness: node {} not in store", id);
        return Ok(None);
    };

    let updated = existing.with_update(completeness, label, metadata, timestamp_now());
    store.put_node(&updated).await?;
    Ok(Some(updated))
}

/// Set `expanded_at` if it is not set yet.
///
/// Returns the record as stored after the call; a node that was already
/// expanded is returned untouched without a write.
pub async fn mark_node_expanded(
    store: &dyn GraphStore,
    id: &str,
) -> Result<Option<GraphNodeRecord>, StoreError> {
    let Some(mut node) = store.get_node(id).await? else {
        return Ok(None);
    };

    if node.expanded_at.is_none() {
        let now = timestamp_now();
        node.expanded_at = Some(now);
        node.updated_at = now;
        store.put_node(&node).await?;
    }
    Ok(Some(node))
}

pub async fn get_all_nodes(store: &dyn GraphStore) -> Result<Vec<GraphNodeRecord>, StoreError> {
    store.all_nodes().await
}

pub async fn get_nodes_by_completeness(
    store: &dyn GraphStore,
    completeness: Completeness,
) -> Result<Vec<GraphNodeRecord>, StoreError> {
    store.nodes_by_completeness(completeness).await
}

pub async fn count_nodes(store: &dyn GraphStore) -> Result<usize, StoreError> {
    store.count_nodes().await
}

pub async fn count_nodes_by_completeness(
    store: &dyn GraphStore,
    completeness: Completeness,
) -> Result<usize, StoreError> {
    store.count_nodes_by_completeness(completeness).await
}

/// Delete a node together with every edge touching it.
///
/// Edges go first so that a failure part-way never leaves edges pointing at a
/// node that no longer exists.
pub async fn delete_node(store: &dyn GraphStore, id: &str) -> Result<bool, StoreError> {
    let mut incident: Vec<String> = store
        .edges_from(id)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    incident.extend(store.edges_to(id).await?.into_iter().map(|e| e.id));
    incident.sort();
    incident.dedup();

    if !incident.is_empty() {
        store.delete_edges(&incident).await?;
    }
    store.delete_node(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeInput, EntityType, GraphEdgeRecord, NodeInput, RelationType};
    use crate::store::MemoryStore;

    fn stub(id: &str) -> GraphNodeRecord {
        GraphNodeRecord::new(NodeInput::new(id, EntityType::Work, Completeness::Stub))
    }

    #[tokio::test]
    async fn test_update_does_not_enforce_ordering() {
        let store = MemoryStore::new();
        add_node(&store, &stub("W1")).await.unwrap();

        update_node_completeness(&store, "W1", Completeness::Full, Some("Title"), None)
            .await
            .unwrap();
        // The ops layer lets a downgrade through; the graph layer guards it
        let updated = update_node_completeness(&store, "W1", Completeness::Stub, None, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.completeness, Completeness::Stub);
        assert_eq!(updated.label.as_deref(), Some("Title"));
    }

    #[tokio::test]
    async fn test_update_unknown_node() {
        let store = MemoryStore::new();
        let result = update_node_completeness(&store, "nope", Completeness::Full, None, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mark_expanded_only_once() {
        let store = MemoryStore::new();
        add_node(&store, &stub("W1")).await.unwrap();

        let first = mark_node_expanded(&store, "W1").await.unwrap().unwrap();
        let expanded_at = first.expanded_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = mark_node_expanded(&store, "W1").await.unwrap().unwrap();
        assert_eq!(second.expanded_at, Some(expanded_at));
    }

    #[tokio::test]
    async fn test_delete_node_removes_incident_edges() {
        let store = MemoryStore::new();
        add_nodes(&store, &[stub("W1"), stub("W2"), stub("W3")])
            .await
            .unwrap();
        store
            .put_edges(&[
                GraphEdgeRecord::new(EdgeInput::new("W1", "W2", RelationType::References)),
                GraphEdgeRecord::new(EdgeInput::new("W3", "W1", RelationType::References)),
                GraphEdgeRecord::new(EdgeInput::new("W2", "W3", RelationType::References)),
            ])
            .await
            .unwrap();

        assert!(delete_node(&store, "W1").await.unwrap());
        assert_eq!(count_nodes(&store).await.unwrap(), 2);
        assert_eq!(store.count_edges().await.unwrap(), 1);
        assert!(!delete_node(&store, "W1").await.unwrap());
    }
}

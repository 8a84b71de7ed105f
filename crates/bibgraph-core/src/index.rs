//! Index tier.
//!
//! Lazily opens the durable store on first use and fronts the node/edge
//! operations. When the store cannot be opened (or none is configured) the
//! tier switches to degraded mode for the rest of its life: reads return
//! empty results and writes become no-ops. Once the store is up, its errors
//! are passed through to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::filter::EdgePropertyFilter;
use crate::graph::{Completeness, GraphEdgeRecord, GraphNodeRecord, Metadata, RelationType};
use crate::ops::{edges, nodes};
use crate::store::{GraphStore, StaticStore, StoreError, StoreFactory};

/// Observable readiness of the tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    Uninitialized,
    Initialized,
    Unavailable,
}

enum Readiness {
    Initialized(Arc<dyn GraphStore>),
    Unavailable,
}

/// Aggregate counts from the durable store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub stub_count: usize,
    pub partial_count: usize,
    pub full_count: usize,
}

/// Lazily-initialized front for a durable [`GraphStore`].
pub struct IndexTier {
    factory: Option<Arc<dyn StoreFactory>>,
    readiness: OnceCell<Readiness>,
}

impl IndexTier {
    /// Create a tier that opens its store through `factory` on first use.
    pub fn new(factory: Arc<dyn StoreFactory>) -> Self {
        Self {
            factory: Some(factory),
            readiness: OnceCell::new(),
        }
    }

    /// Create a tier around an already-open store.
    pub fn with_store(store: Arc<dyn GraphStore>) -> Self {
        Self::new(Arc::new(StaticStore::new(store)))
    }

    /// Create a tier with no durable store; every operation degrades.
    pub fn detached() -> Self {
        Self {
            factory: None,
            readiness: OnceCell::new(),
        }
    }

    pub fn state(&self) -> TierState {
        match self.readiness.get() {
            None => TierState::Uninitialized,
            Some(Readiness::Initialized(_)) => TierState::Initialized,
            Some(Readiness::Unavailable) => TierState::Unavailable,
        }
    }

    /// Open and check the store once. Concurrent callers share the same check.
    pub async fn ensure_initialized(&self) -> TierState {
        self.readiness.get_or_init(|| self.check_store()).await;
        self.state()
    }

    async fn check_store(&self) -> Readiness {
        let Some(factory) = &self.factory else {
            warn!("No durable store configured, graph will not persist");
            return Readiness::Unavailable;
        };

        let store = match factory.open().await {
            Ok(store) => store,
            Err(e) => {
                warn!("Durable store unavailable, continuing without persistence: {}", e);
                return Readiness::Unavailable;
            }
        };

        match store.count_nodes().await {
            Ok(count) => {
                debug!("Durable store ready ({} nodes)", count);
                Readiness::Initialized(store)
            }
            Err(e) => {
                warn!("Durable store check failed, continuing without persistence: {}", e);
                Readiness::Unavailable
            }
        }
    }

    async fn store(&self) -> Option<Arc<dyn GraphStore>> {
        match self.readiness.get_or_init(|| self.check_store()).await {
            Readiness::Initialized(store) => Some(Arc::clone(store)),
            Readiness::Unavailable => None,
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub async fn add_node(&self, node: &GraphNodeRecord) -> Result<(), StoreError> {
        match self.store().await {
            Some(store) => nodes::add_node(store.as_ref(), node).await,
            None => Ok(()),
        }
    }

    pub async fn add_nodes(&self, records: &[GraphNodeRecord]) -> Result<(), StoreError> {
        match self.store().await {
            Some(store) => nodes::add_nodes(store.as_ref(), records).await,
            None => Ok(()),
        }
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
        match self.store().await {
            Some(store) => nodes::get_node(store.as_ref(), id).await,
            None => Ok(None),
        }
    }

    pub async fn update_node_completeness(
        &self,
        id: &str,
        completeness: Completeness,
        label: Option<&str>,
        metadata: Option<&Metadata>,
    ) -> Result<Option<GraphNodeRecord>, StoreError> {
        match self.store().await {
            Some(store) => {
                nodes::update_node_completeness(store.as_ref(), id, completeness, label, metadata)
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn mark_node_expanded(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
        match self.store().await {
            Some(store) => nodes::mark_node_expanded(store.as_ref(), id).await,
            None => Ok(None),
        }
    }

    pub async fn get_all_nodes(&self) -> Result<Vec<GraphNodeRecord>, StoreError> {
        match self.store().await {
            Some(store) => nodes::get_all_nodes(store.as_ref()).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, StoreError> {
        match self.store().await {
            Some(store) => nodes::get_nodes_by_completeness(store.as_ref(), completeness).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn count_nodes(&self) -> Result<usize, StoreError> {
        match self.store().await {
            Some(store) => nodes::count_nodes(store.as_ref()).await,
            None => Ok(0),
        }
    }

    /// Delete a node and its incident edges.
    pub async fn delete_node(&self, id: &str) -> Result<bool, StoreError> {
        match self.store().await {
            Some(store) => nodes::delete_node(store.as_ref(), id).await,
            None => Ok(false),
        }
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Insert-if-absent. Degraded mode reports `false`.
    pub async fn add_edge(&self, edge: &GraphEdgeRecord) -> Result<bool, StoreError> {
        match self.store().await {
            Some(store) => edges::add_edge(store.as_ref(), edge).await,
            None => Ok(false),
        }
    }

    /// Bulk upsert.
    pub async fn add_edges(&self, records: &[GraphEdgeRecord]) -> Result<(), StoreError> {
        match self.store().await {
            Some(store) => edges::add_edges(store.as_ref(), records).await,
            None => Ok(()),
        }
    }

    pub async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError> {
        match self.store().await {
            Some(store) => edges::get_edge(store.as_ref(), id).await,
            None => Ok(None),
        }
    }

    pub async fn has_edge(&self, id: &str) -> Result<bool, StoreError> {
        match self.store().await {
            Some(store) => edges::has_edge(store.as_ref(), id).await,
            None => Ok(false),
        }
    }

    pub async fn get_edges_from(
        &self,
        source: &str,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        match self.store().await {
            Some(store) => edges::get_edges_from(store.as_ref(), source, relation_type, filter).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_edges_to(
        &self,
        target: &str,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        match self.store().await {
            Some(store) => edges::get_edges_to(store.as_ref(), target, relation_type, filter).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_all_edges(
        &self,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        match self.store().await {
            Some(store) => edges::get_all_edges(store.as_ref(), relation_type, filter).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn count_edges(&self) -> Result<usize, StoreError> {
        match self.store().await {
            Some(store) => edges::count_edges(store.as_ref()).await,
            None => Ok(0),
        }
    }

    pub async fn delete_edge(&self, id: &str) -> Result<bool, StoreError> {
        match self.store().await {
            Some(store) => edges::delete_edge(store.as_ref(), id).await,
            None => Ok(false),
        }
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Node, edge and per-completeness counts, queried concurrently.
    pub async fn get_stats(&self) -> Result<IndexStats, StoreError> {
        let Some(store) = self.store().await else {
            return Ok(IndexStats::default());
        };
        let store = store.as_ref();

        let (node_count, edge_count, stub_count, partial_count, full_count) = futures::try_join!(
            store.count_nodes(),
            store.count_edges(),
            store.count_nodes_by_completeness(Completeness::Stub),
            store.count_nodes_by_completeness(Completeness::Partial),
            store.count_nodes_by_completeness(Completeness::Full),
        )?;

        Ok(IndexStats {
            node_count,
            edge_count,
            stub_count,
            partial_count,
            full_count,
        })
    }

    /// Empty both tables in one atomic step.
    pub async fn clear(&self) -> Result<(), StoreError> {
        match self.store().await {
            Some(store) => store.clear().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::graph::{EdgeInput, EntityType, NodeInput};
    use crate::store::MemoryStore;

    struct CountingFactory {
        opens: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StoreFactory for CountingFactory {
        async fn open(&self) -> Result<Arc<dyn GraphStore>, StoreError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                Err(StoreError::unavailable("disk on fire"))
            } else {
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_check() {
        let factory = Arc::new(CountingFactory {
            opens: AtomicUsize::new(0),
            fail: false,
        });
        let tier = Arc::new(IndexTier::new(factory.clone()));
        assert_eq!(tier.state(), TierState::Uninitialized);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tier = Arc::clone(&tier);
                tokio::spawn(async move { tier.ensure_initialized().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), TierState::Initialized);
        }
        assert_eq!(factory.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_factory_degrades() {
        let factory = Arc::new(CountingFactory {
            opens: AtomicUsize::new(0),
            fail: true,
        });
        let tier = IndexTier::new(factory.clone());

        let node = GraphNodeRecord::new(NodeInput::new("W1", EntityType::Work, Completeness::Stub));
        tier.add_node(&node).await.unwrap();
        let edge = GraphEdgeRecord::new(EdgeInput::new("W1", "A1", RelationType::Authored));
        assert!(!tier.add_edge(&edge).await.unwrap());

        assert_eq!(tier.state(), TierState::Unavailable);
        assert!(tier.get_node("W1").await.unwrap().is_none());
        assert!(tier.get_all_nodes().await.unwrap().is_empty());
        assert_eq!(tier.get_stats().await.unwrap(), IndexStats::default());
        assert!(tier
            .update_node_completeness("W1", Completeness::Full, None, None)
            .await
            .unwrap()
            .is_none());
        assert_eq!(factory.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detached_tier_is_unavailable() {
        let tier = IndexTier::detached();
        assert_eq!(tier.ensure_initialized().await, TierState::Unavailable);
        assert_eq!(tier.count_edges().await.unwrap(), 0);
        tier.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_stats() {
        let tier = IndexTier::with_store(Arc::new(MemoryStore::new()));
        tier.add_nodes(&[
            GraphNodeRecord::new(NodeInput::new("W1", EntityType::Work, Completeness::Full)),
            GraphNodeRecord::new(NodeInput::new("A1", EntityType::Author, Completeness::Stub)),
            GraphNodeRecord::new(NodeInput::new("A2", EntityType::Author, Completeness::Stub)),
        ])
        .await
        .unwrap();
        tier.add_edge(&GraphEdgeRecord::new(EdgeInput::new(
            "W1",
            "A1",
            RelationType::Authored,
        )))
        .await
        .unwrap();

        let stats = tier.get_stats().await.unwrap();
        assert_eq!(
            stats,
            IndexStats {
                node_count: 3,
                edge_count: 1,
                stub_count: 2,
                partial_count: 0,
                full_count: 1,
            }
        );

        tier.clear().await.unwrap();
        assert_eq!(tier.get_stats().await.unwrap(), IndexStats::default());
        assert_eq!(tier.state(), TierState::Initialized);
    }
}

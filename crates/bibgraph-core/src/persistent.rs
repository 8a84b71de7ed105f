//! Persistent graph.
//!
//! The consumer-facing graph. It loads the whole durable graph into memory
//! once (hydration), keeps outbound and inbound adjacency indexes for
//! O(degree) neighbour lookups, and writes every mutation through the index
//! tier before touching the in-memory cache.
//!
//! ```text
//! producer ─► PersistentGraph ─► IndexTier ─► GraphStore
//!                  │
//!                  └─► GraphCache (nodes, edges, outbound, inbound)
//!                           ▲
//! consumer ─────────────────┘  (queries, no I/O after hydration)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::filter::{matches, selects, EdgePropertyFilter};
use crate::graph::{
    timestamp_now, Completeness, EdgeInput, EntityType, GraphEdgeRecord, GraphNodeRecord,
    Metadata, NodeInput, RelationType,
};
use crate::index::{IndexStats, IndexTier, TierState};
use crate::store::{GraphStore, StoreError};

/// Errors surfaced by the persistent graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Every caller waiting on the same attempt receives the same error.
    #[error("Graph hydration failed: {0}")]
    Hydration(#[source] Arc<StoreError>),
}

/// Lifecycle of the one-time load from durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationState {
    NotStarted,
    Hydrating,
    Hydrated,
    Error,
}

/// Which incident edges a traversal follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    Outbound,
    Inbound,
    #[default]
    Both,
}

impl TraversalDirection {
    fn outbound(self) -> bool {
        matches!(self, TraversalDirection::Outbound | TraversalDirection::Both)
    }

    fn inbound(self) -> bool {
        matches!(self, TraversalDirection::Inbound | TraversalDirection::Both)
    }
}

impl std::str::FromStr for TraversalDirection {
    type Err = crate::graph::ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outbound" | "out" => Ok(TraversalDirection::Outbound),
            "inbound" | "in" => Ok(TraversalDirection::Inbound),
            "both" => Ok(TraversalDirection::Both),
            _ => Err(crate::graph::ParseKindError::new("direction", s)),
        }
    }
}

/// Options for [`PersistentGraph::get_neighbors`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborOptions {
    pub direction: TraversalDirection,
    /// Relation-type allow-list; `None` follows every type
    pub types: Option<Vec<RelationType>>,
    pub limit: Option<usize>,
}

impl NeighborOptions {
    pub fn outbound() -> Self {
        Self {
            direction: TraversalDirection::Outbound,
            ..Default::default()
        }
    }

    pub fn inbound() -> Self {
        Self {
            direction: TraversalDirection::Inbound,
            ..Default::default()
        }
    }

    pub fn with_types(mut self, types: Vec<RelationType>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Read-time snapshot of the cached graph.
///
/// `last_updated` is the time the snapshot was taken, not the time of the
/// most recent mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_completeness: BTreeMap<Completeness, usize>,
    pub nodes_by_type: BTreeMap<EntityType, usize>,
    pub edges_by_type: BTreeMap<RelationType, usize>,
    pub last_updated: DateTime<Utc>,
}

/// Nodes and the edges running between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<GraphNodeRecord>,
    pub edges: Vec<GraphEdgeRecord>,
}

// ============================================================================
// Cache
// ============================================================================

/// In-memory copy of the durable graph plus adjacency indexes.
///
/// Every edge id in `edges` sits in exactly one outbound bucket (its source)
/// and one inbound bucket (its target). Buckets never reference missing edges.
#[derive(Default)]
struct GraphCache {
    nodes: HashMap<String, GraphNodeRecord>,
    edges: HashMap<String, GraphEdgeRecord>,
    outbound: HashMap<String, HashSet<String>>,
    inbound: HashMap<String, HashSet<String>>,
}

impl GraphCache {
    fn build(nodes: Vec<GraphNodeRecord>, edges: Vec<GraphEdgeRecord>) -> Self {
        let mut cache = Self::default();
        for node in nodes {
            cache.insert_node(node);
        }
        for edge in edges {
            cache.insert_edge(edge);
        }
        cache
    }

    fn insert_node(&mut self, node: GraphNodeRecord) {
        self.outbound.entry(node.id.clone()).or_default();
        self.inbound.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    fn insert_edge(&mut self, edge: GraphEdgeRecord) {
        self.outbound
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.id.clone());
        self.inbound
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.id.clone());
        self.edges.insert(edge.id.clone(), edge);
    }

    fn remove_edge(&mut self, id: &str) -> Option<GraphEdgeRecord> {
        let edge = self.edges.remove(id)?;
        if let Some(bucket) = self.outbound.get_mut(&edge.source) {
            bucket.remove(id);
        }
        if let Some(bucket) = self.inbound.get_mut(&edge.target) {
            bucket.remove(id);
        }
        Some(edge)
    }

    /// Remove a node and every edge touching it.
    fn remove_node(&mut self, id: &str) -> Option<GraphNodeRecord> {
        let incident: Vec<String> = self
            .outbound
            .remove(id)
            .into_iter()
            .chain(self.inbound.remove(id))
            .flatten()
            .collect();
        for edge_id in incident {
            self.remove_edge(&edge_id);
        }
        self.nodes.remove(id)
    }

    fn outgoing<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a GraphEdgeRecord> + 'a {
        self.bucket(&self.outbound, id)
    }

    fn incoming<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a GraphEdgeRecord> + 'a {
        self.bucket(&self.inbound, id)
    }

    fn bucket<'a>(
        &'a self,
        index: &'a HashMap<String, HashSet<String>>,
        id: &str,
    ) -> impl Iterator<Item = &'a GraphEdgeRecord> + 'a {
        index
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }
}

// ============================================================================
// Persistent graph
// ============================================================================

type HydrationFuture = Shared<BoxFuture<'static, Result<(), Arc<StoreError>>>>;

struct GraphInner {
    tier: IndexTier,
    cache: RwLock<GraphCache>,
    state: RwLock<HydrationState>,
    in_flight: Mutex<Option<HydrationFuture>>,
    /// Serializes check → durable write → cache update
    write_gate: tokio::sync::Mutex<()>,
}

/// Write-through, adjacency-indexed graph cache.
///
/// Cloning is cheap and every clone shares the same state. Construct one per
/// application context and hand clones to consumers.
#[derive(Clone)]
pub struct PersistentGraph {
    inner: Arc<GraphInner>,
}

impl PersistentGraph {
    pub fn new(tier: IndexTier) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                tier,
                cache: RwLock::new(GraphCache::default()),
                state: RwLock::new(HydrationState::NotStarted),
                in_flight: Mutex::new(None),
                write_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Graph backed by an already-open store.
    pub fn with_store(store: Arc<dyn GraphStore>) -> Self {
        Self::new(IndexTier::with_store(store))
    }

    /// Graph with no durable backing; everything lives in memory.
    pub fn in_memory() -> Self {
        Self::new(IndexTier::detached())
    }

    pub fn hydration_state(&self) -> HydrationState {
        *self.inner.state.read()
    }

    /// Readiness of the durable tier behind this graph.
    pub fn store_state(&self) -> TierState {
        self.inner.tier.state()
    }

    /// Hydrate from the durable tier if that has not happened yet.
    ///
    /// Concurrent callers share one in-flight load. After a failure the state
    /// is [`HydrationState::Error`], the cache is empty, and the next call
    /// starts a fresh attempt.
    pub async fn initialize(&self) -> Result<(), GraphError> {
        if self.hydration_state() == HydrationState::Hydrated {
            return Ok(());
        }

        let hydration = {
            let mut slot = self.inner.in_flight.lock();
            if self.hydration_state() == HydrationState::Hydrated {
                return Ok(());
            }
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let result = inner.hydrate().await;
                        *inner.in_flight.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        hydration.await.map_err(GraphError::Hydration)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add a node, or upgrade it if the id is already known.
    ///
    /// Returns whether anything changed.
    pub async fn add_node(&self, input: NodeInput) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;
        self.inner.add_node(input).await
    }

    /// Upgrade a node's completeness and/or merge label and metadata.
    ///
    /// A no-op unless completeness strictly advances or a label/metadata
    /// payload is supplied. A lower completeness never replaces a higher one.
    /// Returns `false` for unknown ids and no-ops.
    pub async fn update_node_completeness(
        &self,
        id: &str,
        completeness: Completeness,
        label: Option<&str>,
        metadata: Option<&Metadata>,
    ) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;
        self.inner
            .update_node_completeness(id, completeness, label, metadata)
            .await
    }

    /// Record that a node's neighbourhood has been expanded.
    ///
    /// Only the first call writes; returns whether this call set the marker.
    pub async fn mark_node_expanded(&self, id: &str) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        let node = match self.inner.cache.read().nodes.get(id) {
            None => return Ok(false),
            Some(node) if node.is_expanded() => return Ok(false),
            Some(node) => node.clone(),
        };

        let stored = self.inner.tier.mark_node_expanded(id).await?;
        let updated = stored.unwrap_or_else(|| {
            let now = timestamp_now();
            GraphNodeRecord {
                expanded_at: Some(now),
                updated_at: now,
                ..node
            }
        });
        debug!("Marked {} expanded", id);
        self.inner.cache.write().insert_node(updated);
        Ok(true)
    }

    /// Add an edge unless the same `(source, target, type)` is already cached.
    pub async fn add_edge(&self, input: EdgeInput) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;
        self.inner.add_edge(input).await
    }

    /// Bulk form of [`add_node`](Self::add_node).
    ///
    /// New ids are persisted with one durable call; known ids (including
    /// repeats inside the batch) go through the single-item path. Returns the
    /// number of nodes created or changed.
    pub async fn add_nodes(&self, inputs: Vec<NodeInput>) -> Result<usize, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        let (fresh, known) = {
            let cache = self.inner.cache.read();
            let mut seen = HashSet::new();
            let mut fresh = Vec::new();
            let mut known = Vec::new();
            for input in inputs {
                if cache.nodes.contains_key(&input.id) || !seen.insert(input.id.clone()) {
                    known.push(input);
                } else {
                    fresh.push(GraphNodeRecord::new(input));
                }
            }
            (fresh, known)
        };

        let mut changed = fresh.len();
        if !fresh.is_empty() {
            self.inner.tier.add_nodes(&fresh).await?;
            let mut cache = self.inner.cache.write();
            for node in fresh {
                cache.insert_node(node);
            }
        }
        for input in known {
            if self.inner.add_node(input).await? {
                changed += 1;
            }
        }

        debug!("Bulk node add: {} created or changed", changed);
        Ok(changed)
    }

    /// Bulk form of [`add_edge`](Self::add_edge). Returns the number inserted.
    pub async fn add_edges(&self, inputs: Vec<EdgeInput>) -> Result<usize, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        let (fresh, known) = {
            let cache = self.inner.cache.read();
            let mut seen = HashSet::new();
            let mut fresh = Vec::new();
            let mut known = Vec::new();
            for input in inputs {
                let id = input.id();
                if cache.edges.contains_key(&id) || !seen.insert(id) {
                    known.push(input);
                } else {
                    fresh.push(GraphEdgeRecord::new(input));
                }
            }
            (fresh, known)
        };

        let mut inserted = fresh.len();
        if !fresh.is_empty() {
            self.inner.tier.add_edges(&fresh).await?;
            let mut cache = self.inner.cache.write();
            for edge in fresh {
                cache.insert_edge(edge);
            }
        }
        for input in known {
            if self.inner.add_edge(input).await? {
                inserted += 1;
            }
        }

        debug!("Bulk edge add: {} inserted", inserted);
        Ok(inserted)
    }

    /// Remove a node and its incident edges from store and cache.
    pub async fn remove_node(&self, id: &str) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        self.inner.tier.delete_node(id).await?;
        let removed = self.inner.cache.write().remove_node(id).is_some();
        if removed {
            debug!("Removed node {}", id);
        }
        Ok(removed)
    }

    pub async fn remove_edge(&self, id: &str) -> Result<bool, GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        self.inner.tier.delete_edge(id).await?;
        Ok(self.inner.cache.write().remove_edge(id).is_some())
    }

    /// Wipe the durable store, then the cache. The graph stays hydrated.
    pub async fn clear(&self) -> Result<(), GraphError> {
        self.initialize().await?;
        let _gate = self.inner.write_gate.lock().await;

        self.inner.tier.clear().await?;
        *self.inner.cache.write() = GraphCache::default();
        info!("Cleared graph cache");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().nodes.get(id).cloned())
    }

    pub async fn has_node(&self, id: &str) -> Result<bool, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().nodes.contains_key(id))
    }

    /// All cached nodes, in no particular order.
    pub async fn get_all_nodes(&self) -> Result<Vec<GraphNodeRecord>, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().nodes.values().cloned().collect())
    }

    pub async fn get_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, GraphError> {
        self.collect_nodes(|n| n.completeness == completeness).await
    }

    pub async fn get_nodes_by_type(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<GraphNodeRecord>, GraphError> {
        self.collect_nodes(|n| n.entity_type == entity_type).await
    }

    /// Nodes whose neighbourhood has not been expanded yet.
    pub async fn get_unexpanded_nodes(&self) -> Result<Vec<GraphNodeRecord>, GraphError> {
        self.collect_nodes(|n| !n.is_expanded()).await
    }

    async fn collect_nodes<F>(&self, predicate: F) -> Result<Vec<GraphNodeRecord>, GraphError>
    where
        F: Fn(&GraphNodeRecord) -> bool,
    {
        self.initialize().await?;
        Ok(self
            .inner
            .cache
            .read()
            .nodes
            .values()
            .filter(|&n| predicate(n))
            .cloned()
            .collect())
    }

    pub async fn get_node_count(&self) -> Result<usize, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().nodes.len())
    }

    pub async fn get_all_edges(&self) -> Result<Vec<GraphEdgeRecord>, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().edges.values().cloned().collect())
    }

    pub async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().edges.get(id).cloned())
    }

    pub async fn has_edge(&self, id: &str) -> Result<bool, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().edges.contains_key(id))
    }

    pub async fn get_edge_count(&self) -> Result<usize, GraphError> {
        self.initialize().await?;
        Ok(self.inner.cache.read().edges.len())
    }

    pub async fn get_edges_from(
        &self,
        id: &str,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, GraphError> {
        self.get_edges_by_direction(id, TraversalDirection::Outbound, relation_type, filter)
            .await
    }

    pub async fn get_edges_to(
        &self,
        id: &str,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, GraphError> {
        self.get_edges_by_direction(id, TraversalDirection::Inbound, relation_type, filter)
            .await
    }

    /// Outbound and/or inbound edges of `id`, outbound first.
    pub async fn get_edges_by_direction(
        &self,
        id: &str,
        direction: TraversalDirection,
        relation_type: Option<RelationType>,
        filter: Option<&EdgePropertyFilter>,
    ) -> Result<Vec<GraphEdgeRecord>, GraphError> {
        self.initialize().await?;
        let cache = self.inner.cache.read();

        let mut edges: Vec<GraphEdgeRecord> = Vec::new();
        if direction.outbound() {
            edges.extend(
                cache
                    .outgoing(id)
                    .filter(|e| selects(e, relation_type, filter))
                    .cloned(),
            );
        }
        if direction.inbound() {
            edges.extend(
                cache
                    .incoming(id)
                    .filter(|e| selects(e, relation_type, filter))
                    .cloned(),
            );
        }
        Ok(edges)
    }

    /// Ids of nodes adjacent to `id`, deduplicated and sorted.
    pub async fn get_neighbors(
        &self,
        id: &str,
        options: &NeighborOptions,
    ) -> Result<Vec<String>, GraphError> {
        self.initialize().await?;
        let cache = self.inner.cache.read();

        let allowed = |edge: &GraphEdgeRecord| {
            options
                .types
                .as_ref()
                .is_none_or(|types| types.contains(&edge.relation_type))
        };

        let mut neighbors = BTreeSet::new();
        if options.direction.outbound() {
            neighbors.extend(
                cache
                    .outgoing(id)
                    .filter(|&e| allowed(e))
                    .map(|e| e.target.clone()),
            );
        }
        if options.direction.inbound() {
            neighbors.extend(
                cache
                    .incoming(id)
                    .filter(|&e| allowed(e))
                    .map(|e| e.source.clone()),
            );
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(neighbors.into_iter().take(limit).collect())
    }

    /// Full scan of cached edges through the property filter.
    pub async fn get_edges_by_property(
        &self,
        filter: &EdgePropertyFilter,
    ) -> Result<Vec<GraphEdgeRecord>, GraphError> {
        self.initialize().await?;
        Ok(self
            .inner
            .cache
            .read()
            .edges
            .values()
            .filter(|e| matches(e, filter))
            .cloned()
            .collect())
    }

    /// Known nodes among `ids` and the edges with both endpoints in `ids`.
    pub async fn get_subgraph<S: AsRef<str>>(&self, ids: &[S]) -> Result<Subgraph, GraphError> {
        self.initialize().await?;
        let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let cache = self.inner.cache.read();

        let nodes = wanted
            .iter()
            .filter_map(|id| cache.nodes.get(*id))
            .cloned()
            .collect();
        let edges = wanted
            .iter()
            .flat_map(|id| cache.outgoing(id))
            .filter(|e| wanted.contains(e.target.as_str()))
            .cloned()
            .collect();

        Ok(Subgraph { nodes, edges })
    }

    /// Counts over the cached graph in a single pass.
    pub async fn get_statistics(&self) -> Result<GraphStatistics, GraphError> {
        self.initialize().await?;
        let cache = self.inner.cache.read();

        let mut nodes_by_completeness: BTreeMap<Completeness, usize> =
            Completeness::ALL.iter().map(|c| (*c, 0)).collect();
        let mut nodes_by_type = BTreeMap::new();
        for node in cache.nodes.values() {
            *nodes_by_completeness.entry(node.completeness).or_default() += 1;
            *nodes_by_type.entry(node.entity_type).or_default() += 1;
        }

        let mut edges_by_type = BTreeMap::new();
        for edge in cache.edges.values() {
            *edges_by_type.entry(edge.relation_type).or_default() += 1;
        }

        Ok(GraphStatistics {
            total_nodes: cache.nodes.len(),
            total_edges: cache.edges.len(),
            nodes_by_completeness,
            nodes_by_type,
            edges_by_type,
            last_updated: timestamp_now(),
        })
    }

    /// Counts straight from the durable store; zeroed when it is unavailable.
    pub async fn durable_stats(&self) -> Result<IndexStats, GraphError> {
        Ok(self.inner.tier.get_stats().await?)
    }
}

impl GraphInner {
    async fn hydrate(&self) -> Result<(), Arc<StoreError>> {
        *self.state.write() = HydrationState::Hydrating;
        let started = Instant::now();

        let loaded = async {
            let nodes = self.tier.get_all_nodes().await?;
            let edges = self.tier.get_all_edges(None, None).await?;
            Ok::<_, StoreError>(GraphCache::build(nodes, edges))
        }
        .await;

        match loaded {
            Ok(cache) => {
                let (nodes, edges) = (cache.nodes.len(), cache.edges.len());
                *self.cache.write() = cache;
                *self.state.write() = HydrationState::Hydrated;
                info!(
                    "Hydrated graph: {} nodes, {} edges in {:?}",
                    nodes,
                    edges,
                    started.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                *self.cache.write() = GraphCache::default();
                *self.state.write() = HydrationState::Error;
                warn!("Graph hydration failed: {}", e);
                Err(Arc::new(e))
            }
        }
    }

    /// Single-item node path. Caller holds the write gate.
    async fn add_node(&self, input: NodeInput) -> Result<bool, GraphError> {
        if self.cache.read().nodes.contains_key(&input.id) {
            return self
                .update_node_completeness(
                    &input.id,
                    input.completeness,
                    input.label.as_deref(),
                    input.metadata.as_ref(),
                )
                .await;
        }

        let node = GraphNodeRecord::new(input);
        self.tier.add_node(&node).await?;
        debug!("Added node {} ({})", node.id, node.completeness);
        self.cache.write().insert_node(node);
        Ok(true)
    }

    /// Caller holds the write gate.
    async fn update_node_completeness(
        &self,
        id: &str,
        completeness: Completeness,
        label: Option<&str>,
        metadata: Option<&Metadata>,
    ) -> Result<bool, GraphError> {
        let Some(current) = self.cache.read().nodes.get(id).cloned() else {
            return Ok(false);
        };

        let advances = completeness.upgrades(current.completeness);
        if !advances && label.is_none() && metadata.is_none() {
            return Ok(false);
        }
        let target = completeness.max(current.completeness);

        let stored = self
            .tier
            .update_node_completeness(id, target, label, metadata)
            .await?;
        let updated =
            stored.unwrap_or_else(|| current.with_update(target, label, metadata, timestamp_now()));

        debug!("Updated node {}: {} -> {}", id, current.completeness, updated.completeness);
        self.cache.write().insert_node(updated);
        Ok(true)
    }

    /// Single-item edge path. Caller holds the write gate.
    async fn add_edge(&self, input: EdgeInput) -> Result<bool, GraphError> {
        let edge = GraphEdgeRecord::new(input);
        if self.cache.read().edges.contains_key(&edge.id) {
            return Ok(false);
        }

        self.tier.add_edge(&edge).await?;
        debug!(
            "Added edge {} -[{}]-> {}",
            edge.source, edge.relation_type, edge.target
        );
        self.cache.write().insert_edge(edge);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AuthorPosition, EdgeProperties};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn work(id: &str, completeness: Completeness) -> NodeInput {
        NodeInput::new(id, EntityType::Work, completeness)
    }

    #[test]
    fn test_cache_adjacency_invariant() {
        let mut cache = GraphCache::default();
        cache.insert_node(GraphNodeRecord::new(work("W1", Completeness::Stub)));
        let edge = GraphEdgeRecord::new(EdgeInput::new("W1", "A1", RelationType::Authored));
        let edge_id = edge.id.clone();
        cache.insert_edge(edge);

        assert!(cache.outbound["W1"].contains(&edge_id));
        assert!(cache.inbound["A1"].contains(&edge_id));

        cache.remove_node("A1");
        assert!(cache.edges.is_empty());
        assert!(cache.outbound["W1"].is_empty());
        assert!(cache.nodes.contains_key("W1"));
    }

    #[tokio::test]
    async fn test_add_node_reroutes_to_update() {
        let graph = PersistentGraph::in_memory();
        assert!(graph.add_node(work("W1", Completeness::Stub)).await.unwrap());
        assert!(graph
            .add_node(work("W1", Completeness::Partial).with_label("Deep Learning"))
            .await
            .unwrap());
        assert!(!graph.add_node(work("W1", Completeness::Stub)).await.unwrap());

        let node = graph.get_node("W1").await.unwrap().unwrap();
        assert_eq!(node.completeness, Completeness::Partial);
        assert_eq!(node.label.as_deref(), Some("Deep Learning"));
        assert_eq!(graph.get_node_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lower_completeness_with_label_keeps_max() {
        let graph = PersistentGraph::in_memory();
        graph.add_node(work("W1", Completeness::Full)).await.unwrap();

        let changed = graph
            .update_node_completeness("W1", Completeness::Stub, Some("Renamed"), None)
            .await
            .unwrap();
        assert!(changed);

        let node = graph.get_node("W1").await.unwrap().unwrap();
        assert_eq!(node.completeness, Completeness::Full);
        assert_eq!(node.label.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_neighbors_respect_direction_and_types() {
        let graph = PersistentGraph::in_memory();
        graph
            .add_edges(vec![
                EdgeInput::new("W1", "A1", RelationType::Authored),
                EdgeInput::new("W1", "S1", RelationType::PublishedIn),
                EdgeInput::new("W0", "W1", RelationType::References),
                EdgeInput::new("W1", "A1", RelationType::Related),
            ])
            .await
            .unwrap();

        let both = graph
            .get_neighbors("W1", &NeighborOptions::default())
            .await
            .unwrap();
        assert_eq!(both, vec!["A1", "S1", "W0"]);

        let outbound = graph
            .get_neighbors("W1", &NeighborOptions::outbound())
            .await
            .unwrap();
        assert_eq!(outbound, vec!["A1", "S1"]);

        let inbound = graph
            .get_neighbors("W1", &NeighborOptions::inbound())
            .await
            .unwrap();
        assert_eq!(inbound, vec!["W0"]);

        let typed = graph
            .get_neighbors(
                "W1",
                &NeighborOptions::default()
                    .with_types(vec![RelationType::Authored, RelationType::Related]),
            )
            .await
            .unwrap();
        assert_eq!(typed, vec!["A1"]);

        let limited = graph
            .get_neighbors("W1", &NeighborOptions::default().with_limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_add_collapses_duplicates() {
        let graph = PersistentGraph::with_store(Arc::new(MemoryStore::new()));
        let changed = graph
            .add_nodes(vec![
                work("W1", Completeness::Stub),
                work("W2", Completeness::Stub),
                work("W1", Completeness::Full),
            ])
            .await
            .unwrap();
        assert_eq!(changed, 3);
        assert_eq!(graph.get_node_count().await.unwrap(), 2);
        assert_eq!(
            graph.get_node("W1").await.unwrap().unwrap().completeness,
            Completeness::Full
        );

        let inserted = graph
            .add_edges(vec![
                EdgeInput::new("W1", "W2", RelationType::References),
                EdgeInput::new("W1", "W2", RelationType::References),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(graph.durable_stats().await.unwrap().edge_count, 1);
    }

    #[tokio::test]
    async fn test_edges_by_direction_and_property() {
        let graph = PersistentGraph::in_memory();
        graph
            .add_edge(
                EdgeInput::new("W1", "A1", RelationType::Authored).with_properties(EdgeProperties {
                    author_position: Some(AuthorPosition::First),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        graph
            .add_edge(EdgeInput::new("W2", "W1", RelationType::References))
            .await
            .unwrap();

        let both = graph
            .get_edges_by_direction("W1", TraversalDirection::Both, None, None)
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].target, "A1");

        let filter = EdgePropertyFilter {
            author_position: Some(AuthorPosition::First),
            ..Default::default()
        };
        let first_authors = graph.get_edges_by_property(&filter).await.unwrap();
        assert_eq!(first_authors.len(), 1);

        let typed = graph
            .get_edges_to("W1", Some(RelationType::Authored), None)
            .await
            .unwrap();
        assert!(typed.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let graph = PersistentGraph::with_store(Arc::new(MemoryStore::new()));
        graph.add_node(work("W1", Completeness::Stub)).await.unwrap();
        graph.add_node(work("W2", Completeness::Stub)).await.unwrap();
        graph
            .add_edge(EdgeInput::new("W1", "W2", RelationType::References))
            .await
            .unwrap();

        assert!(graph.remove_node("W2").await.unwrap());
        assert_eq!(graph.get_edge_count().await.unwrap(), 0);
        assert!(graph
            .get_neighbors("W1", &NeighborOptions::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(graph.durable_stats().await.unwrap().edge_count, 0);

        graph.clear().await.unwrap();
        assert_eq!(graph.get_node_count().await.unwrap(), 0);
        assert_eq!(graph.hydration_state(), HydrationState::Hydrated);
        assert_eq!(graph.durable_stats().await.unwrap(), IndexStats::default());
    }

    #[tokio::test]
    async fn test_statistics() {
        let graph = PersistentGraph::in_memory();
        graph.add_node(work("W1", Completeness::Full)).await.unwrap();
        graph
            .add_node(NodeInput::new("A1", EntityType::Author, Completeness::Stub))
            .await
            .unwrap();
        graph
            .add_edge(EdgeInput::new("W1", "A1", RelationType::Authored))
            .await
            .unwrap();

        let stats = graph.get_statistics().await.unwrap();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.total_edges, 1);
        assert_eq!(stats.nodes_by_completeness[&Completeness::Full], 1);
        assert_eq!(stats.nodes_by_completeness[&Completeness::Partial], 0);
        assert_eq!(stats.nodes_by_type[&EntityType::Author], 1);
        assert_eq!(stats.edges_by_type[&RelationType::Authored], 1);

        let later = graph.get_statistics().await.unwrap();
        assert!(later.last_updated >= stats.last_updated);
    }
}

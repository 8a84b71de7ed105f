//! Common test utilities for integration tests.
//!
//! Store wrappers that count and fail calls, shared across the persistent
//! graph test files.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bibgraph_core::{
    Completeness, GraphEdgeRecord, GraphNodeRecord, GraphStore, MemoryStore, StoreError,
    StoreFactory,
};

/// Memory store that counts loads and writes and can be told to fail either.
///
/// `all_nodes` sleeps briefly so concurrent callers pile up behind the first
/// hydration attempt.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    loads: AtomicUsize,
    failing_loads: AtomicUsize,
    writes: AtomicUsize,
    failing_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` calls to `all_nodes` fail.
    pub fn fail_next_loads(&self, n: usize) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Make every node/edge write fail until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.failing_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `all_nodes` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of node/edge write calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn wrote(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for CountingStore {
    async fn count_nodes(&self) -> Result<usize, StoreError> {
        self.inner.count_nodes().await
    }

    async fn count_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<usize, StoreError> {
        self.inner.count_nodes_by_completeness(completeness).await
    }

    async fn count_edges(&self) -> Result<usize, StoreError> {
        self.inner.count_edges().await
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
        self.inner.get_node(id).await
    }

    async fn put_node(&self, node: &GraphNodeRecord) -> Result<(), StoreError> {
        self.wrote()?;
        self.inner.put_node(node).await
    }

    async fn put_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), StoreError> {
        self.wrote()?;
        self.inner.put_nodes(nodes).await
    }

    async fn delete_node(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_node(id).await
    }

    async fn all_nodes(&self) -> Result<Vec<GraphNodeRecord>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::unavailable("injected load failure"));
        }
        self.inner.all_nodes().await
    }

    async fn nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, StoreError> {
        self.inner.nodes_by_completeness(completeness).await
    }

    async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError> {
        self.inner.get_edge(id).await
    }

    async fn insert_edge(&self, edge: &GraphEdgeRecord) -> Result<bool, StoreError> {
        self.wrote()?;
        self.inner.insert_edge(edge).await
    }

    async fn put_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), StoreError> {
        self.wrote()?;
        self.inner.put_edges(edges).await
    }

    async fn delete_edges(&self, ids: &[String]) -> Result<usize, StoreError> {
        self.inner.delete_edges(ids).await
    }

    async fn all_edges(&self) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        self.inner.all_edges().await
    }

    async fn edges_from(&self, source: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        self.inner.edges_from(source).await
    }

    async fn edges_to(&self, target: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        self.inner.edges_to(target).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

/// Factory whose store can never be opened.
pub struct FailingFactory;

#[async_trait]
impl StoreFactory for FailingFactory {
    async fn open(&self) -> Result<Arc<dyn GraphStore>, StoreError> {
        Err(StoreError::unavailable("database blocked"))
    }
}

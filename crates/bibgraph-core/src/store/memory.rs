//! In-memory binding of the graph store.
//!
//! Holds both tables in hash maps behind one lock, which makes `clear` and
//! the bulk operations trivially atomic. Used by tests and by sessions that
//! do not need durability.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{GraphStore, StoreError};
use crate::graph::{Completeness, GraphEdgeRecord, GraphNodeRecord};

#[derive(Default)]
struct Tables {
    nodes: HashMap<String, GraphNodeRecord>,
    edges: HashMap<String, GraphEdgeRecord>,
}

/// Graph store that keeps everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn count_nodes(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().nodes.len())
    }

    async fn count_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<usize, StoreError> {
        Ok(self
            .tables
            .read()
            .nodes
            .values()
            .filter(|n| n.completeness == completeness)
            .count())
    }

    async fn count_edges(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().edges.len())
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
        Ok(self.tables.read().nodes.get(id).cloned())
    }

    async fn put_node(&self, node: &GraphNodeRecord) -> Result<(), StoreError> {
        self.tables
            .write()
            .nodes
            .insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn put_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for node in nodes {
            tables.nodes.insert(node.id.clone(), node.clone());
        }
        Ok(())
    }

    async fn delete_node(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.write().nodes.remove(id).is_some())
    }

    async fn all_nodes(&self) -> Result<Vec<GraphNodeRecord>, StoreError> {
        Ok(self.tables.read().nodes.values().cloned().collect())
    }

    async fn nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .nodes
            .values()
            .filter(|n| n.completeness == completeness)
            .cloned()
            .collect())
    }

    async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError> {
        Ok(self.tables.read().edges.get(id).cloned())
    }

    async fn insert_edge(&self, edge: &GraphEdgeRecord) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if tables.edges.contains_key(&edge.id) {
            return Ok(false);
        }
        tables.edges.insert(edge.id.clone(), edge.clone());
        Ok(true)
    }

    async fn put_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for edge in edges {
            tables.edges.insert(edge.id.clone(), edge.clone());
        }
        Ok(())
    }

    async fn delete_edges(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        Ok(ids
            .iter()
            .filter(|id| tables.edges.remove(id.as_str()).is_some())
            .count())
    }

    async fn all_edges(&self) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        Ok(self.tables.read().edges.values().cloned().collect())
    }

    async fn edges_from(&self, source: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .edges
            .values()
            .filter(|e| e.source == source)
            .cloned()
            .collect())
    }

    async fn edges_to(&self, target: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .edges
            .values()
            .filter(|e| e.target == target)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.nodes.clear();
        tables.edges.clear();
        Ok(())
    }
}

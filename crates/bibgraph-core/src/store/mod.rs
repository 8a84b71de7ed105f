//! Durable store contract.
//!
//! The persistent graph never talks to a storage engine directly. It goes
//! through the index tier, which in turn drives an implementation of
//! [`GraphStore`]. Any engine that provides the operations below is a valid
//! binding:
//!
//! ```text
//! GraphStore
//! ├── nodes table   (keyed by id, secondary index on completeness)
//! ├── edges table   (keyed by derived edge id, indexed by source/target)
//! ├── bulk upsert   (nodes, edges)
//! └── clear         (both tables, atomically)
//! ```
//!
//! Two bindings ship with the crate: [`SqliteStore`] for on-disk persistence
//! and [`MemoryStore`] for tests and ephemeral sessions.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use schema::STORE_SCHEMA_VERSION;
pub use sqlite::{SqliteStore, SqliteStoreFactory};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::graph::{Completeness, GraphEdgeRecord, GraphNodeRecord};

/// Errors raised by a durable store binding
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: String, found: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value in column '{column}': {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A blocking store call panicked or was cancelled
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Create an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Persistence contract for graph records.
///
/// Implementations must be safe to share between tasks. Bulk `put_*` calls
/// overwrite rows with matching ids; [`insert_edge`](GraphStore::insert_edge)
/// never does.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Count all node rows.
    async fn count_nodes(&self) -> Result<usize, StoreError>;

    /// Count node rows at the given completeness level.
    async fn count_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<usize, StoreError>;

    /// Count all edge rows.
    async fn count_edges(&self) -> Result<usize, StoreError>;

    /// Fetch a node by id.
    async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError>;

    /// Insert or replace a node.
    async fn put_node(&self, node: &GraphNodeRecord) -> Result<(), StoreError>;

    /// Insert or replace a batch of nodes.
    async fn put_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), StoreError>;

    /// Delete a node row. Returns whether a row was removed.
    async fn delete_node(&self, id: &str) -> Result<bool, StoreError>;

    /// All node rows.
    async fn all_nodes(&self) -> Result<Vec<GraphNodeRecord>, StoreError>;

    /// Node rows at the given completeness level.
    async fn nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, StoreError>;

    /// Fetch an edge by its derived id.
    async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError>;

    /// Insert an edge unless a row with the same id exists.
    ///
    /// Returns `true` when the row was inserted.
    async fn insert_edge(&self, edge: &GraphEdgeRecord) -> Result<bool, StoreError>;

    /// Insert or replace a batch of edges.
    async fn put_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), StoreError>;

    /// Delete edge rows by id. Returns the number of rows removed.
    async fn delete_edges(&self, ids: &[String]) -> Result<usize, StoreError>;

    /// All edge rows.
    async fn all_edges(&self) -> Result<Vec<GraphEdgeRecord>, StoreError>;

    /// Edge rows whose source is `source`.
    async fn edges_from(&self, source: &str) -> Result<Vec<GraphEdgeRecord>, StoreError>;

    /// Edge rows whose target is `target`.
    async fn edges_to(&self, target: &str) -> Result<Vec<GraphEdgeRecord>, StoreError>;

    /// Empty both tables in one atomic step.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Opens a durable store on demand.
///
/// The index tier calls [`open`](StoreFactory::open) lazily on first use, so a
/// missing or broken store only surfaces as degraded mode, never as a
/// construction failure.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn GraphStore>, StoreError>;
}

/// Factory that hands out an already-open store.
pub struct StaticStore(Arc<dyn GraphStore>);

impl StaticStore {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self(store)
    }
}

#[async_trait]
impl StoreFactory for StaticStore {
    async fn open(&self) -> Result<Arc<dyn GraphStore>, StoreError> {
        Ok(Arc::clone(&self.0))
    }
}

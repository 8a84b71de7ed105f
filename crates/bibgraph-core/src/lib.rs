//! bibgraph Core - persistent bibliographic graph cache
//!
//! This crate provides the core functionality for accumulating an entity graph
//! discovered incrementally and serving traversal queries over it:
//! - Node and edge records with deterministic edge identity
//! - A durable store contract with SQLite and in-memory bindings
//! - An index tier that degrades to no-ops when no store is reachable
//! - A write-through, adjacency-indexed in-memory graph

pub mod filter;
pub mod graph;
pub mod index;
pub mod ops;
pub mod persistent;
pub mod store;

// Re-exports for convenience
pub use filter::{apply_edge_filter, matches, EdgePropertyFilter};
pub use graph::{
    edge_id, timestamp_now, AuthorPosition, Completeness, EdgeDirection, EdgeInput,
    EdgeProperties, EntityType, GraphEdgeRecord, GraphNodeRecord, Metadata, NodeInput,
    ParseKindError, RelationType,
};
pub use index::{IndexStats, IndexTier, TierState};
pub use persistent::{
    GraphError, GraphStatistics, HydrationState, NeighborOptions, PersistentGraph, Subgraph,
    TraversalDirection,
};
pub use store::{
    GraphStore, MemoryStore, SqliteStore, SqliteStoreFactory, StaticStore, StoreError,
    StoreFactory, STORE_SCHEMA_VERSION,
};

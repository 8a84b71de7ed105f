//! SQLite Schema Definitions for the Graph Store
//!
//! One database file holds the whole cached graph: a nodes table, an edges
//! table and a small metadata table carrying the schema version.

/// Schema version for graph store databases
pub const STORE_SCHEMA_VERSION: &str = "1.0";

/// SQL to create the nodes table
///
/// Timestamps are Unix milliseconds. `metadata_json` is NULL when the
/// metadata bag is empty.
pub const SCHEMA_CREATE_NODES: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    -- Opaque entity identifier
    id TEXT PRIMARY KEY NOT NULL,

    -- Entity kind (work, author, source, ...)
    entity_type TEXT NOT NULL,

    -- stub | partial | full
    completeness TEXT NOT NULL,

    label TEXT,

    discovered_at INTEGER NOT NULL,
    expanded_at INTEGER,
    updated_at INTEGER NOT NULL,

    metadata_json TEXT
)
"#;

/// SQL to create the edges table
///
/// `id` is the hash of `(source, target, relation_type)`, which makes the
/// triple unique without a separate constraint. Sparse edge properties are
/// stored as one JSON object.
pub const SCHEMA_CREATE_EDGES: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY NOT NULL,

    source TEXT NOT NULL,
    target TEXT NOT NULL,

    relation_type TEXT NOT NULL,

    -- directed | undirected
    direction TEXT NOT NULL,

    discovered_at INTEGER NOT NULL,

    properties_json TEXT
)
"#;

/// SQL to create indexes for efficient queries
pub const SCHEMA_CREATE_INDEXES: &str = r#"
-- Completeness buckets (stats, expansion frontier)
CREATE INDEX IF NOT EXISTS idx_nodes_completeness ON nodes(completeness);

-- Entity type filtering
CREATE INDEX IF NOT EXISTS idx_nodes_entity_type ON nodes(entity_type);

-- Outgoing / incoming edge queries
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);

-- Relationship filtering
CREATE INDEX IF NOT EXISTS idx_edges_relation_type ON edges(relation_type);
"#;

/// SQL to create the metadata table
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS store_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Column names for node queries (in order for row mapping)
pub const NODE_COLUMNS: &str =
    "id, entity_type, completeness, label, discovered_at, expanded_at, updated_at, metadata_json";

/// Column names for edge queries (in order for row mapping)
pub const EDGE_COLUMNS: &str =
    "id, source, target, relation_type, direction, discovered_at, properties_json";

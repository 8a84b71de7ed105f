//! SQLite binding of the graph store.
//!
//! A thin wrapper around a single rusqlite connection. rusqlite is blocking,
//! so every call moves its statements onto tokio's blocking pool and holds
//! the connection lock only while they run there.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::debug;

use super::schema::{
    EDGE_COLUMNS, NODE_COLUMNS, SCHEMA_CREATE_EDGES, SCHEMA_CREATE_INDEXES,
    SCHEMA_CREATE_METADATA, SCHEMA_CREATE_NODES, STORE_SCHEMA_VERSION,
};
use super::{GraphStore, StoreError, StoreFactory};
use crate::graph::{
    Completeness, EdgeProperties, GraphEdgeRecord, GraphNodeRecord, Metadata,
};

/// Graph store backed by one SQLite database
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a store database, creating the file and schema if needed
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        let store = Self::initialize(conn)?;
        debug!("Opened graph store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    /// Create the schema if missing and check the stored schema version
    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA_CREATE_NODES, [])?;
        conn.execute(SCHEMA_CREATE_EDGES, [])?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;
        conn.execute_batch(SCHEMA_CREATE_INDEXES)?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM store_metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match version {
            Some(v) if v == STORE_SCHEMA_VERSION => {}
            Some(found) => {
                return Err(StoreError::SchemaVersionMismatch {
                    expected: STORE_SCHEMA_VERSION.to_string(),
                    found,
                });
            }
            None => {
                conn.execute(
                    "INSERT INTO store_metadata (key, value) VALUES ('schema_version', ?1)",
                    [STORE_SCHEMA_VERSION],
                )?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure connection with optimal settings
    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        // WAL keeps readers unblocked while a bulk upsert is running
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Negative value = KB
        conn.pragma_update(None, "cache_size", -32000)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await?
    }
}

fn query_nodes<P: rusqlite::Params>(
    conn: &Connection,
    where_clause: &str,
    params: P,
) -> Result<Vec<GraphNodeRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes {where_clause}"))?;
    let rows = stmt
        .query_map(params, NodeRow::read)?
        .collect::<SqliteResult<Vec<_>>>()?;
    rows.into_iter().map(NodeRow::into_record).collect()
}

fn query_edges<P: rusqlite::Params>(
    conn: &Connection,
    where_clause: &str,
    params: P,
) -> Result<Vec<GraphEdgeRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {EDGE_COLUMNS} FROM edges {where_clause}"))?;
    let rows = stmt
        .query_map(params, EdgeRow::read)?
        .collect::<SqliteResult<Vec<_>>>()?;
    rows.into_iter().map(EdgeRow::into_record).collect()
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(count as usize)
}

const UPSERT_NODE: &str = r#"
INSERT OR REPLACE INTO nodes
    (id, entity_type, completeness, label, discovered_at, expanded_at, updated_at, metadata_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

const INSERT_EDGE_IF_ABSENT: &str = r#"
INSERT OR IGNORE INTO edges
    (id, source, target, relation_type, direction, discovered_at, properties_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

const UPSERT_EDGE: &str = r#"
INSERT OR REPLACE INTO edges
    (id, source, target, relation_type, direction, discovered_at, properties_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

fn metadata_json(metadata: &Metadata) -> Result<Option<String>, StoreError> {
    if metadata.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(metadata)?))
    }
}

fn properties_json(properties: &EdgeProperties) -> Result<Option<String>, StoreError> {
    if properties.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(properties)?))
    }
}

fn execute_node(stmt: &mut rusqlite::Statement<'_>, node: &GraphNodeRecord) -> Result<(), StoreError> {
    stmt.execute(params![
        node.id,
        node.entity_type.as_str(),
        node.completeness.as_str(),
        node.label,
        node.discovered_at.timestamp_millis(),
        node.expanded_at.map(|t| t.timestamp_millis()),
        node.updated_at.timestamp_millis(),
        metadata_json(&node.metadata)?,
    ])?;
    Ok(())
}

fn execute_edge(
    stmt: &mut rusqlite::Statement<'_>,
    edge: &GraphEdgeRecord,
) -> Result<usize, StoreError> {
    let changed = stmt.execute(params![
        edge.id,
        edge.source,
        edge.target,
        edge.relation_type.as_str(),
        edge.direction.as_str(),
        edge.discovered_at.timestamp_millis(),
        properties_json(&edge.properties)?,
    ])?;
    Ok(changed)
}

fn millis_to_datetime(column: &'static str, millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| StoreError::InvalidValue {
        column,
        value: millis.to_string(),
    })
}

fn parse_column<T: std::str::FromStr>(column: &'static str, value: String) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::InvalidValue { column, value })
}

/// Raw node row, converted to a record outside the rusqlite row closure so
/// that enum and timestamp decoding can report a [`StoreError`].
struct NodeRow {
    id: String,
    entity_type: String,
    completeness: String,
    label: Option<String>,
    discovered_at: i64,
    expanded_at: Option<i64>,
    updated_at: i64,
    metadata_json: Option<String>,
}

impl NodeRow {
    fn read(row: &rusqlite::Row<'_>) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            completeness: row.get(2)?,
            label: row.get(3)?,
            discovered_at: row.get(4)?,
            expanded_at: row.get(5)?,
            updated_at: row.get(6)?,
            metadata_json: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<GraphNodeRecord, StoreError> {
        let metadata = match self.metadata_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Metadata::new(),
        };
        Ok(GraphNodeRecord {
            id: self.id,
            entity_type: parse_column("entity_type", self.entity_type)?,
            completeness: parse_column("completeness", self.completeness)?,
            label: self.label,
            discovered_at: millis_to_datetime("discovered_at", self.discovered_at)?,
            expanded_at: self
                .expanded_at
                .map(|ms| millis_to_datetime("expanded_at", ms))
                .transpose()?,
            updated_at: millis_to_datetime("updated_at", self.updated_at)?,
            metadata,
        })
    }
}

struct EdgeRow {
    id: String,
    source: String,
    target: String,
    relation_type: String,
    direction: String,
    discovered_at: i64,
    properties_json: Option<String>,
}

impl EdgeRow {
    fn read(row: &rusqlite::Row<'_>) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            source: row.get(1)?,
            target: row.get(2)?,
            relation_type: row.get(3)?,
            direction: row.get(4)?,
            discovered_at: row.get(5)?,
            properties_json: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<GraphEdgeRecord, StoreError> {
        let properties = match self.properties_json {
            Some(json) => serde_json::from_str(&json)?,
            None => EdgeProperties::default(),
        };
        Ok(GraphEdgeRecord {
            id: self.id,
            source: self.source,
            target: self.target,
            relation_type: parse_column("relation_type", self.relation_type)?,
            direction: parse_column("direction", self.direction)?,
            discovered_at: millis_to_datetime("discovered_at", self.discovered_at)?,
            properties,
        })
    }
}


#[async_trait]
impl GraphStore for SqliteStore {
    async fn count_nodes(&self) -> Result<usize, StoreError> {
        self.run(|conn| count(conn, "SELECT COUNT(*) FROM nodes", []))
            .await
    }

    async fn count_nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<usize, StoreError> {
        self.run(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM nodes WHERE completeness = ?1",
                [completeness.as_str()],
            )
        })
        .await
    }

    async fn count_edges(&self) -> Result<usize, StoreError> {
        self.run(|conn| count(conn, "SELECT COUNT(*) FROM edges", []))
            .await
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNodeRecord>, StoreError> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
                [&id],
                NodeRow::read,
            )
            .optional()?
            .map(NodeRow::into_record)
            .transpose()
        })
        .await
    }

    async fn put_node(&self, node: &GraphNodeRecord) -> Result<(), StoreError> {
        let node = node.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(UPSERT_NODE)?;
            execute_node(&mut stmt, &node)
        })
        .await
    }

    async fn put_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), StoreError> {
        let nodes = nodes.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_NODE)?;
                for node in &nodes {
                    execute_node(&mut stmt, node)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_node(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.run(move |conn| Ok(conn.execute("DELETE FROM nodes WHERE id = ?1", [&id])? > 0))
            .await
    }

    async fn all_nodes(&self) -> Result<Vec<GraphNodeRecord>, StoreError> {
        self.run(|conn| query_nodes(conn, "", [])).await
    }

    async fn nodes_by_completeness(
        &self,
        completeness: Completeness,
    ) -> Result<Vec<GraphNodeRecord>, StoreError> {
        self.run(move |conn| {
            query_nodes(conn, "WHERE completeness = ?1", [completeness.as_str()])
        })
        .await
    }

    async fn get_edge(&self, id: &str) -> Result<Option<GraphEdgeRecord>, StoreError> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {EDGE_COLUMNS} FROM edges WHERE id = ?1"),
                [&id],
                EdgeRow::read,
            )
            .optional()?
            .map(EdgeRow::into_record)
            .transpose()
        })
        .await
    }

    async fn insert_edge(&self, edge: &GraphEdgeRecord) -> Result<bool, StoreError> {
        let edge = edge.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(INSERT_EDGE_IF_ABSENT)?;
            Ok(execute_edge(&mut stmt, &edge)? > 0)
        })
        .await
    }

    async fn put_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), StoreError> {
        let edges = edges.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_EDGE)?;
                for edge in &edges {
                    execute_edge(&mut stmt, edge)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_edges(&self, ids: &[String]) -> Result<usize, StoreError> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM edges WHERE id = ?1")?;
                for id in &ids {
                    deleted += stmt.execute([id])?;
                }
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    async fn all_edges(&self) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        self.run(|conn| query_edges(conn, "", [])).await
    }

    async fn edges_from(&self, source: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        let source = source.to_string();
        self.run(move |conn| query_edges(conn, "WHERE source = ?1", [&source]))
            .await
    }

    async fn edges_to(&self, target: &str) -> Result<Vec<GraphEdgeRecord>, StoreError> {
        let target = target.to_string();
        self.run(move |conn| query_edges(conn, "WHERE target = ?1", [&target]))
            .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM edges", [])?;
            tx.execute("DELETE FROM nodes", [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Opens a [`SqliteStore`] at a fixed path when first asked.
#[derive(Debug, Clone)]
pub struct SqliteStoreFactory {
    path: PathBuf,
}

impl SqliteStoreFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    async fn open(&self) -> Result<Arc<dyn GraphStore>, StoreError> {
        let path = self.path.clone();
        let store = tokio::task::spawn_blocking(move || SqliteStore::open(&path)).await??;
        Ok(Arc::new(store))
    }
}

//! CRUD operations over a durable store.
//!
//! These functions form a thin, unopinionated layer over [`GraphStore`]:
//! they build and persist records but enforce no cache-level policy such as
//! the completeness upgrade rule. That policy lives in the persistent graph.
//!
//! [`GraphStore`]: crate::store::GraphStore

pub mod edges;
pub mod nodes;

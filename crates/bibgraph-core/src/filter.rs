//! Property-based edge filtering.
//!
//! A pure predicate shared by the index tier and the in-memory graph. Only the
//! filter fields that are set take part in the match; they are combined with
//! logical AND.

use serde::{Deserialize, Serialize};

use crate::graph::{AuthorPosition, GraphEdgeRecord, RelationType};

/// Constraints on the sparse properties of an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgePropertyFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_position: Option<AuthorPosition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_corresponding: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_open_access: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Inclusive lower bound on `score`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_min: Option<f64>,

    /// Inclusive upper bound on `score`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_max: Option<f64>,

    /// Edge must cover at least one of these years. Empty means unconstrained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_include: Option<Vec<i32>>,
}

impl EdgePropertyFilter {
    /// Check if the filter constrains nothing
    pub fn is_empty(&self) -> bool {
        self.author_position.is_none()
            && self.is_corresponding.is_none()
            && self.is_open_access.is_none()
            && self.version.is_none()
            && self.award_id.is_none()
            && self.role.is_none()
            && self.score_min.is_none()
            && self.score_max.is_none()
            && self.years_include.as_ref().is_none_or(|y| y.is_empty())
    }
}

/// Equality check that passes when the filter value is absent.
fn field_matches<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
    match wanted {
        Some(wanted) => actual.as_ref() == Some(wanted),
        None => true,
    }
}

/// Evaluate `filter` against a single edge.
pub fn matches(edge: &GraphEdgeRecord, filter: &EdgePropertyFilter) -> bool {
    let props = &edge.properties;

    if !field_matches(&filter.author_position, &props.author_position)
        || !field_matches(&filter.is_corresponding, &props.is_corresponding)
        || !field_matches(&filter.is_open_access, &props.is_open_access)
        || !field_matches(&filter.version, &props.version)
        || !field_matches(&filter.award_id, &props.award_id)
        || !field_matches(&filter.role, &props.role)
    {
        return false;
    }

    if filter.score_min.is_some() || filter.score_max.is_some() {
        let Some(score) = props.score else {
            return false;
        };
        if filter.score_min.is_some_and(|min| score < min) {
            return false;
        }
        if filter.score_max.is_some_and(|max| score > max) {
            return false;
        }
    }

    if let Some(wanted) = filter.years_include.as_ref().filter(|y| !y.is_empty()) {
        let covered = props
            .years
            .as_ref()
            .is_some_and(|years| years.iter().any(|year| wanted.contains(year)));
        if !covered {
            return false;
        }
    }

    true
}

/// Combined relation-type and property check used by edge queries.
///
/// `None` for either argument means "no constraint".
pub fn selects(
    edge: &GraphEdgeRecord,
    relation_type: Option<RelationType>,
    filter: Option<&EdgePropertyFilter>,
) -> bool {
    relation_type.is_none_or(|t| edge.relation_type == t) && filter.is_none_or(|f| matches(edge, f))
}

/// Batch form of [`matches`], keeping edges in their original order.
pub fn apply_edge_filter(
    edges: Vec<GraphEdgeRecord>,
    filter: &EdgePropertyFilter,
) -> Vec<GraphEdgeRecord> {
    edges.into_iter().filter(|e| matches(e, filter)).collect()
}

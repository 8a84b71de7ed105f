//! Graph record definitions for the bibliographic entity graph.
//!
//! This module defines the node and edge records persisted by the durable
//! store and held in the in-memory cache, together with the small enums that
//! classify them (entity kinds, relation kinds, completeness levels).
//!
//! Edge identity is derived from the `(source, target, relation type)` triple,
//! so discovering the same relationship twice always yields the same record id.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Opaque key/value bag attached to nodes and edges.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Current time truncated to millisecond precision.
///
/// Stored timestamps are kept as Unix milliseconds, so records are created at
/// that precision to survive a store round trip unchanged.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Error returned when parsing one of the graph enums from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl ParseKindError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Entity Types
// ============================================================================

/// Kinds of bibliographic entities represented as graph vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Work,
    Author,
    Source,
    Institution,
    Topic,
    Concept,
    Publisher,
    Funder,
    Keyword,
    Domain,
    Field,
    Subfield,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [EntityType; 12] = [
        EntityType::Work,
        EntityType::Author,
        EntityType::Source,
        EntityType::Institution,
        EntityType::Topic,
        EntityType::Concept,
        EntityType::Publisher,
        EntityType::Funder,
        EntityType::Keyword,
        EntityType::Domain,
        EntityType::Field,
        EntityType::Subfield,
    ];

    /// Get the string representation used in storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Work => "work",
            EntityType::Author => "author",
            EntityType::Source => "source",
            EntityType::Institution => "institution",
            EntityType::Topic => "topic",
            EntityType::Concept => "concept",
            EntityType::Publisher => "publisher",
            EntityType::Funder => "funder",
            EntityType::Keyword => "keyword",
            EntityType::Domain => "domain",
            EntityType::Field => "field",
            EntityType::Subfield => "subfield",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        // Accept the plural collection names as well ("works", "authors", ...)
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || t.as_str() == singular)
            .ok_or_else(|| ParseKindError::new("entity type", s))
    }
}

// ============================================================================
// Completeness
// ============================================================================

/// How much is known about a node.
///
/// Totally ordered: `Stub < Partial < Full`. The derived `Ord` follows the
/// declaration order, which is what the upgrade-only rule relies on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// Only the identifier is known
    #[default]
    Stub,
    /// Some fields are known (e.g. embedded in another entity's payload)
    Partial,
    /// The entity has been fetched in full
    Full,
}

impl Completeness {
    /// All completeness levels, lowest first.
    pub const ALL: [Completeness; 3] = [
        Completeness::Stub,
        Completeness::Partial,
        Completeness::Full,
    ];

    /// Get the string representation used in storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Stub => "stub",
            Completeness::Partial => "partial",
            Completeness::Full => "full",
        }
    }

    /// Whether moving from `current` to `self` is a strict upgrade.
    pub fn upgrades(self, current: Completeness) -> bool {
        self > current
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Completeness {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stub" => Ok(Completeness::Stub),
            "partial" => Ok(Completeness::Partial),
            "full" => Ok(Completeness::Full),
            _ => Err(ParseKindError::new("completeness", s)),
        }
    }
}

// ============================================================================
// Relation Types
// ============================================================================

/// Types of relationships between bibliographic entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Work → Author
    Authored,
    /// Author → Institution
    AffiliatedWith,
    /// Work → Source
    PublishedIn,
    /// Work → Work (citation)
    References,
    /// Work → Work (related works)
    Related,
    /// Work → Topic
    HasTopic,
    /// Work → Concept
    HasConcept,
    /// Work → Keyword
    HasKeyword,
    /// Work → Funder
    FundedBy,
    /// Source → Publisher or Institution
    HostOrganization,
    /// Institution → parent Institution, Publisher → parent Publisher
    Lineage,
    /// Topic → Subfield → Field → Domain
    PartOf,
}

impl RelationType {
    /// All relation types, in declaration order.
    pub const ALL: [RelationType; 12] = [
        RelationType::Authored,
        RelationType::AffiliatedWith,
        RelationType::PublishedIn,
        RelationType::References,
        RelationType::Related,
        RelationType::HasTopic,
        RelationType::HasConcept,
        RelationType::HasKeyword,
        RelationType::FundedBy,
        RelationType::HostOrganization,
        RelationType::Lineage,
        RelationType::PartOf,
    ];

    /// Get the string representation used in storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Authored => "authored",
            RelationType::AffiliatedWith => "affiliated_with",
            RelationType::PublishedIn => "published_in",
            RelationType::References => "references",
            RelationType::Related => "related",
            RelationType::HasTopic => "has_topic",
            RelationType::HasConcept => "has_concept",
            RelationType::HasKeyword => "has_keyword",
            RelationType::FundedBy => "funded_by",
            RelationType::HostOrganization => "host_organization",
            RelationType::Lineage => "lineage",
            RelationType::PartOf => "part_of",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ParseKindError::new("relation type", s))
    }
}

/// Whether an edge is directed or undirected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    #[default]
    Directed,
    Undirected,
}

impl EdgeDirection {
    /// Get the string representation used in storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeDirection::Directed => "directed",
            EdgeDirection::Undirected => "undirected",
        }
    }
}

impl FromStr for EdgeDirection {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directed" => Ok(EdgeDirection::Directed),
            "undirected" => Ok(EdgeDirection::Undirected),
            _ => Err(ParseKindError::new("edge direction", s)),
        }
    }
}

/// Position of an author in a work's authorship list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorPosition {
    First,
    Middle,
    Last,
}

// ============================================================================
// Edge Properties
// ============================================================================

/// Sparse, relation-specific properties carried by an edge.
///
/// Every field is optional; an absent field never constrains an
/// [`EdgePropertyFilter`](crate::filter::EdgePropertyFilter).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeProperties {
    /// Authorship position (`authored` edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_position: Option<AuthorPosition>,

    /// Corresponding author flag (`authored` edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_corresponding: Option<bool>,

    /// Open access flag of the publication location (`published_in` edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_open_access: Option<bool>,

    /// Version of the hosted work, e.g. "publishedVersion"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Relevance score (`has_topic`, `has_concept`, `has_keyword` edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Years the relationship holds (affiliations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<Vec<i32>>,

    /// Grant identifier (`funded_by` edges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_id: Option<String>,

    /// Role of the target in the relationship (e.g. "publisher", "funder")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Any additional relation-specific data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl EdgeProperties {
    /// Check if no property is set
    pub fn is_empty(&self) -> bool {
        self.author_position.is_none()
            && self.is_corresponding.is_none()
            && self.is_open_access.is_none()
            && self.version.is_none()
            && self.score.is_none()
            && self.years.is_none()
            && self.award_id.is_none()
            && self.role.is_none()
            && self.metadata.is_none()
    }
}

// ============================================================================
// Node Records
// ============================================================================

/// Producer-side description of a node observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub id: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub completeness: Completeness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl NodeInput {
    pub fn new(id: impl Into<String>, entity_type: EntityType, completeness: Completeness) -> Self {
        Self {
            id: id.into(),
            entity_type,
            completeness,
            label: None,
            metadata: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A node as persisted in the durable store and held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNodeRecord {
    /// Stable entity identifier (e.g. "W2741809807")
    pub id: String,

    pub entity_type: EntityType,

    pub completeness: Completeness,

    /// Display name, filled in once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Set once when the node is first observed
    pub discovered_at: DateTime<Utc>,

    /// Set at most once, when the node's neighbourhood has been expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_at: Option<DateTime<Utc>>,

    /// Refreshed on each accepted mutation
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl GraphNodeRecord {
    /// Create a fresh record from a producer observation.
    pub fn new(input: NodeInput) -> Self {
        let now = timestamp_now();
        Self {
            id: input.id,
            entity_type: input.entity_type,
            completeness: input.completeness,
            label: input.label,
            discovered_at: now,
            expanded_at: None,
            updated_at: now,
            metadata: input.metadata.unwrap_or_default(),
        }
    }

    /// Return a copy with completeness overwritten, label replaced and
    /// metadata merged when provided.
    ///
    /// No ordering rule is applied here; callers decide whether the change is
    /// an upgrade.
    pub fn with_update(
        &self,
        completeness: Completeness,
        label: Option<&str>,
        metadata: Option<&Metadata>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut updated = self.clone();
        updated.completeness = completeness;
        updated.updated_at = updated_at;
        if let Some(label) = label {
            updated.label = Some(label.to_string());
        }
        if let Some(metadata) = metadata {
            for (key, value) in metadata {
                updated.metadata.insert(key.clone(), value.clone());
            }
        }
        updated
    }

    /// Whether the node's neighbourhood has been expanded
    pub fn is_expanded(&self) -> bool {
        self.expanded_at.is_some()
    }
}

// ============================================================================
// Edge Records
// ============================================================================

/// Derive the deterministic edge identifier for a relationship triple.
///
/// Each component is length-prefixed before hashing so that distinct triples
/// can never produce the same byte stream (e.g. `("a:b", "c")` vs
/// `("a", "b:c")`).
pub fn edge_id(source: &str, target: &str, relation_type: RelationType) -> String {
    let mut hasher = Sha256::new();
    for part in [source, target, relation_type.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Producer-side description of a discovered relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInput {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    #[serde(default)]
    pub direction: EdgeDirection,
    #[serde(flatten)]
    pub properties: EdgeProperties,
}

impl EdgeInput {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type,
            direction: EdgeDirection::Directed,
            properties: EdgeProperties::default(),
        }
    }

    pub fn with_direction(mut self, direction: EdgeDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_properties(mut self, properties: EdgeProperties) -> Self {
        self.properties = properties;
        self
    }

    /// The deterministic id this input maps to.
    pub fn id(&self) -> String {
        edge_id(&self.source, &self.target, self.relation_type)
    }
}

/// An edge as persisted in the durable store and held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdgeRecord {
    /// Derived from `(source, target, relation_type)`, see [`edge_id`]
    pub id: String,

    pub source: String,

    pub target: String,

    #[serde(rename = "type")]
    pub relation_type: RelationType,

    pub direction: EdgeDirection,

    pub discovered_at: DateTime<Utc>,

    #[serde(flatten)]
    pub properties: EdgeProperties,
}

impl GraphEdgeRecord {
    /// Create a record from a producer observation, deriving its id.
    pub fn new(input: EdgeInput) -> Self {
        Self {
            id: input.id(),
            source: input.source,
            target: input.target,
            relation_type: input.relation_type,
            direction: input.direction,
            discovered_at: timestamp_now(),
            properties: input.properties,
        }
    }
}

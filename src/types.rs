//! Core domain types for modgraph.
//!
//! Mirrors the wire shapes of the backend RPCs (`{nodes, edges}` payloads,
//! stop-condition options) so that serialized output is directly consumable
//! by a rendering surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Backend record id for a module or model.
pub type EntityId = i64;

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// What kind of record an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A data model (relations follow foreign-key fields).
    Model,
    /// An installable module (relations follow declared dependencies).
    Module,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Module => "module",
        }
    }

    /// Parse from a loose string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "model" => Some(Self::Model),
            "module" => Some(Self::Module),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityState
// ---------------------------------------------------------------------------

/// Lifecycle state of a module entity. Models carry no state.
///
/// Serialized forms match the backend's literal state strings, spaces
/// included ("to install" etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    #[serde(rename = "installed")]
    Installed,
    #[serde(rename = "uninstalled")]
    Uninstalled,
    #[serde(rename = "to install")]
    ToInstall,
    #[serde(rename = "to upgrade")]
    ToUpgrade,
    #[serde(rename = "to remove")]
    ToRemove,
    #[serde(rename = "uninstallable")]
    Uninstallable,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Uninstalled => "uninstalled",
            Self::ToInstall => "to install",
            Self::ToUpgrade => "to upgrade",
            Self::ToRemove => "to remove",
            Self::Uninstallable => "uninstallable",
        }
    }

    /// Parse from a loose string (case-insensitive, underscores accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', " ").as_str() {
            "installed" => Some(Self::Installed),
            "uninstalled" => Some(Self::Uninstalled),
            "to install" => Some(Self::ToInstall),
            "to upgrade" => Some(Self::ToUpgrade),
            "to remove" => Some(Self::ToRemove),
            "uninstallable" => Some(Self::Uninstallable),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A selectable catalog entry — one module or model with its display
/// metadata. Immutable once fetched; a catalog refresh replaces the whole
/// collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub label: String,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<EntityState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the module is flagged as a top-level application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<bool>,
    /// Whether the module is user-authored (as opposed to stock).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<bool>,
    /// Free-form display metadata (icon path, color override, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Entity {
    /// Minimal constructor; optional metadata starts empty.
    pub fn new(id: EntityId, label: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            state: None,
            category_id: None,
            category: None,
            description: None,
            application: None,
            custom: None,
            extra: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// RelationKind / Relation
// ---------------------------------------------------------------------------

/// The kind of a directed relation between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Module dependency: `from` depends on `to`.
    DependsOn,
    /// Mutual-exclusion declaration between modules.
    Exclusion,
    /// Foreign-key field on a model.
    Many2one,
    One2many,
    Many2many,
    /// Synthetic tag for an edge that closes a cycle back to a traversal
    /// ancestor.
    Cycle,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::Exclusion => "exclusion",
            Self::Many2one => "many2one",
            Self::One2many => "one2many",
            Self::Many2many => "many2many",
            Self::Cycle => "cycle",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "depends_on" | "dependency" => Some(Self::DependsOn),
            "exclusion" => Some(Self::Exclusion),
            "many2one" => Some(Self::Many2one),
            "one2many" => Some(Self::One2many),
            "many2many" => Some(Self::Many2many),
            "cycle" => Some(Self::Cycle),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge. Identity is the ordered `(from, to)` pair — two
/// relations over the same pair are duplicates no matter their kind, and
/// the first seen wins everywhere (store, traversal, session merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: EntityId,
    pub to: EntityId,
    pub kind: RelationKind,
    /// Display label, e.g. the field name behind a `many2one` edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Relation {
    pub fn new(from: EntityId, to: EntityId, kind: RelationKind) -> Self {
        Self {
            from,
            to,
            kind,
            label: None,
        }
    }

    /// The dedup identity of this relation.
    pub fn pair(&self) -> (EntityId, EntityId) {
        (self.from, self.to)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way a traversal walks the relation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow outgoing relations: what does the seed depend on?
    Forward,
    /// Follow incoming relations: what depends on the seed?
    Reverse,
}

// ---------------------------------------------------------------------------
// Domain filters
// ---------------------------------------------------------------------------

/// Entity attribute a domain clause inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainField {
    State,
    Category,
    Application,
    Custom,
    Label,
}

/// Comparison operator for a domain clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    /// Membership in a JSON array value.
    In,
    /// Case-insensitive substring match.
    #[serde(rename = "ilike")]
    ILike,
}

/// One `field op value` clause of a domain filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClause {
    pub field: DomainField,
    pub op: CmpOp,
    pub value: serde_json::Value,
}

/// A conjunction of clauses over entity attributes — the closed-form
/// counterpart of the backend's free-form domain expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainFilter {
    pub clauses: Vec<DomainClause>,
}

impl DomainFilter {
    pub fn new(clauses: Vec<DomainClause>) -> Self {
        Self { clauses }
    }

    /// True when every clause holds for `entity`. An empty filter matches
    /// everything.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.clauses.iter().all(|c| clause_matches(c, entity))
    }
}

fn clause_matches(clause: &DomainClause, entity: &Entity) -> bool {
    let actual: serde_json::Value = match clause.field {
        DomainField::State => match entity.state {
            Some(s) => serde_json::Value::from(s.as_str()),
            None => serde_json::Value::Null,
        },
        DomainField::Category => match entity.category_id {
            Some(c) => serde_json::Value::from(c),
            None => serde_json::Value::Null,
        },
        DomainField::Application => match entity.application {
            Some(a) => serde_json::Value::from(a),
            None => serde_json::Value::Null,
        },
        DomainField::Custom => match entity.custom {
            Some(c) => serde_json::Value::from(c),
            None => serde_json::Value::Null,
        },
        DomainField::Label => serde_json::Value::from(entity.label.as_str()),
    };

    match clause.op {
        CmpOp::Eq => actual == clause.value,
        CmpOp::Ne => actual != clause.value,
        CmpOp::In => clause
            .value
            .as_array()
            .is_some_and(|arr| arr.contains(&actual)),
        CmpOp::ILike => match (actual.as_str(), clause.value.as_str()) {
            (Some(a), Some(needle)) => a.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
    }
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

/// A predicate that, when true for a discovered node, prevents expansion
/// *past* that node. The node itself stays in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StopRule {
    /// Stop past modules whose state is `installed`.
    InstalledState,
    /// Stop past entities in the given category.
    Category(i64),
    /// Stop past entities that are not user-authored.
    NonCustom,
    /// Stop past entities matching an arbitrary domain filter.
    Domain(DomainFilter),
}

/// Immutable per-traversal configuration.
///
/// `max_depth`: `None` is unbounded; `Some(0)` returns the seeds with no
/// expansion at all; `Some(n)` includes nodes up to depth `n` and stops
/// expanding there. Rules are checked in precedence order: depth,
/// installed, category, non-custom, domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopConditions {
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub rules: Vec<StopRule>,
    /// Entities matching any of these filters are dropped from expansion
    /// entirely: no node, no edge.
    #[serde(default)]
    pub exclude: Vec<DomainFilter>,
}

impl StopConditions {
    /// Unbounded traversal with no stop rules.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn stop_on_installed(mut self) -> Self {
        self.rules.push(StopRule::InstalledState);
        self
    }

    pub fn stop_on_category(mut self, category_id: i64) -> Self {
        self.rules.push(StopRule::Category(category_id));
        self
    }

    pub fn stop_on_non_custom(mut self) -> Self {
        self.rules.push(StopRule::NonCustom);
        self
    }

    pub fn stop_on_domain(mut self, filter: DomainFilter) -> Self {
        self.rules.push(StopRule::Domain(filter));
        self
    }

    pub fn exclude_domain(mut self, filter: DomainFilter) -> Self {
        self.exclude.push(filter);
        self
    }
}

// ---------------------------------------------------------------------------
// Traversal output
// ---------------------------------------------------------------------------

/// The induced subgraph reachable from the seeds under the stop
/// conditions. Nodes and edges are in first-discovery order; produced
/// fresh per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Relation>,
}

/// Read-only view of a session graph for the presentation surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Relation>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

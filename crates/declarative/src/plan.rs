//! Plan data model
//!
//! A [`Plan`] is produced by an upstream planner and consumed by the
//! [`Executor`](crate::Executor). The engine trusts `execution_order`; it
//! never re-derives the dependency graph.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Field values of a change, keyed by field name.
pub type Fields = Map<String, Value>;

/// Placeholder used by the planner for IDs of resources created in the same plan.
pub const UNKNOWN_ID: &str = "[unknown]";

/// Kind of operation a change performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    /// Run an external tool mid-plan (see [`crate::external`]).
    ExternalTool,
}

impl ActionType {
    /// Wire representation ("CREATE", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::ExternalTool => "EXTERNAL_TOOL",
        }
    }

    /// Past-tense verb used in error messages.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::ExternalTool => "executed",
        }
    }

    /// Whether the action targets an existing resource.
    pub fn requires_resource_id(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode the plan was generated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Create and update only.
    #[default]
    Apply,
    /// Full reconciliation, deletes included.
    Sync,
}

impl PlanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protection setting carried by a change.
///
/// Serialized either as a bare bool or as `{"old": bool, "new": bool}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Protection {
    /// Desired protection state for a create or regular update.
    Flag(bool),
    /// Explicit transition of the protection flag.
    Change { old: bool, new: bool },
}

impl Protection {
    /// Whether this is an explicit `{old, new}` transition.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Change { .. })
    }

    /// Protection state the resource should end up in.
    pub fn desired(&self) -> bool {
        match *self {
            Self::Flag(value) => value,
            Self::Change { new, .. } => new,
        }
    }
}

/// Reference from one change to another resource's identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    /// Reference as written in configuration.
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    /// Concrete ID, or [`UNKNOWN_ID`] when created in the same plan.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Resource-specific identifying fields for deferred lookups.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_arrays: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
}

impl ReferenceInfo {
    /// Single reference with no known ID yet.
    pub fn to_ref(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            id: UNKNOWN_ID.to_string(),
            ..Default::default()
        }
    }

    /// Single reference with a concrete ID.
    pub fn resolved(reference: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    /// The concrete ID, if the planner already knew it.
    pub fn concrete_id(&self) -> Option<&str> {
        is_concrete_id(&self.id).then_some(self.id.as_str())
    }
}

/// Parent pointer of a child resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInfo {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub id: String,
}

/// Selector used to find a resource created by an external tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "matchFields", default)]
    pub match_fields: BTreeMap<String, String>,
}

/// Resource that must be looked up after a change executes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResolutionTarget {
    #[serde(default)]
    pub resource_type: String,
    pub resource_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub control_plane_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub control_plane_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub control_plane_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
}

/// A single planned operation against one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub resource_type: String,
    pub resource_ref: String,
    /// Target ID; required for UPDATE and DELETE.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    /// Human-readable identifiers for resources without config refs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_monikers: BTreeMap<String, String>,
    pub action: ActionType,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_resolution_targets: Vec<PostResolutionTarget>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, ReferenceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl Change {
    /// Create a change with empty fields.
    pub fn new(
        id: impl Into<String>,
        action: ActionType,
        resource_type: impl Into<String>,
        resource_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            resource_ref: resource_ref.into(),
            resource_id: String::new(),
            resource_monikers: BTreeMap::new(),
            action,
            fields: Fields::new(),
            post_resolution_targets: Vec::new(),
            references: BTreeMap::new(),
            parent: None,
            protection: None,
            namespace: String::new(),
            depends_on: Vec::new(),
            config_hash: None,
        }
    }

    /// Set the target resource ID.
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = id.into();
        self
    }

    /// Set a field value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the protection value.
    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = Some(protection);
        self
    }

    /// Add a reference.
    pub fn with_reference(mut self, key: impl Into<String>, reference: ReferenceInfo) -> Self {
        self.references.insert(key.into(), reference);
        self
    }

    /// Set the parent pointer.
    pub fn with_parent(mut self, reference: impl Into<String>, id: impl Into<String>) -> Self {
        self.parent = Some(ParentInfo {
            reference: reference.into(),
            id: id.into(),
        });
        self
    }

    /// The `name` field, or `[unknown]`.
    pub fn resource_name(&self) -> &str {
        self.fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("[unknown]")
    }

    /// Name for display: the `name` field, a moniker, or the ref.
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.fields.get("name").and_then(Value::as_str) {
            return name;
        }
        self.resource_monikers
            .values()
            .next()
            .map(String::as_str)
            .unwrap_or(&self.resource_ref)
    }
}

/// Plan generation information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generator: String,
    #[serde(default)]
    pub mode: PlanMode,
}

/// Overview statistics of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    #[serde(default)]
    pub total_changes: usize,
    #[serde(default)]
    pub by_action: BTreeMap<ActionType, usize>,
    #[serde(default)]
    pub by_resource: BTreeMap<String, usize>,
}

/// Planner warning attached to a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWarning {
    pub change_id: String,
    pub message: String,
}

/// Ordered collection of changes plus execution metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub execution_order: Vec<String>,
    #[serde(default)]
    pub summary: PlanSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PlanWarning>,
}

impl Plan {
    /// Create an empty plan for the given mode.
    pub fn new(mode: PlanMode) -> Self {
        Self {
            metadata: PlanMetadata {
                version: "1.0".to_string(),
                generated_at: Some(Utc::now()),
                generator: format!("kongctl/{}", env!("CARGO_PKG_VERSION")),
                mode,
            },
            ..Default::default()
        }
    }

    /// Read a plan file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse plan file {}", path.display()))
    }

    /// Parse a plan document.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let mut plan: Self = serde_json::from_str(content)?;
        if plan.summary.total_changes != plan.changes.len() {
            plan.update_summary();
        }
        Ok(plan)
    }

    /// Build a plan whose execution order is the insertion order.
    pub fn sequential(mode: PlanMode, changes: Vec<Change>) -> Self {
        let mut plan = Self::new(mode);
        for change in changes {
            plan.execution_order.push(change.id.clone());
            plan.add_change(change);
        }
        plan
    }

    /// Add a change and refresh the summary. Does not touch the execution order.
    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
        self.update_summary();
    }

    /// Replace the execution order.
    pub fn set_execution_order(&mut self, order: Vec<String>) {
        self.execution_order = order;
    }

    /// Recalculate summary statistics.
    pub fn update_summary(&mut self) {
        let mut summary = PlanSummary {
            total_changes: self.changes.len(),
            ..Default::default()
        };
        for change in &self.changes {
            *summary.by_action.entry(change.action).or_default() += 1;
            *summary
                .by_resource
                .entry(change.resource_type.clone())
                .or_default() += 1;
        }
        self.summary = summary;
    }

    /// Find a change by ID.
    pub fn change(&self, id: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.id == id)
    }

    /// Index of a change by ID.
    pub fn change_index(&self, id: &str) -> Option<usize> {
        self.changes.iter().position(|c| c.id == id)
    }

    /// Whether the plan contains any DELETE.
    pub fn has_deletes(&self) -> bool {
        self.changes.iter().any(|c| c.action == ActionType::Delete)
    }

    /// Whether there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Distinct namespaces touched by the plan, sorted.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .changes
            .iter()
            .map(|c| c.namespace.as_str())
            .filter(|ns| !ns.is_empty())
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }
}

/// Whether an ID is concrete (not empty and not the unknown placeholder).
pub fn is_concrete_id(id: &str) -> bool {
    !id.is_empty() && id != UNKNOWN_ID
}

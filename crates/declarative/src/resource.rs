//! Resource adapter contract
//!
//! Each remote resource type implements [`ResourceOperations`]: field
//! mapping into typed requests plus the CRUD primitives. The lifecycle
//! around those primitives (validation, protection re-check, dry-run
//! short-circuit, error wrapping) is implemented once by
//! [`BaseExecutor`](crate::BaseExecutor), which turns any adapter into an
//! object-safe [`ChangeHandler`] the engine can dispatch to.

use crate::context::ExecutionContext;
use crate::error::Result as ExecResult;
use crate::labels::Labels;
use crate::types::ResourceInfo;
use anyhow::Result;
use std::collections::HashMap;

/// Operations an adapter provides for one resource type
///
/// # Example
///
/// ```ignore
/// use declarative::{ExecutionContext, Fields, Labels, ResourceInfo, ResourceOperations};
///
/// struct PortalAdapter { api: Arc<dyn KonnectApi> }
///
/// impl ResourceOperations for PortalAdapter {
///     type CreateRequest = CreatePortal;
///     type UpdateRequest = UpdatePortal;
///
///     fn resource_type(&self) -> &'static str { "portal" }
///
///     fn map_create_fields(&self, ctx: &ExecutionContext<'_>, fields: &Fields)
///         -> anyhow::Result<CreatePortal> { /* ... */ }
///
///     // ...
/// }
/// ```
pub trait ResourceOperations: Send + Sync {
    /// Typed create request.
    type CreateRequest;
    /// Typed update request.
    type UpdateRequest;

    /// Resource type this adapter handles (e.g. "portal").
    fn resource_type(&self) -> &'static str;

    /// Fields that must be present in a create change.
    fn required_fields(&self) -> &'static [&'static str] {
        &["name"]
    }

    /// Whether the remote API supports in-place updates.
    fn supports_update(&self) -> bool {
        true
    }

    /// Whether the resource carries labels.
    ///
    /// Unlabelled child resources cannot be protected or marked as managed,
    /// so deleting them skips the lookup and the ownership check.
    fn supports_labels(&self) -> bool {
        true
    }

    /// Map change fields into a create request.
    fn map_create_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &crate::plan::Fields,
    ) -> Result<Self::CreateRequest>;

    /// Map change fields into an update request.
    ///
    /// `current_labels` holds the resource's non-bookkeeping labels as
    /// fetched just before the update.
    fn map_update_fields(
        &self,
        ctx: &ExecutionContext<'_>,
        fields: &crate::plan::Fields,
        current_labels: &Labels,
    ) -> Result<Self::UpdateRequest>;

    /// Create the resource; returns its ID.
    fn create(&self, ctx: &ExecutionContext<'_>, request: Self::CreateRequest) -> Result<String>;

    /// Update the resource; returns its ID.
    fn update(
        &self,
        ctx: &ExecutionContext<'_>,
        id: &str,
        request: Self::UpdateRequest,
    ) -> Result<String>;

    /// Delete the resource.
    fn delete(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<()>;

    /// Look the resource up by name. `Ok(None)` means it does not exist.
    fn get_by_name(&self, ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>>;

    /// Look the resource up by ID. `Ok(None)` means it does not exist.
    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>>;
}

/// Object-safe handler the engine dispatches changes to
pub trait ChangeHandler: Send + Sync {
    /// Resource type this handler serves.
    fn resource_type(&self) -> &str;

    /// Run a create; returns the new (or dry-run placeholder) ID.
    fn create(&self, ctx: &ExecutionContext<'_>) -> ExecResult<String>;

    /// Run an update; returns the resource ID.
    fn update(&self, ctx: &ExecutionContext<'_>) -> ExecResult<String>;

    /// Run a delete.
    fn delete(&self, ctx: &ExecutionContext<'_>) -> ExecResult<()>;

    /// Look a resource of this type up by name (used for deferred references).
    fn get_by_name(&self, ctx: &ExecutionContext<'_>, name: &str)
    -> ExecResult<Option<ResourceInfo>>;

    /// Look a resource of this type up by ID.
    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> ExecResult<Option<ResourceInfo>>;
}

/// Boxed handler for registry storage
pub type BoxedHandler = Box<dyn ChangeHandler>;

/// Handlers keyed by resource type
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its resource type, replacing any previous one.
    pub fn register(&mut self, handler: BoxedHandler) {
        self.handlers
            .insert(handler.resource_type().to_string(), handler);
    }

    /// Handler for a resource type.
    pub fn get(&self, resource_type: &str) -> Option<&dyn ChangeHandler> {
        self.handlers.get(resource_type).map(AsRef::as_ref)
    }

    /// Whether a resource type has a handler.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.handlers.contains_key(resource_type)
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

//! Generic create/update/delete lifecycle
//!
//! [`BaseExecutor`] wraps a [`ResourceOperations`] adapter and implements
//! the steps every resource type shares: required-field validation, field
//! mapping, the execution-time protection re-check, the dry-run
//! short-circuit, and error wrapping with resource context.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::fields::validate_required_fields;
use crate::labels;
use crate::protection;
use crate::resource::{BoxedHandler, ChangeHandler, ResourceOperations};
use crate::types::ResourceInfo;

/// Lifecycle driver for one adapter
pub struct BaseExecutor<A> {
    ops: A,
}

impl<A: ResourceOperations> BaseExecutor<A> {
    /// Wrap an adapter.
    pub fn new(ops: A) -> Self {
        Self { ops }
    }

    /// Wrap an adapter and box it for a registry.
    pub fn boxed(ops: A) -> BoxedHandler
    where
        A: 'static,
    {
        Box::new(Self::new(ops))
    }

    /// The wrapped adapter.
    pub fn ops(&self) -> &A {
        &self.ops
    }

    /// Dry-run identifier returned instead of a created ID.
    pub fn dry_run_id(&self) -> String {
        format!("dry-run-{}-id", self.ops.resource_type())
    }

    /// Field-mapping failures keep their kind when they already are an
    /// execution error (an unresolved reference, say).
    fn mapping_error(&self, err: anyhow::Error, name: &str) -> Error {
        match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::validation(format!(
                "invalid {} '{}': {err:#}",
                self.ops.resource_type(),
                name
            )),
        }
    }

    fn remote_error(&self, err: anyhow::Error, operation: &str, name: &str) -> Error {
        match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::api(operation, self.ops.resource_type(), name, &err),
        }
    }

    fn fetch(&self, ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>> {
        ctx.cancel.check()?;
        self.ops
            .get_by_name(ctx, name)
            .map_err(|e| self.remote_error(e, "lookup", name))
    }

    /// Live state of the change's target: by name, or by ID when the
    /// change carries no name.
    fn fetch_current(&self, ctx: &ExecutionContext<'_>) -> Result<Option<ResourceInfo>> {
        let id = &ctx.change.resource_id;
        if ctx.fields().contains_key("name") || id.is_empty() {
            return self.fetch(ctx, ctx.change.resource_name());
        }
        ctx.cancel.check()?;
        self.ops
            .get_by_id(ctx, id)
            .map_err(|e| self.remote_error(e, "lookup", id))
    }
}

impl<A: ResourceOperations> ChangeHandler for BaseExecutor<A> {
    fn resource_type(&self) -> &str {
        self.ops.resource_type()
    }

    fn create(&self, ctx: &ExecutionContext<'_>) -> Result<String> {
        let resource_type = self.ops.resource_type();
        let fields = ctx.fields();
        let name = ctx.change.resource_name();
        log::debug!("Creating {resource_type} '{name}'");

        validate_required_fields(fields, resource_type, self.ops.required_fields())?;

        let request = self
            .ops
            .map_create_fields(ctx, fields)
            .map_err(|e| self.mapping_error(e, name))?;

        if ctx.dry_run {
            return Ok(self.dry_run_id());
        }

        ctx.cancel.check()?;
        let id = self
            .ops
            .create(ctx, request)
            .map_err(|e| self.remote_error(e, "create", name))?;
        log::info!("Created {resource_type} '{name}' ({id})");
        Ok(id)
    }

    fn update(&self, ctx: &ExecutionContext<'_>) -> Result<String> {
        let resource_type = self.ops.resource_type();
        if !self.ops.supports_update() {
            return Err(Error::validation(format!(
                "{resource_type} does not support update operations"
            )));
        }

        let name = ctx.change.resource_name();
        log::debug!("Updating {resource_type} '{name}'");

        // Protection can change between planning and execution.
        let current = self.fetch_current(ctx)?.ok_or_else(|| {
            Error::validation(format!("{resource_type} '{name}' no longer exists"))
        })?;
        protection::check_mutation(resource_type, name, current.is_protected(), ctx.change)?;

        let current_labels = labels::user_labels(&current.labels);
        let request = self
            .ops
            .map_update_fields(ctx, ctx.fields(), &current_labels)
            .map_err(|e| self.mapping_error(e, name))?;

        if ctx.dry_run {
            return Ok(ctx.change.resource_id.clone());
        }

        ctx.cancel.check()?;
        let id = self
            .ops
            .update(ctx, &ctx.change.resource_id, request)
            .map_err(|e| self.remote_error(e, "update", name))?;
        log::info!("Updated {resource_type} '{name}' ({id})");
        Ok(id)
    }

    fn delete(&self, ctx: &ExecutionContext<'_>) -> Result<()> {
        let resource_type = self.ops.resource_type();
        let name = ctx.change.resource_name();
        log::debug!("Deleting {resource_type} '{name}'");

        // Unlabelled resources: no protection or ownership check, only existence.
        if !self.ops.supports_labels() {
            let id = &ctx.change.resource_id;
            if self.get_by_id(ctx, id)?.is_none() {
                log::info!("{resource_type} {id} already absent, nothing to delete");
                return Ok(());
            }
            if ctx.dry_run {
                return Ok(());
            }
            ctx.cancel.check()?;
            self.ops
                .delete(ctx, id)
                .map_err(|e| self.remote_error(e, "delete", name))?;
            log::info!("Deleted {resource_type} {id}");
            return Ok(());
        }

        let Some(current) = self.fetch_current(ctx)? else {
            log::info!("{resource_type} '{name}' already absent, nothing to delete");
            return Ok(());
        };

        protection::check_mutation(resource_type, name, current.is_protected(), ctx.change)?;

        if !current.is_managed() {
            return Err(Error::validation(format!(
                "cannot delete {resource_type} '{name}': not a KONGCTL-managed resource"
            )));
        }

        if ctx.dry_run {
            return Ok(());
        }

        ctx.cancel.check()?;
        self.ops
            .delete(ctx, &ctx.change.resource_id)
            .map_err(|e| self.remote_error(e, "delete", name))?;
        log::info!("Deleted {resource_type} '{name}'");
        Ok(())
    }

    fn get_by_name(&self, ctx: &ExecutionContext<'_>, name: &str) -> Result<Option<ResourceInfo>> {
        self.fetch(ctx, name)
    }

    fn get_by_id(&self, ctx: &ExecutionContext<'_>, id: &str) -> Result<Option<ResourceInfo>> {
        ctx.cancel.check()?;
        self.ops
            .get_by_id(ctx, id)
            .map_err(|e| self.remote_error(e, "lookup", id))
    }
}

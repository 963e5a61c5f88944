//! Execution context and provider traits
//!
//! These types are passed explicitly to adapters and reporters so the
//! engine never relies on ambient state.

use crate::error::{Error, Result};
use crate::plan::{Change, Fields, Plan, Protection};
use crate::types::ExecutionResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between the caller and the engine.
///
/// Cancelling does not interrupt a call already in flight; the next check
/// fails the current change and every change after it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Observer for execution progress
///
/// Implementations are purely side-effecting; the engine never reads
/// anything back from them.
pub trait ProgressReporter: Send {
    /// Called once before the first change.
    fn start_execution(&mut self, plan: &Plan);

    /// Called before a change is validated and dispatched.
    fn start_change(&mut self, change: &Change);

    /// Called when a change finished, with its error if it failed.
    fn complete_change(&mut self, change: &Change, error: Option<&Error>);

    /// Called when a change was not applied (dry-run).
    fn skip_change(&mut self, change: &Change, reason: &str);

    /// Called once after the last change.
    fn finish_execution(&mut self, result: &ExecutionResult);
}

/// Context passed to every adapter operation for one change
pub struct ExecutionContext<'a> {
    /// The change being executed.
    pub change: &'a Change,
    /// Whether mutating calls must be skipped.
    pub dry_run: bool,
    /// Cancellation flag of the run.
    pub cancel: CancelToken,
    /// Working copy of the change fields with placeholders substituted.
    fields: Fields,
    /// Reference key -> resolved ID.
    reference_ids: BTreeMap<String, String>,
    /// Array reference key -> resolved IDs, in reference order.
    reference_arrays: BTreeMap<String, Vec<String>>,
    /// Resolved parent ID.
    parent_id: Option<String>,
}

impl<'a> ExecutionContext<'a> {
    /// Create a context with nothing resolved yet.
    pub fn new(change: &'a Change, dry_run: bool, cancel: CancelToken) -> Self {
        Self {
            change,
            dry_run,
            cancel,
            fields: change.fields.clone(),
            reference_ids: BTreeMap::new(),
            reference_arrays: BTreeMap::new(),
            parent_id: None,
        }
    }

    /// Namespace of the change.
    pub fn namespace(&self) -> &str {
        &self.change.namespace
    }

    /// Protection setting of the change.
    pub fn protection(&self) -> Option<&Protection> {
        self.change.protection.as_ref()
    }

    /// Fields to map into requests.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Record a resolved single reference.
    pub fn set_reference_id(&mut self, key: impl Into<String>, id: impl Into<String>) {
        self.reference_ids.insert(key.into(), id.into());
    }

    /// Record a resolved array reference.
    pub fn set_reference_ids(&mut self, key: impl Into<String>, ids: Vec<String>) {
        self.reference_arrays.insert(key.into(), ids);
    }

    /// Record the resolved parent ID.
    pub fn set_parent_id(&mut self, id: impl Into<String>) {
        self.parent_id = Some(id.into());
    }

    /// Resolved ID of a reference, if any.
    pub fn reference_id(&self, key: &str) -> Option<&str> {
        self.reference_ids.get(key).map(String::as_str)
    }

    /// Resolved ID of a reference that the adapter cannot do without.
    pub fn require_reference(&self, key: &str) -> Result<&str> {
        self.reference_id(key).ok_or_else(|| {
            let reference = self
                .change
                .references
                .get(key)
                .map_or(key, |r| r.reference.as_str());
            Error::reference(key.trim_end_matches("_id"), reference, "reference was not resolved")
        })
    }

    /// Resolved IDs of an array reference (empty when absent).
    pub fn reference_ids(&self, key: &str) -> &[String] {
        self.reference_arrays
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolved parent ID, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Resolved parent ID that the adapter cannot do without.
    pub fn require_parent_id(&self) -> Result<&str> {
        self.parent_id().ok_or_else(|| {
            let reference = self
                .change
                .parent
                .as_ref()
                .map_or(self.change.resource_ref.as_str(), |p| p.reference.as_str());
            Error::reference("parent", reference, "parent ID was not resolved")
        })
    }
}

//! Execution engine - applies a plan's changes in order

use crate::context::{CancelToken, ExecutionContext, ProgressReporter};
use crate::error::{Error, Result};
use crate::external::{DeckStep, ExternalToolConfig};
use crate::plan::{ActionType, Change, Plan};
use crate::protection;
use crate::resolver::{RefTable, ReferenceResolver};
use crate::resource::HandlerRegistry;
use crate::types::ExecutionResult;
use std::collections::HashSet;

/// Applies plans against registered resource handlers
///
/// Changes run strictly one after another in `plan.execution_order`. A
/// failing change is recorded and the next one runs; nothing is rolled
/// back. Without a reporter or any handlers the engine still runs every
/// change, failing the ones it cannot dispatch.
pub struct Executor {
    registry: HandlerRegistry,
    reporter: Option<Box<dyn ProgressReporter>>,
    external: Option<ExternalToolConfig>,
    dry_run: bool,
    cancel: CancelToken,
}

impl Executor {
    /// Executor with no handlers, reporter or deck runner.
    pub fn new(dry_run: bool) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            reporter: None,
            external: None,
            dry_run,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_external_tool(mut self, config: ExternalToolConfig) -> Self {
        self.external = Some(config);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the plan.
    ///
    /// Per-change failures end up in the returned result. The only error
    /// returned here is an unusable execution order.
    pub fn execute(&mut self, plan: &mut Plan) -> Result<ExecutionResult> {
        check_execution_order(plan)?;

        let mut result = ExecutionResult::new(self.dry_run);
        let mut table = RefTable::new();

        log::debug!(
            "Executing {} changes (mode: {}, dry run: {})",
            plan.execution_order.len(),
            plan.metadata.mode,
            self.dry_run
        );
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.start_execution(plan);
        }

        let order = plan.execution_order.clone();
        for change_id in &order {
            let Some(index) = plan.change_index(change_id) else {
                self.record_missing_change(change_id, &mut result);
                continue;
            };
            self.execute_change(plan, index, &mut table, &mut result);
        }

        if let Some(reporter) = self.reporter.as_mut() {
            reporter.finish_execution(&result);
        }
        log::debug!("{}", result.message());
        Ok(result)
    }

    /// An ordered ID with no change behind it fails like any other change.
    fn record_missing_change(&mut self, change_id: &str, result: &mut ExecutionResult) {
        log::warn!("Change {change_id} not found in plan");
        let err = Error::validation(format!("change {change_id} not found in plan"));
        if let Some(reporter) = self.reporter.as_mut() {
            let placeholder = Change::new(change_id, ActionType::Update, "", change_id);
            reporter.start_change(&placeholder);
            reporter.complete_change(&placeholder, Some(&err));
        }
        result.record_missing_change(change_id, &err.to_string());
    }

    fn execute_change(
        &mut self,
        plan: &mut Plan,
        index: usize,
        table: &mut RefTable,
        result: &mut ExecutionResult,
    ) {
        let change = plan.changes[index].clone();
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.start_change(&change);
        }
        log::debug!(
            "Dispatching {} {} '{}' ({})",
            change.action,
            change.resource_type,
            change.display_name(),
            change.id
        );

        let outcome = validate_change_pre_execution(&change)
            .and_then(|()| self.dispatch(plan, index, &change, table));

        match outcome {
            Ok(resource_id) => {
                if matches!(change.action, ActionType::Create | ActionType::Update)
                    && !resource_id.is_empty()
                    && !change.resource_ref.is_empty()
                {
                    table.insert(&change.resource_type, &change.resource_ref, resource_id.clone());
                }

                if self.dry_run {
                    result.record_would_succeed(&change, &resource_id);
                    if let Some(reporter) = self.reporter.as_mut() {
                        reporter.skip_change(&change, "dry-run mode");
                    }
                } else {
                    result.record_success(&change, &resource_id);
                    if let Some(reporter) = self.reporter.as_mut() {
                        reporter.complete_change(&change, None);
                    }
                }
            }
            Err(err) => {
                log::warn!(
                    "{} {} '{}' failed: {err}",
                    change.action,
                    change.resource_type,
                    change.display_name()
                );
                result.record_failure(&change, &err.to_string());
                if let Some(reporter) = self.reporter.as_mut() {
                    reporter.complete_change(&change, Some(&err));
                }
            }
        }
    }

    /// Run one change; returns the ID of the affected resource.
    fn dispatch(
        &self,
        plan: &mut Plan,
        index: usize,
        change: &Change,
        table: &mut RefTable,
    ) -> Result<String> {
        self.cancel.check()?;

        if change.action == ActionType::ExternalTool {
            let config = self.external.as_ref().ok_or_else(|| {
                Error::ExternalTool("deck runner not configured".to_string())
            })?;
            DeckStep {
                config,
                registry: &self.registry,
                table,
                dry_run: self.dry_run,
                cancel: &self.cancel,
            }
            .execute(plan, index)?;
            return Ok(String::new());
        }

        let handler = self
            .registry
            .get(&change.resource_type)
            .ok_or_else(|| not_implemented(change))?;

        let mut ctx = ExecutionContext::new(change, self.dry_run, self.cancel.clone());
        ReferenceResolver::new(&self.registry, table).resolve(&mut ctx)?;

        match change.action {
            ActionType::Create => handler.create(&ctx),
            ActionType::Update => handler.update(&ctx),
            ActionType::Delete => handler.delete(&ctx).map(|()| change.resource_id.clone()),
            ActionType::ExternalTool => Err(not_implemented(change)),
        }
    }
}

/// Checks that do not need the remote API.
///
/// Runs for every change, dry-run included, before anything is dispatched.
pub fn validate_change_pre_execution(change: &Change) -> Result<()> {
    if change.action.requires_resource_id() && change.resource_id.trim().is_empty() {
        return Err(Error::MissingResourceId {
            action: change.action.to_string(),
        });
    }
    protection::validate_transition(change.protection.as_ref())
}

fn not_implemented(change: &Change) -> Error {
    Error::NotImplemented {
        action: change.action.to_string(),
        resource_type: change.resource_type.clone(),
    }
}

/// A change listed twice would run twice.
fn check_execution_order(plan: &Plan) -> Result<()> {
    let mut seen = HashSet::with_capacity(plan.execution_order.len());
    for id in &plan.execution_order {
        if !seen.insert(id.as_str()) {
            return Err(Error::InvalidPlan(format!(
                "change {id} appears more than once in the execution order"
            )));
        }
    }
    Ok(())
}

//! Structured execution report for `--output json` and `--execution-report-file`

use anyhow::{Context, Result};
use declarative::{AppliedChange, ExecutionError, ExecutionResult, Plan, ValidationResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    PartialSuccess,
    Error,
}

#[derive(Debug, Serialize)]
pub struct Execution<'a> {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<&'a [ValidationResult]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_changes: Option<&'a [AppliedChange]>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub errors: &'a [ExecutionError],
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_changes: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Summary {
    pub fn from_result(result: &ExecutionResult) -> Self {
        let total = result.total_changes();
        let (status, message) = if total == 0 {
            (
                Status::Success,
                Some("No changes needed. All resources match the desired configuration.".to_string()),
            )
        } else if result.failure_count > 0 {
            if result.success_count == 0 {
                (
                    Status::Error,
                    Some(format!("Execution failed with {} errors", result.failure_count)),
                )
            } else {
                (
                    Status::PartialSuccess,
                    Some(format!(
                        "Execution partially succeeded with {} errors",
                        result.failure_count
                    )),
                )
            }
        } else if result.success_count > 0 {
            (
                Status::Success,
                Some(format!("Execution succeeded with {} changes", result.success_count)),
            )
        } else if result.dry_run && result.skipped_count > 0 {
            (
                Status::Success,
                Some(format!(
                    "Dry-run complete. {} changes would be executed.",
                    result.skipped_count
                )),
            )
        } else {
            (Status::Success, None)
        };

        Self {
            total_changes: total,
            applied: result.success_count,
            failed: result.failure_count,
            skipped: result.skipped_count,
            status,
            message,
        }
    }
}

/// Plan, per-change outcomes and summary of one run.
#[derive(Debug, Serialize)]
pub struct ExecutionReport<'a> {
    pub plan: &'a Plan,
    pub execution: Execution<'a>,
    pub summary: Summary,
}

impl<'a> ExecutionReport<'a> {
    pub fn new(plan: &'a Plan, result: &'a ExecutionResult) -> Self {
        let execution = Execution {
            dry_run: result.dry_run,
            validation_results: (result.dry_run && !result.validation_results.is_empty())
                .then_some(result.validation_results.as_slice()),
            applied_changes: (!result.dry_run && !result.changes_applied.is_empty())
                .then_some(result.changes_applied.as_slice()),
            errors: &result.errors,
        };
        Self {
            plan,
            execution,
            summary: Summary::from_result(result),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to encode execution report")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write execution report {}", path.display()))
    }
}

//! Core types for plan execution results

use crate::labels;
use crate::plan::Change;
use serde::{Deserialize, Serialize};

/// Read projection of a remote resource.
///
/// Returned by adapter lookups; used only for existence and protection
/// checks before a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    /// Labels as stored remotely.
    pub labels: labels::Labels,
    /// Labels with vendor-specific encoding removed.
    pub normalized_labels: labels::Labels,
}

impl ResourceInfo {
    /// Build a projection; normalized labels equal the given labels.
    pub fn new(id: impl Into<String>, name: impl Into<String>, labels: labels::Labels) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            normalized_labels: labels.clone(),
            labels,
        }
    }

    /// Whether the protection label is set.
    pub fn is_protected(&self) -> bool {
        labels::is_protected(&self.normalized_labels)
    }

    /// Whether the resource carries kongctl ownership labels.
    pub fn is_managed(&self) -> bool {
        labels::is_managed(&self.normalized_labels)
    }
}

/// Per-change failure recorded in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub change_id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_ref: String,
    pub action: String,
    pub error: String,
}

/// Change that was applied successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub change_id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_ref: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
}

/// Dry-run prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    WouldSucceed,
    WouldFail,
}

/// Outcome of validating one change in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub change_id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_ref: String,
    pub action: String,
    pub status: ValidationStatus,
    /// "passed" or "failed".
    pub validation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Predicted ID (a `dry-run-<type>-id` placeholder for creates).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
}

/// Aggregated result of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes_applied: Vec<AppliedChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_results: Vec<ValidationResult>,
    pub dry_run: bool,
}

impl ExecutionResult {
    /// Empty result for a run.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Whether any change failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of changes visited.
    pub fn total_changes(&self) -> usize {
        self.success_count + self.failure_count + self.skipped_count
    }

    /// One-line summary.
    pub fn message(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run complete. {} changes would be applied.",
                self.skipped_count
            );
        }
        let mut message = format!(
            "Execution complete. {} changes applied successfully",
            self.success_count
        );
        if self.failure_count > 0 {
            message.push_str(&format!(", {} failed", self.failure_count));
        }
        message.push('.');
        message
    }

    /// Record a failure for a change.
    pub fn record_failure(&mut self, change: &Change, error: &str) {
        self.failure_count += 1;
        self.errors.push(ExecutionError {
            change_id: change.id.clone(),
            resource_type: change.resource_type.clone(),
            resource_name: change.display_name().to_string(),
            resource_ref: change.resource_ref.clone(),
            action: change.action.to_string(),
            error: error.to_string(),
        });
        if self.dry_run {
            self.validation_results.push(ValidationResult {
                change_id: change.id.clone(),
                resource_type: change.resource_type.clone(),
                resource_name: change.display_name().to_string(),
                resource_ref: change.resource_ref.clone(),
                action: change.action.to_string(),
                status: ValidationStatus::WouldFail,
                validation: "failed".to_string(),
                message: Some(error.to_string()),
                resource_id: String::new(),
            });
        }
    }

    /// Record a failure for an ID the plan does not contain.
    pub fn record_missing_change(&mut self, change_id: &str, error: &str) {
        self.failure_count += 1;
        self.errors.push(ExecutionError {
            change_id: change_id.to_string(),
            resource_type: String::new(),
            resource_name: String::new(),
            resource_ref: String::new(),
            action: String::new(),
            error: error.to_string(),
        });
        if self.dry_run {
            self.validation_results.push(ValidationResult {
                change_id: change_id.to_string(),
                resource_type: String::new(),
                resource_name: String::new(),
                resource_ref: String::new(),
                action: String::new(),
                status: ValidationStatus::WouldFail,
                validation: "failed".to_string(),
                message: Some(error.to_string()),
                resource_id: String::new(),
            });
        }
    }

    /// Record a successfully applied change.
    pub fn record_success(&mut self, change: &Change, resource_id: &str) {
        self.success_count += 1;
        self.changes_applied.push(AppliedChange {
            change_id: change.id.clone(),
            resource_type: change.resource_type.clone(),
            resource_name: change.display_name().to_string(),
            resource_ref: change.resource_ref.clone(),
            action: change.action.to_string(),
            resource_id: resource_id.to_string(),
        });
    }

    /// Record a dry-run change that passed validation.
    pub fn record_would_succeed(&mut self, change: &Change, resource_id: &str) {
        self.skipped_count += 1;
        self.validation_results.push(ValidationResult {
            change_id: change.id.clone(),
            resource_type: change.resource_type.clone(),
            resource_name: change.display_name().to_string(),
            resource_ref: change.resource_ref.clone(),
            action: change.action.to_string(),
            status: ValidationStatus::WouldSucceed,
            validation: "passed".to_string(),
            message: None,
            resource_id: resource_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ActionType;

    fn portal_change() -> Change {
        Change::new("1", ActionType::Create, "portal", "dev").with_field("name", "dev-portal")
    }

    #[test]
    fn test_record_failure_in_dry_run_adds_validation_result() {
        let mut result = ExecutionResult::new(true);
        result.record_failure(&portal_change(), "boom");

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.validation_results.len(), 1);
        assert_eq!(result.validation_results[0].status, ValidationStatus::WouldFail);
        assert_eq!(result.validation_results[0].message.as_deref(), Some("boom"));
        assert!(result.has_errors());
    }

    #[test]
    fn test_record_failure_real_run_has_no_validation_result() {
        let mut result = ExecutionResult::new(false);
        result.record_failure(&portal_change(), "boom");
        assert!(result.validation_results.is_empty());
        assert_eq!(result.errors[0].resource_name, "dev-portal");
        assert_eq!(result.errors[0].action, "CREATE");
    }

    #[test]
    fn test_message_dry_run() {
        let mut result = ExecutionResult::new(true);
        result.record_would_succeed(&portal_change(), "dry-run-portal-id");
        result.record_would_succeed(&portal_change(), "dry-run-portal-id");
        assert_eq!(result.message(), "Dry run complete. 2 changes would be applied.");
    }

    #[test]
    fn test_message_with_failures() {
        let mut result = ExecutionResult::new(false);
        result.record_success(&portal_change(), "p-1");
        result.record_failure(&portal_change(), "boom");
        assert_eq!(
            result.message(),
            "Execution complete. 1 changes applied successfully, 1 failed."
        );
        assert_eq!(result.total_changes(), 2);
    }

    #[test]
    fn test_validation_status_wire_names() {
        let value = serde_json::to_value(ValidationStatus::WouldSucceed).unwrap();
        assert_eq!(value, serde_json::json!("would_succeed"));
    }

    #[test]
    fn test_resource_info_protection() {
        let mut labels = labels::Labels::new();
        labels.insert(labels::PROTECTED_KEY.to_string(), "true".to_string());
        let info = ResourceInfo::new("p-1", "dev-portal", labels);
        assert!(info.is_protected());
        assert!(!info.is_managed());
    }
}

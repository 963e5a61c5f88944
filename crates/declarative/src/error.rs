//! Error types for plan execution.
//!
//! Every change-level failure is one of these variants. The engine records
//! them per change and keeps going; only [`Error::InvalidPlan`] aborts a run.

use std::fmt;

/// Result type alias for execution operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of execution errors.
///
/// Used by reporters and the CLI to decide how to present a failure and
/// whether re-running the plan could help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any network call (missing field, missing ID).
    Validation,
    /// Blocked by the protection label.
    Protection,
    /// No adapter bound for the resource type.
    NotImplemented,
    /// The remote API or an external tool failed.
    Remote,
    /// A reference could not be resolved to an identifier.
    Reference,
    /// The run was cancelled while the change was in flight.
    Cancelled,
    /// The plan itself is unusable.
    Plan,
}

impl ErrorCategory {
    /// Whether re-running the same change may succeed without edits.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote)
    }

    /// Short user-facing description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Validation failed",
            Self::Protection => "Resource is protected",
            Self::NotImplemented => "Resource type not supported",
            Self::Remote => "Remote operation failed",
            Self::Reference => "Reference could not be resolved",
            Self::Cancelled => "Execution cancelled",
            Self::Plan => "Invalid plan",
        }
    }

    /// Actionable advice for this category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the plan input and generate a new plan",
            Self::Protection => "Remove protection in configuration before changing this resource",
            Self::NotImplemented => "Upgrade kongctl or remove the resource from the configuration",
            Self::Remote => "Check connectivity and credentials, then run the plan again",
            Self::Reference => "Make sure the referenced resource exists or is part of the plan",
            Self::Cancelled => "Run the plan again to apply the remaining changes",
            Self::Plan => "Regenerate the plan",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while executing a plan.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic validation failure raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// A required field is absent from the change fields.
    #[error("required field '{field}' is missing")]
    MissingField {
        /// Resource type of the change.
        resource_type: String,
        /// Name of the missing field.
        field: String,
    },

    /// A required field is present but empty.
    #[error("required field '{field}' cannot be empty")]
    EmptyField {
        /// Resource type of the change.
        resource_type: String,
        /// Name of the empty field.
        field: String,
    },

    /// Update or delete without a target identifier.
    #[error("resource ID required for {action} operation")]
    MissingResourceId {
        /// The action that needed the identifier.
        action: String,
    },

    /// Mutation of a protected resource.
    #[error("resource '{resource_name}' ({resource_type}) is protected and cannot be {verb}")]
    Protection {
        /// Resource type.
        resource_type: String,
        /// Resource name.
        resource_name: String,
        /// Past-tense verb ("updated", "deleted").
        verb: String,
    },

    /// No handler is registered for this resource type.
    #[error("{action} operation not yet implemented for {resource_type}")]
    NotImplemented {
        /// Action of the change.
        action: String,
        /// Resource type of the change.
        resource_type: String,
    },

    /// The remote API rejected or failed an operation.
    #[error("API error during {operation} of {resource_type} '{resource_name}': {message}")]
    Api {
        /// Operation name ("create", "update", "delete", "lookup").
        operation: String,
        /// Resource type.
        resource_type: String,
        /// Resource name.
        resource_name: String,
        /// Underlying error message, including its cause chain.
        message: String,
    },

    /// A reference could not be turned into an identifier.
    #[error("failed to resolve {resource_type} reference '{reference}': {message}")]
    Reference {
        /// Type of the referenced resource.
        resource_type: String,
        /// The reference as written in the plan.
        reference: String,
        /// Why resolution failed.
        message: String,
    },

    /// The run was cancelled.
    #[error("execution cancelled")]
    Cancelled,

    /// External tool invocation failed.
    #[error("{0}")]
    ExternalTool(String),

    /// The plan is structurally unusable.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a reference error.
    pub fn reference(
        resource_type: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Reference {
            resource_type: resource_type.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Wrap an adapter error with resource context.
    ///
    /// The full cause chain is flattened into the message so it survives
    /// serialization into the execution report.
    pub fn api(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        source: &anyhow::Error,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            message: format!("{source:#}"),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::MissingField { .. }
            | Error::EmptyField { .. }
            | Error::MissingResourceId { .. } => ErrorCategory::Validation,
            Error::Protection { .. } => ErrorCategory::Protection,
            Error::NotImplemented { .. } => ErrorCategory::NotImplemented,
            Error::Api { .. } | Error::ExternalTool(_) => ErrorCategory::Remote,
            Error::Reference { .. } => ErrorCategory::Reference,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::InvalidPlan(_) => ErrorCategory::Plan,
        }
    }

    /// Whether re-running the change may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

//! Error types for Konnect API calls.
//!
//! Errors are categorized so callers can tell a transient outage from a
//! request Konnect will keep rejecting.

use std::fmt;

/// Result type alias for Konnect operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Konnect errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection problems, timeouts, 5xx and rate limiting (retryable).
    Network,
    /// Missing or rejected credentials.
    Auth,
    /// The resource does not exist.
    NotFound,
    /// Konnect rejected the request (4xx).
    Request,
    /// Response body could not be understood.
    Format,
    /// Client is not configured.
    Config,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Resource not found",
            Self::Request => "Request rejected by Konnect",
            Self::Format => "Invalid response format",
            Self::Config => "Client not configured",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::Auth => "Check the Konnect token (--token or KONGCTL_KONNECT_TOKEN)",
            Self::NotFound => "The resource may have been deleted outside kongctl; regenerate the plan",
            Self::Request => "Check the resource configuration against the Konnect API",
            Self::Format => "Check --base-url points at the Konnect API",
            Self::Config => "Set the missing value in the kongctl config file",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Konnect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Konnect answered with an error status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body.
        message: String,
    },

    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A required setting is missing.
    #[error("missing configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, if Konnect answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                429 => ErrorCategory::Network,
                s if *s >= 500 => ErrorCategory::Network,
                _ => ErrorCategory::Request,
            },
            Error::Transport(_) => ErrorCategory::Network,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                status: code,
                message: format!("HTTP {code}"),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Request.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Config.is_retryable());
    }

    #[test]
    fn test_http_status_categories() {
        assert_eq!(Error::http(401, "unauthorized").category(), ErrorCategory::Auth);
        assert_eq!(Error::http(404, "missing").category(), ErrorCategory::NotFound);
        assert_eq!(Error::http(409, "conflict").category(), ErrorCategory::Request);
        assert!(Error::http(429, "slow down").is_retryable());
        assert!(Error::http(503, "unavailable").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::http(409, "name already exists");
        assert_eq!(err.to_string(), "HTTP 409: name already exists");
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.category(), ErrorCategory::Format);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_category_advice() {
        assert!(ErrorCategory::Auth.advice().contains("token"));
        assert!(format!("{}", ErrorCategory::Network).contains("Network"));
    }
}

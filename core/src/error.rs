/// Argument validation failure, raised before any upstream call is made.
/// Carries the offending field so agents can fix the exact argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Argument path that failed (e.g. "startDate", "categories[1].param")
    pub field: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, format!("Missing required field '{field}'"))
    }

    pub fn wrong_type(field: &str, expected: &str) -> Self {
        Self::new(field, format!("'{field}' must be {expected}"))
    }
}

/// Error codes surfaced in structured tool errors
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const TRANSPORT_ERROR: &str = "transport_error";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
}

//! Error taxonomy for the docmind engine.

use thiserror::Error;

/// Result type alias using DocmindError.
pub type Result<T> = std::result::Result<T, DocmindError>;

/// Errors that can occur anywhere in the docmind pipeline.
#[derive(Error, Debug)]
pub enum DocmindError {
    /// Document rejected at ingestion (empty after normalization, etc.).
    /// Never retried.
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// Caller violated a programming contract (invalid k, bad chunk
    /// parameters). Fails fast at the call boundary.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A single failure talking to an external provider (quota, auth,
    /// network). Transient; retried with backoff.
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// The embedding provider stayed unreachable through the whole retry
    /// budget. Surfaced to the caller, never swallowed into an empty result.
    #[error("Embedding provider unavailable after {attempts} attempts: {message}")]
    EmbeddingUnavailable { attempts: u32, message: String },

    /// Vector dimensionality does not match the index configuration.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The planning call kept producing malformed actions.
    #[error("Planning failed: {message}")]
    Planning { message: String },

    /// A tool's input or output violated its declared schema.
    #[error("Tool contract violation in '{tool}': {message}")]
    ToolContractViolation { tool: String, message: String },

    /// The planner named a tool that is not registered.
    #[error("Unknown tool: {name}")]
    ToolNotFound { name: String },

    /// A suspended operation exceeded its caller-specified timeout.
    /// Treated as a retryable transient failure.
    #[error("Operation timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    /// The session was cancelled cooperatively. Terminal, but an expected
    /// outcome for the caller rather than a fault.
    #[error("Session cancelled")]
    Cancelled,

    /// Durable store error.
    #[error("Store error: {message}")]
    Store { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl DocmindError {
    /// Create an invalid document error.
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a planning error.
    pub fn planning(message: impl Into<String>) -> Self {
        Self::Planning {
            message: message.into(),
        }
    }

    /// Create a tool contract violation.
    pub fn tool_contract(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolContractViolation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Whether the failure is transient and worth retrying.
    ///
    /// Transient failures count toward retry budgets; everything else is
    /// surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Timeout { .. })
    }

    /// Stable error code recorded in session traces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDocument { .. } => "INVALID_DOCUMENT",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::EmbeddingUnavailable { .. } => "EMBEDDING_UNAVAILABLE",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::Planning { .. } => "PLANNING_ERROR",
            Self::ToolContractViolation { .. } => "TOOL_CONTRACT_VIOLATION",
            Self::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Store { .. } => "STORE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocmindError::EmbeddingUnavailable {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DocmindError::provider("quota").is_transient());
        assert!(DocmindError::Timeout {
            operation: "embed".to_string(),
            millis: 500,
        }
        .is_transient());
        assert!(!DocmindError::invalid_document("empty").is_transient());
        assert!(!DocmindError::Cancelled.is_transient());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DocmindError::tool_contract("search", "missing field").code(),
            "TOOL_CONTRACT_VIOLATION"
        );
        assert_eq!(DocmindError::Cancelled.code(), "CANCELLED");
    }
}

//! Error types for graphiti-maint.
//!
//! Errors are classified by what the caller should do with them:
//! connection failures abort a run, query and data-shape failures skip the
//! affected operation and the run continues.

/// Alias for Results returning [`MaintError`].
pub type Result<T> = std::result::Result<T, MaintError>;

/// Top-level error type for graphiti-maint.
#[derive(Debug, thiserror::Error)]
pub enum MaintError {
    /// The database is unreachable or rejected our credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single query failed to execute.
    #[error("Query error: {0}")]
    Query(String),

    /// A result row or stored value did not have the expected shape.
    #[error("Unexpected data shape: {0}")]
    DataShape(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Maintenance lock '{name}' is held by '{holder}'")]
    Locked { name: String, holder: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Embedder error: {0}")]
    Embedder(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaintError {
    /// Whether this error must abort the current run.
    ///
    /// Only connection-level failures and a foreign maintenance lock are
    /// fatal; every other error is scoped to the operation that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MaintError::Connection(_) | MaintError::Locked { .. })
    }
}

/// LLM-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("API error: {0}")]
    Api(String),
}

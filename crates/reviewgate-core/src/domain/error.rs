//! Domain-level error taxonomy for reviewgate.

use reviewgate_state::StorageError;

/// reviewgate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A single network/API fault talking to a collaborator. Retryable.
    #[error("transient failure in {operation}: {detail}")]
    Transient { operation: String, detail: String },

    /// Transient faults persisted after the retry budget was spent.
    #[error("infrastructure failure in {operation} after {attempts} attempts: {detail}")]
    TransientInfra {
        operation: String,
        attempts: u32,
        detail: String,
    },

    #[error("CI for {change_request} did not complete within {waited_secs}s")]
    CiTimeout {
        change_request: String,
        waited_secs: u64,
    },

    #[error("{regions} conflict region(s) require human resolution")]
    ComplexConflict { regions: usize },

    #[error("a review cycle for {change_request} is already running")]
    LockHeld { change_request: String },

    #[error("change request {change_request} is already {status}; no further transitions allowed")]
    TerminalState {
        change_request: String,
        status: String,
    },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("review cycle cancelled before stage {stage}")]
    Cancelled { stage: String },

    /// Non-retryable collaborator failure (bad request, not found, ...).
    #[error("{collaborator} error: {detail}")]
    Collaborator { collaborator: String, detail: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Build a retryable fault.
    pub fn transient(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        GateError::Transient {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Build a non-retryable collaborator failure.
    pub fn collaborator(collaborator: impl Into<String>, detail: impl Into<String>) -> Self {
        GateError::Collaborator {
            collaborator: collaborator.into(),
            detail: detail.into(),
        }
    }

    /// Whether the retry wrapper may try the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, GateError::Transient { .. })
    }
}

/// Result type for reviewgate domain operations.
pub type GateResult<T> = std::result::Result<T, GateError>;

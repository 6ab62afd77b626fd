use thiserror::Error;

/// Failure raised by an operation's `execute`.
///
/// Every variant is routed through an intervention round; none is retried
/// silently.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid input: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Failure raised by an intervention interface.
#[derive(Debug, Clone, Error)]
pub enum InterventionError {
    #[error("intervention interface closed")]
    Closed,

    #[error("intervention input error: {0}")]
    Input(String),
}

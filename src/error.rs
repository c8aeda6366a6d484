use thiserror::Error;

/// Errors that can occur in lattix-eval.
#[derive(Error, Debug)]
pub enum Error {
    /// Metric specification string does not follow the key grammar.
    #[error("Invalid metric specification: {0}")]
    InvalidSpecification(String),
    /// Invalid `k` for hits@k.
    #[error("Invalid k for hits_at_k: {0}")]
    InvalidK(String),
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Operation called in the wrong evaluator state.
    #[error("Invalid state: {0}")]
    State(String),
    /// A required input was not supplied.
    #[error("Missing input: {0}")]
    MissingInput(String),
    /// Array shapes do not line up.
    #[error("Shape mismatch: {0}")]
    Shape(String),
    /// Lookup miss (triple, metric entry, ...).
    #[error("Not found: {0}")]
    NotFound(String),
    /// Metric name with no registered reduction.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for lattix-eval.
pub type Result<T> = std::result::Result<T, Error>;

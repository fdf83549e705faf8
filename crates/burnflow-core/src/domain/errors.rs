use thiserror::Error;

/// Per-request validation failures. These never abort a batch; the request is
/// excluded with the error recorded as its reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Bad polygon: {0}")]
    BadPolygon(String),

    #[error("Bad time window: {0}")]
    BadTimeWindow(String),

    #[error("Unknown crop: {0}")]
    UnknownCrop(String),

    #[error("Invalid acreage: {0} (must be > 0)")]
    InvalidAcreage(f64),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input for request {request_id}: {reason}")]
    InvalidInput {
        request_id: u64,
        reason: ValidationError,
    },

    #[error("External dependency unavailable: {0}")]
    ExternalUnavailable(String),

    /// Hard data invariant violation. The only error kind that aborts a batch.
    #[error("Data conflict: {0}")]
    Conflict(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl PipelineError {
    /// Whether this error aborts the whole batch (everything else is
    /// collected per-request and reported as a warning).
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, PipelineError::Conflict(_))
    }
}

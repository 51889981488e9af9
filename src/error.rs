use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One partition's batch request that did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub partition: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    /// A precondition on user-supplied input was violated. Surfaced before
    /// any network call is attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no term reports selected")]
    EmptySelection,

    /// Bearer token rejected; the session layer handles re-authentication.
    #[error("authentication rejected by the backend")]
    Authentication,

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response shape from {url}: {message}")]
    Decode { url: String, message: String },

    /// Every partition of a batch operation failed; nothing was updated.
    #[error("all batch partition requests failed")]
    AllPartitionsFailed { failures: Vec<PartitionFailure> },
}

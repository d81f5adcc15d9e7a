//! Error types for kc-table

use kube::core::ErrorResponse;
use thiserror::Error;

/// Result type for kc-table operations
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors that can occur while fetching or converting server-side tables
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TableError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Request could not be built
    #[error("failed to build request: {0}")]
    BuildRequest(#[from] kube::core::request::Error),

    /// Request URI rewrite failed
    #[error("invalid request uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// A Row or RowList was handed to the cache without its target kind set
    #[error("missing target group-version-kind on {kind}; set it before any cache call")]
    MissingTarget { kind: &'static str },

    /// The requested row does not exist in the table response
    #[error("row '{name}' not found")]
    RowNotFound { name: String },

    /// Error status received on a watch stream
    #[error("watch error status: {}", .0.message)]
    WatchStatus(ErrorResponse),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TableError {
    /// Check if this is a "row not found" error that callers may ignore
    pub fn is_not_found(&self) -> bool {
        match self {
            TableError::RowNotFound { .. } => true,
            TableError::Api(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}

//! Error types for kc-nav

use thiserror::Error;

/// Result type for kc-nav operations
pub type Result<T> = std::result::Result<T, NavError>;

/// Errors that can occur while populating or navigating folders
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NavError {
    /// Cluster read error
    #[error(transparent)]
    Cluster(#[from] kc_cluster::ClusterError),

    /// Table fetch or conversion error
    #[error(transparent)]
    Table(#[from] kc_table::TableError),

    /// An unstructured object could not be decoded into its concrete kind
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// YAML rendering for the viewer failed
    #[error("failed to render yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The row has no folder behind it
    #[error("row '{id}' cannot be entered")]
    NotEnterable { id: String },

    /// The row has no view content
    #[error("row '{id}' has no view content")]
    NotViewable { id: String },
}

impl NavError {
    /// Check if this is a "not found" error that callers may ignore
    pub fn is_not_found(&self) -> bool {
        match self {
            NavError::Cluster(err) => err.is_not_found(),
            NavError::Table(err) => err.is_not_found(),
            _ => false,
        }
    }
}

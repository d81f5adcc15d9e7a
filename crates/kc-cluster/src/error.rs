//! Error types for kc-cluster

use thiserror::Error;

/// Result type for kc-cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur while reading from a cluster
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClusterError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Table fetch or conversion error
    #[error(transparent)]
    Table(#[from] kc_table::TableError),

    /// The discovery data has no entry for the requested resource
    #[error("no resource '{gvr}' known to the server")]
    NoSuchResource { gvr: String },

    /// The discovery data has no entry for the requested kind
    #[error("no kind '{gvk}' known to the server")]
    NoSuchKind { gvk: String },

    /// The server does not allow watching this resource; callers downgrade
    /// instead of retrying
    #[error("resource '{gvr}' cannot be watched: {reason}")]
    WatchUnsupported { gvr: String, reason: String },

    /// Object not found in the cache; callers may explicitly ignore this
    #[error("'{name}' not found in {gvr}")]
    NotFound { gvr: String, name: String },

    /// Row kinds are served straight from table fetches; there is no
    /// informer to hand out for them
    #[error("informers are not supported for table kind '{kind}'")]
    RowInformerUnsupported { kind: String },
}

impl ClusterError {
    /// Check if this is a "not found" error that callers may ignore
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::NotFound { .. } => true,
            ClusterError::Api(kube::Error::Api(resp)) => resp.code == 404,
            ClusterError::Table(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this is the watch-unsupported downgrade signal
    pub fn is_watch_unsupported(&self) -> bool {
        matches!(self, ClusterError::WatchUnsupported { .. })
    }
}

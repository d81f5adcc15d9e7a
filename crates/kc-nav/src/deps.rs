//! Shared folder dependencies

use std::sync::Arc;

use async_trait::async_trait;
use kc_cluster::Cluster;

use crate::config::UiConfig;
use crate::error::Result;
use crate::folder::Folder;

/// Kubeconfig contexts, provided by the host application
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Context names of the active kubeconfig
    fn names(&self) -> Vec<String>;

    /// Folder for one context; `None` when the host does not support
    /// entering contexts from the core
    async fn enter(&self, name: &str) -> Result<Option<Box<dyn Folder>>> {
        let _ = name;
        Ok(None)
    }
}

/// Everything a folder needs to populate itself
#[derive(Clone)]
pub struct Deps {
    pub cluster: Arc<Cluster>,
    pub config: Arc<UiConfig>,
    pub contexts: Option<Arc<dyn ContextSource>>,
}

impl Deps {
    pub fn new(cluster: Arc<Cluster>, config: Arc<UiConfig>) -> Self {
        Deps {
            cluster,
            config,
            contexts: None,
        }
    }

    pub fn with_contexts(mut self, contexts: Arc<dyn ContextSource>) -> Self {
        self.contexts = Some(contexts);
        self
    }
}

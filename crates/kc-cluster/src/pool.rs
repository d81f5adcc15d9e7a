//! Per-context cluster pool with idle eviction
//!
//! One [`Cluster`] per `(kubeconfig path, context)` pair; entries are kept
//! for a fixed TTL after last use and cancelled on eviction. The REST config
//! itself comes from an external [`ConfigSource`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cluster::Cluster;
use crate::error::Result;

/// Default idle TTL before an unused cluster is evicted
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(300);

/// Identifies one cluster connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    pub kubeconfig_path: String,
    pub context: String,
}

impl ClusterKey {
    pub fn new(kubeconfig_path: &str, context: &str) -> Self {
        ClusterKey {
            kubeconfig_path: kubeconfig_path.to_string(),
            context: context.to_string(),
        }
    }
}

/// Provides a REST config per cluster key; kubeconfig discovery lives
/// outside the core
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn rest_config(&self, key: &ClusterKey) -> Result<kube::Config>;
}

struct PoolEntry {
    cluster: Arc<Cluster>,
    last_used: Instant,
    token: CancellationToken,
}

pub struct ClusterPool {
    source: Arc<dyn ConfigSource>,
    idle_ttl: Duration,
    entries: Mutex<HashMap<ClusterKey, PoolEntry>>,
}

impl ClusterPool {
    pub fn new(source: Arc<dyn ConfigSource>, idle_ttl: Duration) -> Self {
        ClusterPool {
            source,
            idle_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the cluster for a key, stamping its last use
    pub async fn get(&self, key: &ClusterKey) -> Result<Arc<Cluster>> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.last_used = Instant::now();
            return Ok(entry.cluster.clone());
        }

        let config = self.source.rest_config(key).await?;
        let cluster = Arc::new(Cluster::new(config)?);
        let token = CancellationToken::new();
        tokio::spawn({
            let cluster = cluster.clone();
            let token = token.clone();
            async move {
                let _ = cluster.start(token).await;
            }
        });

        debug!(context = %key.context, "cluster added to pool");
        entries.insert(
            key.clone(),
            PoolEntry {
                cluster: cluster.clone(),
                last_used: Instant::now(),
                token,
            },
        );
        Ok(cluster)
    }

    /// Evict entries idle for longer than the TTL, cancelling their runtimes
    pub async fn sweep(&self) {
        let mut entries = self.entries.lock().await;
        let ttl = self.idle_ttl;
        entries.retain(|key, entry| {
            if entry.last_used.elapsed() <= ttl {
                return true;
            }
            debug!(context = %key.context, "evicting idle cluster");
            entry.token.cancel();
            entry.cluster.stop();
            false
        });
    }

    /// Periodic sweep loop until cancelled
    pub async fn run(&self, token: CancellationToken) {
        let period = self.idle_ttl.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = token.cancelled() => return,
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

//! Per-cluster runtime
//!
//! A [`Cluster`] owns the REST config, a lazily-run discovery mapper, the
//! informer-backed object cache and the table cache, and exposes the uniform
//! read API the navigation layer is built on. Construction performs no I/O;
//! discovery runs on first use and is refreshed on a ticker once
//! [`Cluster::start`] is driving the runtime.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kc_table::{Row, RowList, RowWatcher, TableClient};
use kube::api::{Api, DynamicObject, ListParams, LogParams};
use kube::core::GroupVersionKind;
use kube::{Client, Config};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::discovery::{Gvr, ResourceInfo, ResourceMapper};
use crate::error::Result;
use crate::objects::{ObjectCache, ObjectEvent};
use crate::tables::TableCache;

/// Default interval for discovery cache invalidation
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of log lines fetched for a container
pub const DEFAULT_LOG_TAIL_LINES: i64 = 200;

pub struct Cluster {
    config: Config,
    client: Client,
    mapper: Arc<ResourceMapper>,
    objects: Arc<ObjectCache>,
    tables: TableCache,
    refresh_interval: Duration,
    token: CancellationToken,
}

impl Cluster {
    /// Create a cluster runtime for a REST config. No I/O happens here; the
    /// discovery mapper and informers initialize lazily.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_refresh_interval(config, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(config: Config, refresh_interval: Duration) -> Result<Self> {
        let client = Client::try_from(config.clone())?;
        let mapper = Arc::new(ResourceMapper::new(client.clone()));
        let objects = Arc::new(ObjectCache::new(client.clone(), mapper.clone()));
        let tables = TableCache::new(TableClient::new(client.clone()), objects.clone(), mapper.clone());
        Ok(Cluster {
            config,
            client,
            mapper,
            objects,
            tables,
            refresh_interval,
            token: CancellationToken::new(),
        })
    }

    /// Drive the runtime until `token` (or [`Cluster::stop`]) cancels it:
    /// refresh discovery on the configured interval and keep the caches
    /// running. Blocks for the life of the cluster and returns the first
    /// error.
    pub async fn start(&self, token: CancellationToken) -> Result<()> {
        let start = tokio::time::Instant::now() + self.refresh_interval;
        let mut ticker = tokio::time::interval_at(start, self.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                () = token.cancelled() => break Ok(()),
                () = self.token.cancelled() => break Ok(()),
                _ = ticker.tick() => {
                    if let Err(err) = self.mapper.refresh().await {
                        warn!(error = %err, "discovery refresh failed");
                        break Err(err);
                    }
                }
            }
        };
        debug!("cluster runtime stopping");
        self.objects.shutdown();
        result
    }

    /// Cancel the internal refresh loop and all informers. Callers
    /// additionally cancel the token passed to [`Cluster::start`].
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn rest_config(&self) -> &Config {
        &self.config
    }

    pub fn mapper(&self) -> &Arc<ResourceMapper> {
        &self.mapper
    }

    pub fn objects(&self) -> &Arc<ObjectCache> {
        &self.objects
    }

    pub fn tables(&self) -> &TableCache {
        &self.tables
    }

    /// Flattened server-preferred resources, minus subresources; server
    /// order, callers sort
    pub async fn resource_infos(&self) -> Result<Vec<ResourceInfo>> {
        self.mapper.resource_infos().await
    }

    /// Cache-backed unstructured list. `None` namespace means cluster-scope
    /// or all namespaces.
    pub async fn list_by_gvr(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
    ) -> Result<Vec<Arc<DynamicObject>>> {
        self.objects.list(gvr, namespace).await
    }

    /// Cache-backed unstructured get
    pub async fn get_by_gvr(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Arc<DynamicObject>> {
        self.objects.get(gvr, namespace, name).await
    }

    /// Direct `limit=1` list, bypassing informers. Used for non-empty
    /// filtering without forcing an informer start.
    pub async fn has_any_by_gvr(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<bool> {
        let (ar, _caps) = self.mapper.resolve_gvr(gvr).await?;
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };
        let list = api.list(&peek_params()).await?;
        Ok(!list.items.is_empty())
    }

    /// List a resource in Row form, including column definitions
    pub async fn list_rows_by_gvr(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<RowList> {
        let (ar, _caps) = self.mapper.resolve_gvr(gvr).await?;
        let mut list = RowList::new(GroupVersionKind::gvk(&ar.group, &ar.version, &ar.kind));
        self.tables.list(&mut list, namespace).await?;
        Ok(list)
    }

    /// Fetch a single object in Row form
    pub async fn get_row_by_gvr(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Row> {
        let (ar, _caps) = self.mapper.resolve_gvr(gvr).await?;
        let mut row = Row::new(GroupVersionKind::gvk(&ar.group, &ar.version, &ar.kind));
        self.tables.get(namespace, name, &mut row).await?;
        Ok(row)
    }

    /// Row-level watch for a GVR, with the object-watch fallback built in
    pub async fn watch_rows_by_gvr(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<RowWatcher> {
        let (ar, _caps) = self.mapper.resolve_gvr(gvr).await?;
        let target = GroupVersionKind::gvk(&ar.group, &ar.version, &ar.kind);
        Ok(self.tables.fetcher().watch_rows(
            ar,
            namespace.map(str::to_string),
            target,
            resource_version.to_string(),
        ))
    }

    /// Subscribe to informer events for a GVR, starting its informer if
    /// needed. The first caller blocks on the initial sync.
    pub async fn subscribe_gvr(&self, gvr: &Gvr) -> Result<broadcast::Receiver<ObjectEvent>> {
        self.objects.subscribe(gvr).await
    }

    /// Number of objects in the informer store for a GVR
    pub async fn store_len(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<usize> {
        self.objects.store_len(gvr, namespace).await
    }

    /// Last `tail_lines` of a container's log
    pub async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: i64,
    ) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        Ok(api.logs(pod, &params).await?)
    }
}

/// List parameters of a single-item existence probe
fn peek_params() -> ListParams {
    ListParams::default().limit(1)
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Informer-backed object cache
//!
//! One background watcher per GVR keeps an insertion-ordered store of
//! unstructured objects and fans change events out to subscribers. Informers
//! start lazily on first demand, stay alive for the life of the cluster, and
//! are only torn down when the cluster stops. A server that refuses watches
//! for a resource (405) downgrades that GVR to [`ClusterError::WatchUnsupported`]
//! once; the failed entry is kept so later callers see the same answer
//! without retrying.

use std::pin::pin;
use std::sync::{Arc, RwLock as StdRwLock};

use dashmap::DashMap;
use futures::StreamExt;
use indexmap::IndexMap;
use kube::Client;
use kube::api::{Api, DynamicObject};
use kube::discovery::verbs;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event, watcher};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::discovery::{Gvr, ResourceMapper};
use crate::error::{ClusterError, Result};

/// Capacity of the per-GVR event fan-out; consumers coalesce into a dirty
/// bit, so lagging receivers only lose redundant notifications
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What happened to an object in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectEventKind {
    Added,
    Modified,
    Deleted,
}

/// A change notification from an informer
#[derive(Debug, Clone)]
pub struct ObjectEvent {
    pub kind: ObjectEventKind,
    pub namespace: Option<String>,
    pub name: String,
    /// The object, when the event still carries one
    pub object: Option<Arc<DynamicObject>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    fn of(object: &DynamicObject) -> Self {
        ObjectKey {
            namespace: object.metadata.namespace.clone(),
            name: object.metadata.name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StoreState {
    Pending,
    Ready,
    Failed(String),
}

type Store = IndexMap<ObjectKey, Arc<DynamicObject>>;

struct GvrStore {
    objects: StdRwLock<Store>,
    state_rx: watch::Receiver<StoreState>,
    events: broadcast::Sender<ObjectEvent>,
    token: CancellationToken,
}

/// Lazily-started informer cache over unstructured objects
pub struct ObjectCache {
    client: Client,
    mapper: Arc<ResourceMapper>,
    stores: DashMap<Gvr, Arc<GvrStore>>,
    token: CancellationToken,
}

impl ObjectCache {
    pub fn new(client: Client, mapper: Arc<ResourceMapper>) -> Self {
        ObjectCache {
            client,
            mapper,
            stores: DashMap::new(),
            token: CancellationToken::new(),
        }
    }

    /// List objects from the informer store; `None` namespace means all
    pub async fn list(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<Arc<DynamicObject>>> {
        let store = self.ensure(gvr).await?;
        let objects = store.objects.read().expect("store lock poisoned");
        Ok(objects
            .iter()
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .map(|(_, object)| object.clone())
            .collect())
    }

    /// Get a single object from the informer store
    pub async fn get(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Arc<DynamicObject>> {
        let store = self.ensure(gvr).await?;
        let key = ObjectKey {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        };
        store
            .objects
            .read()
            .expect("store lock poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                gvr: gvr.to_string(),
                name: name.to_string(),
            })
    }

    /// Number of stored objects, optionally per namespace
    pub async fn store_len(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<usize> {
        let store = self.ensure(gvr).await?;
        let objects = store.objects.read().expect("store lock poisoned");
        Ok(match namespace {
            None => objects.len(),
            Some(ns) => objects
                .keys()
                .filter(|key| key.namespace.as_deref() == Some(ns))
                .count(),
        })
    }

    /// Subscribe to change events for a GVR, starting its informer if needed
    pub async fn subscribe(&self, gvr: &Gvr) -> Result<broadcast::Receiver<ObjectEvent>> {
        let store = self.ensure(gvr).await?;
        Ok(store.events.subscribe())
    }

    /// Whether an informer for the GVR has been started (and not failed)
    pub fn has_informer(&self, gvr: &Gvr) -> bool {
        self.stores
            .get(gvr)
            .is_some_and(|store| *store.state_rx.borrow() == StoreState::Ready)
    }

    /// Cancel every informer task. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
        for entry in self.stores.iter() {
            entry.value().token.cancel();
        }
    }

    /// Ensure the informer for a GVR is running and synced
    async fn ensure(&self, gvr: &Gvr) -> Result<Arc<GvrStore>> {
        // the map guard must not be held across the resolve await below
        let existing = self.stores.get(gvr).map(|entry| Arc::clone(&entry));
        let store = match existing {
            Some(store) => store,
            None => {
                let (ar, caps) = self.mapper.resolve_gvr(gvr).await?;
                if !caps.supports_operation(verbs::LIST) || !caps.supports_operation(verbs::WATCH) {
                    return Err(ClusterError::WatchUnsupported {
                        gvr: gvr.to_string(),
                        reason: "server does not advertise list+watch".to_string(),
                    });
                }
                let entry = self
                    .stores
                    .entry(gvr.clone())
                    .or_insert_with(|| self.spawn_informer(gvr.clone(), ar));
                Arc::clone(&entry)
            }
        };

        // wait for the initial sync once per informer; later callers pass
        // straight through
        let mut state_rx = store.state_rx.clone();
        let state = state_rx
            .wait_for(|state| *state != StoreState::Pending)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| StoreState::Failed("informer task ended".to_string()));

        match state {
            StoreState::Ready => Ok(store),
            StoreState::Pending => unreachable!("wait_for returned pending"),
            StoreState::Failed(reason) => Err(ClusterError::WatchUnsupported {
                gvr: gvr.to_string(),
                reason,
            }),
        }
    }

    fn spawn_informer(&self, gvr: Gvr, ar: kube::api::ApiResource) -> Arc<GvrStore> {
        let (state_tx, state_rx) = watch::channel(StoreState::Pending);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let token = self.token.child_token();
        let store = Arc::new(GvrStore {
            objects: StdRwLock::new(IndexMap::new()),
            state_rx,
            events: events_tx,
            token: token.clone(),
        });

        debug!(gvr = %gvr, "starting informer");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        tokio::spawn(run_informer(api, gvr, store.clone(), state_tx, token));
        store
    }
}

async fn run_informer(
    api: Api<DynamicObject>,
    gvr: Gvr,
    store: Arc<GvrStore>,
    state_tx: watch::Sender<StoreState>,
    token: CancellationToken,
) {
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = pin!(stream);
    let mut pending: Option<Store> = None;

    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!(gvr = %gvr, "informer stopped");
                return;
            }
            event = stream.next() => match event {
                None => return,
                Some(Ok(Event::Init)) => pending = Some(IndexMap::new()),
                Some(Ok(Event::InitApply(object))) => {
                    if let Some(pending) = pending.as_mut() {
                        pending.insert(ObjectKey::of(&object), Arc::new(object));
                    }
                }
                Some(Ok(Event::InitDone)) => {
                    let fresh = pending.take().unwrap_or_default();
                    let changes = {
                        let mut objects = store.objects.write().expect("store lock poisoned");
                        let old = std::mem::replace(&mut *objects, fresh.clone());
                        diff_stores(&old, &fresh)
                    };
                    for event in changes {
                        let _ = store.events.send(event);
                    }
                    let _ = state_tx.send(StoreState::Ready);
                }
                Some(Ok(Event::Apply(object))) => {
                    let object = Arc::new(object);
                    let key = ObjectKey::of(&object);
                    let previous = store
                        .objects
                        .write()
                        .expect("store lock poisoned")
                        .insert(key.clone(), object.clone());
                    let kind = if previous.is_some() {
                        ObjectEventKind::Modified
                    } else {
                        ObjectEventKind::Added
                    };
                    let _ = store.events.send(ObjectEvent {
                        kind,
                        namespace: key.namespace,
                        name: key.name,
                        object: Some(object),
                    });
                }
                Some(Ok(Event::Delete(object))) => {
                    let key = ObjectKey::of(&object);
                    store
                        .objects
                        .write()
                        .expect("store lock poisoned")
                        .shift_remove(&key);
                    let _ = store.events.send(ObjectEvent {
                        kind: ObjectEventKind::Deleted,
                        namespace: key.namespace,
                        name: key.name,
                        object: Some(Arc::new(object)),
                    });
                }
                Some(Err(err)) => {
                    if watch_unsupported(&err) {
                        warn!(gvr = %gvr, "watch not allowed, downgrading informer");
                        let _ = state_tx.send(StoreState::Failed(
                            "watch not allowed for resource".to_string(),
                        ));
                        return;
                    }
                    // the backoff wrapper re-establishes the watch
                    warn!(gvr = %gvr, error = %err, "informer watch error");
                }
            },
        }
    }
}

/// 405 from the initial list or watch start means the resource cannot be
/// watched at all, not that the watch momentarily failed
fn watch_unsupported(err: &watcher::Error) -> bool {
    match err {
        watcher::Error::InitialListFailed(kube::Error::Api(resp))
        | watcher::Error::WatchStartFailed(kube::Error::Api(resp)) => resp.code == 405,
        _ => false,
    }
}

/// Changes between two store snapshots after a re-list
fn diff_stores(old: &Store, new: &Store) -> Vec<ObjectEvent> {
    let mut events = Vec::new();
    for (key, object) in old {
        if !new.contains_key(key) {
            events.push(ObjectEvent {
                kind: ObjectEventKind::Deleted,
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                object: Some(object.clone()),
            });
        }
    }
    for (key, object) in new {
        let kind = match old.get(key) {
            None => ObjectEventKind::Added,
            Some(previous)
                if previous.metadata.resource_version != object.metadata.resource_version =>
            {
                ObjectEventKind::Modified
            }
            Some(_) => continue,
        };
        events.push(ObjectEvent {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            object: Some(object.clone()),
        });
    }
    events
}

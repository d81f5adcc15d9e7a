//! Resource-group rows
//!
//! One row per GVR in a resources folder, carrying an asynchronously
//! resolved object count and an emptiness observation used by the
//! show-non-empty filter. Observations are cached on the item and survive
//! folder re-populates; the on-change hook fires once per distinct value
//! transition.

use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use kc_cluster::{Cluster, Gvr};
use tokio::time::Instant;
use tracing::warn;

use crate::error::Result;
use crate::folder::Folder;
use crate::item::{Countable, CountState, Enterable, EnterFn, Item};

/// Callback fired when a count or emptiness observation changes
pub type ChangeHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
struct GroupState {
    count: CountState,
    empty: Option<bool>,
    last_peek: Option<Instant>,
    counting: bool,
    peeking: bool,
}

impl Default for GroupState {
    fn default() -> Self {
        GroupState {
            count: CountState::Unknown,
            empty: None,
            last_peek: None,
            counting: false,
            peeking: false,
        }
    }
}

/// Observation state shared with the background resolution tasks
#[derive(Default)]
pub(crate) struct GroupCore {
    state: StdMutex<GroupState>,
    on_change: OnceLock<ChangeHook>,
}

impl GroupCore {
    fn fire(&self) {
        if let Some(hook) = self.on_change.get() {
            hook();
        }
    }

    /// Publish a count observation; also answers emptiness. Fires the
    /// on-change hook only when a value actually transitions.
    pub(crate) fn publish_count(&self, count: usize) {
        let changed = {
            let mut state = self.state.lock().expect("group state lock poisoned");
            state.counting = false;
            let fresh_count = CountState::Known(count);
            let fresh_empty = Some(count == 0);
            let changed = state.count != fresh_count || state.empty != fresh_empty;
            state.count = fresh_count;
            state.empty = fresh_empty;
            state.last_peek = Some(Instant::now());
            changed
        };
        if changed {
            self.fire();
        }
    }

    /// Publish an emptiness observation from a peek
    pub(crate) fn publish_empty(&self, empty: bool) {
        let changed = {
            let mut state = self.state.lock().expect("group state lock poisoned");
            state.peeking = false;
            state.last_peek = Some(Instant::now());
            let changed = state.empty != Some(empty);
            state.empty = Some(empty);
            changed
        };
        if changed {
            self.fire();
        }
    }

    /// The server refused to watch this resource: count pins to zero, the
    /// group reads as empty, and no further resolution is attempted
    pub(crate) fn publish_non_watchable(&self) {
        let changed = {
            let mut state = self.state.lock().expect("group state lock poisoned");
            state.counting = false;
            state.peeking = false;
            state.last_peek = Some(Instant::now());
            let changed =
                state.count != CountState::NonWatchable || state.empty != Some(true);
            state.count = CountState::NonWatchable;
            state.empty = Some(true);
            changed
        };
        if changed {
            self.fire();
        }
    }

    fn abandon_count(&self) {
        self.state.lock().expect("group state lock poisoned").counting = false;
    }

    fn abandon_peek(&self) {
        self.state.lock().expect("group state lock poisoned").peeking = false;
    }
}

/// One resource group (a GVR, optionally bound to a namespace) shown as an
/// enterable, countable row
pub struct ResourceGroupItem {
    id: String,
    resource_cell: String,
    group_cell: String,
    path: Vec<String>,
    gvr: Gvr,
    namespace: Option<String>,
    cluster: Arc<Cluster>,
    peek_interval: Duration,
    core: Arc<GroupCore>,
    enter: EnterFn,
}

impl ResourceGroupItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster: Arc<Cluster>,
        peek_interval: Duration,
        id: String,
        gvr: Gvr,
        namespace: Option<String>,
        path: Vec<String>,
        group_cell: String,
        enter: EnterFn,
    ) -> Self {
        ResourceGroupItem {
            resource_cell: format!("/{}", gvr.resource),
            id,
            group_cell,
            path,
            gvr,
            namespace,
            cluster,
            peek_interval,
            core: Arc::new(GroupCore::default()),
            enter,
        }
    }

    /// Install the observation-change hook; set-once
    pub fn set_on_change(&self, hook: ChangeHook) {
        let _ = self.core.on_change.set(hook);
    }

    pub fn gvr(&self) -> &Gvr {
        &self.gvr
    }

    pub fn watchable(&self) -> bool {
        self.current_count() != CountState::NonWatchable
    }

    fn current_count(&self) -> CountState {
        self.core
            .state
            .lock()
            .expect("group state lock poisoned")
            .count
    }

    /// Current count observation. The first demand kicks off an async
    /// resolution through the informer store; later demands refresh it in
    /// the background without blocking.
    pub fn resolve_count(&self) -> CountState {
        let spawn = {
            let mut state = self.core.state.lock().expect("group state lock poisoned");
            if state.count == CountState::NonWatchable || state.counting {
                false
            } else {
                state.counting = true;
                true
            }
        };

        if spawn {
            let cluster = self.cluster.clone();
            let gvr = self.gvr.clone();
            let namespace = self.namespace.clone();
            let core = self.core.clone();
            tokio::spawn(async move {
                match cluster.store_len(&gvr, namespace.as_deref()).await {
                    Ok(count) => core.publish_count(count),
                    Err(err) if err.is_watch_unsupported() => core.publish_non_watchable(),
                    Err(err) => {
                        warn!(gvr = %gvr, error = %err, "count resolution failed");
                        core.abandon_count();
                    }
                }
            });
        }
        self.current_count()
    }

    /// Fresh emptiness observation, `None` while unknown or stale. A stale
    /// observation kicks off a background peek (`limit=1` list) that does
    /// not start an informer.
    pub fn empty(&self) -> Option<bool> {
        let (observation, spawn) = {
            let mut state = self.core.state.lock().expect("group state lock poisoned");
            if state.count == CountState::NonWatchable {
                return Some(true);
            }
            let fresh = state
                .last_peek
                .is_some_and(|at| at.elapsed() <= self.peek_interval);
            if fresh {
                return state.empty;
            }
            let spawn = if state.peeking {
                false
            } else {
                state.peeking = true;
                true
            };
            (None, spawn)
        };

        if spawn {
            let cluster = self.cluster.clone();
            let gvr = self.gvr.clone();
            let namespace = self.namespace.clone();
            let core = self.core.clone();
            tokio::spawn(async move {
                match cluster.has_any_by_gvr(&gvr, namespace.as_deref()).await {
                    Ok(has_any) => core.publish_empty(!has_any),
                    Err(err) => {
                        warn!(gvr = %gvr, error = %err, "peek failed");
                        core.abandon_peek();
                    }
                }
            });
        }
        observation
    }

    /// Whether the row stays visible under the show-non-empty filter
    pub fn visible(&self, show_non_empty_only: bool) -> bool {
        !show_non_empty_only || self.empty() != Some(true)
    }

    /// The `(id, cells, path, visibility)` tuple the finalize signature is
    /// built from
    pub fn signature_entry(&self, visible: bool) -> (String, Vec<String>, Vec<String>, bool) {
        (self.id.clone(), self.cells(), self.path.clone(), visible)
    }
}

impl Item for ResourceGroupItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.resource_cell.clone(),
            self.group_cell.clone(),
            self.resolve_count().cell_text(),
        ]
    }

    fn path(&self) -> Option<Vec<String>> {
        Some(self.path.clone())
    }

    fn enterable(&self) -> Option<&dyn Enterable> {
        Some(self)
    }

    fn countable(&self) -> Option<&dyn Countable> {
        Some(self)
    }
}

#[async_trait]
impl Enterable for ResourceGroupItem {
    async fn enter(&self) -> Result<Box<dyn Folder>> {
        (self.enter)().await
    }
}

impl Countable for ResourceGroupItem {
    fn count(&self) -> CountState {
        self.resolve_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn core_with_counter() -> (Arc<GroupCore>, Arc<AtomicUsize>) {
        let core = Arc::new(GroupCore::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let hook_fired = fired.clone();
        let _ = core.on_change.set(Arc::new(move || {
            hook_fired.fetch_add(1, Ordering::SeqCst);
        }));
        (core, fired)
    }

    #[test]
    fn test_count_transition_fires_once() {
        let (core, fired) = core_with_counter();

        core.publish_count(3);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // equal re-publication does not fire
        core.publish_count(3);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        core.publish_count(4);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_transition_fires_once() {
        let (core, fired) = core_with_counter();

        core.publish_empty(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        core.publish_empty(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        core.publish_empty(false);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_watchable_downgrade_happens_once() {
        let (core, fired) = core_with_counter();

        core.publish_non_watchable();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        {
            let state = core.state.lock().unwrap();
            assert_eq!(state.count, CountState::NonWatchable);
            assert_eq!(state.empty, Some(true));
        }

        core.publish_non_watchable();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_count_publication_answers_emptiness() {
        let (core, fired) = core_with_counter();

        core.publish_count(0);
        let state = core.state.lock().unwrap();
        assert_eq!(state.count, CountState::Known(0));
        assert_eq!(state.empty, Some(true));
        drop(state);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

//! Row sources
//!
//! A row source owns the snapshot a folder reads through the windowed
//! interface. [`SnapshotSource`] re-runs its populate callback whenever the
//! dirty flag is set; [`LiveSource`] additionally subscribes to the cluster's
//! informer for its target GVR and flips the flag on every matching event.
//! A populate failure keeps the previous snapshot and leaves the source
//! dirty, so the next read retries; the core never caches a failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use kc_cluster::{Cluster, Gvr, ObjectEvent};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;
use crate::item::{Item, is_nav_item};

/// Callback invoked when a source turns dirty asynchronously
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// A dirty flag shared between a source and its owning folder, with a
/// set-once notifier towards the UI layer
#[derive(Clone, Default)]
pub struct DirtySignal {
    inner: Arc<DirtyInner>,
}

#[derive(Default)]
struct DirtyInner {
    dirty: AtomicBool,
    notifier: OnceLock<Notifier>,
}

impl DirtySignal {
    pub fn new() -> Self {
        DirtySignal::default()
    }

    /// Set the flag and notify
    pub fn mark(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Set or clear the flag without notifying
    pub fn set(&self, dirty: bool) {
        self.inner.dirty.store(dirty, Ordering::SeqCst);
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Invoke the notifier without touching the flag
    pub fn notify(&self) {
        if let Some(notifier) = self.inner.notifier.get() {
            notifier();
        }
    }

    /// Install the notifier; later calls are ignored
    pub fn set_notifier(&self, notifier: Notifier) {
        let _ = self.inner.notifier.set(notifier);
    }
}

/// The windowed row interface folders read through
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Rows `[top, top+num)`, clamped; out of range yields an empty window
    async fn lines(&self, top: usize, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    /// Rows at positions `[idx-num, idx)` relative to the row with `id`
    async fn above(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    /// Rows at positions `[idx+1, idx+1+num)` relative to the row with `id`
    async fn below(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    async fn len(&self) -> Result<usize>;

    async fn find(&self, id: &str) -> Result<Option<(usize, Arc<dyn Item>)>>;

    /// Like [`RowSource::find`], but only rows satisfying the richer
    /// navigation item contract
    async fn item_by_id(&self, id: &str) -> Result<Option<Arc<dyn Item>>>;

    fn mark_dirty(&self);

    fn signal(&self) -> &DirtySignal;
}

pub type PopulateFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<Arc<dyn Item>>>> + Send + Sync>;

#[derive(Default)]
struct Snapshot {
    rows: Vec<Arc<dyn Item>>,
    index: HashMap<String, usize>,
    populated: bool,
}

/// A source backed by a one-shot populate callback
pub struct SnapshotSource {
    populate: PopulateFn,
    state: Mutex<Snapshot>,
    signal: DirtySignal,
}

impl SnapshotSource {
    pub fn new(populate: PopulateFn) -> Self {
        Self::with_signal(populate, DirtySignal::new())
    }

    pub fn with_signal(populate: PopulateFn, signal: DirtySignal) -> Self {
        SnapshotSource {
            populate,
            state: Mutex::new(Snapshot::default()),
            signal,
        }
    }

    /// Lock the snapshot, re-populating when dirty. The lock is held across
    /// the populate so there is a single writer.
    async fn ensure(&self) -> Result<tokio::sync::MutexGuard<'_, Snapshot>> {
        let mut state = self.state.lock().await;
        let was_dirty = self.signal.take();
        if was_dirty || !state.populated {
            match (self.populate)().await {
                Ok(rows) => {
                    state.index = rows
                        .iter()
                        .enumerate()
                        .map(|(i, row)| (row.id().to_string(), i))
                        .collect();
                    state.rows = rows;
                    state.populated = true;
                }
                Err(err) => {
                    // keep the last-good snapshot, stay dirty, retry on the
                    // next read
                    self.signal.set(true);
                    return Err(err);
                }
            }
        }
        Ok(state)
    }
}

fn window(rows: &[Arc<dyn Item>], top: usize, num: usize) -> Vec<Arc<dyn Item>> {
    if top >= rows.len() {
        return Vec::new();
    }
    rows[top..(top + num).min(rows.len())].to_vec()
}

#[async_trait]
impl RowSource for SnapshotSource {
    async fn lines(&self, top: usize, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        let state = self.ensure().await?;
        Ok(window(&state.rows, top, num))
    }

    async fn above(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        let state = self.ensure().await?;
        let Some(&idx) = state.index.get(id) else {
            return Ok(Vec::new());
        };
        let start = idx.saturating_sub(num);
        Ok(state.rows[start..idx].to_vec())
    }

    async fn below(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        let state = self.ensure().await?;
        let Some(&idx) = state.index.get(id) else {
            return Ok(Vec::new());
        };
        Ok(window(&state.rows, idx + 1, num))
    }

    async fn len(&self) -> Result<usize> {
        let state = self.ensure().await?;
        Ok(state.rows.len())
    }

    async fn find(&self, id: &str) -> Result<Option<(usize, Arc<dyn Item>)>> {
        let state = self.ensure().await?;
        Ok(state
            .index
            .get(id)
            .map(|&idx| (idx, state.rows[idx].clone())))
    }

    async fn item_by_id(&self, id: &str) -> Result<Option<Arc<dyn Item>>> {
        let state = self.ensure().await?;
        Ok(state
            .index
            .get(id)
            .map(|&idx| state.rows[idx].clone())
            .filter(is_nav_item))
    }

    fn mark_dirty(&self) {
        self.signal.set(true);
    }

    fn signal(&self) -> &DirtySignal {
        &self.signal
    }
}

/// A snapshot source that also listens on the cluster's informer for its
/// target GVR, optionally narrowed to one namespace and one object name
pub struct LiveSource {
    inner: SnapshotSource,
    cluster: Arc<Cluster>,
    gvr: Gvr,
    namespace: Option<String>,
    name: Option<String>,
    registration: tokio::sync::OnceCell<()>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl LiveSource {
    pub fn new(
        populate: PopulateFn,
        signal: DirtySignal,
        cluster: Arc<Cluster>,
        gvr: Gvr,
        namespace: Option<String>,
        name: Option<String>,
    ) -> Self {
        LiveSource {
            inner: SnapshotSource::with_signal(populate, signal),
            cluster,
            gvr,
            namespace,
            name,
            registration: tokio::sync::OnceCell::new(),
            task: StdMutex::new(None),
        }
    }

    /// Register the informer handler on first use. A failed informer start
    /// downgrades to a plain snapshot source instead of failing the read.
    async fn ensure_registered(&self) {
        self.registration
            .get_or_init(|| async {
                match self.cluster.subscribe_gvr(&self.gvr).await {
                    Ok(mut events) => {
                        let signal = self.inner.signal.clone();
                        let namespace = self.namespace.clone();
                        let name = self.name.clone();
                        let task = tokio::spawn(async move {
                            loop {
                                match events.recv().await {
                                    Ok(event) => {
                                        if event_matches(&event, namespace.as_deref(), name.as_deref()) {
                                            signal.mark();
                                        }
                                    }
                                    // missed events coalesce into one repaint
                                    Err(RecvError::Lagged(_)) => signal.mark(),
                                    Err(RecvError::Closed) => return,
                                }
                            }
                        });
                        *self.task.lock().expect("task lock poisoned") = Some(task);
                    }
                    Err(err) => {
                        warn!(gvr = %self.gvr, error = %err, "informer unavailable, folder will not live-update");
                    }
                }
            })
            .await;
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().expect("task lock poisoned").take() {
            task.abort();
        }
    }
}

/// Namespace and name filter for informer events; events without an object
/// (final state unknown) still carry both fields
fn event_matches(event: &ObjectEvent, namespace: Option<&str>, name: Option<&str>) -> bool {
    if let Some(ns) = namespace
        && event.namespace.as_deref() != Some(ns)
    {
        return false;
    }
    if let Some(name) = name
        && event.name != name
    {
        return false;
    }
    true
}

#[async_trait]
impl RowSource for LiveSource {
    async fn lines(&self, top: usize, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        self.ensure_registered().await;
        self.inner.lines(top, num).await
    }

    async fn above(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        self.ensure_registered().await;
        self.inner.above(id, num).await
    }

    async fn below(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        self.ensure_registered().await;
        self.inner.below(id, num).await
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_registered().await;
        self.inner.len().await
    }

    async fn find(&self, id: &str) -> Result<Option<(usize, Arc<dyn Item>)>> {
        self.ensure_registered().await;
        self.inner.find(id).await
    }

    async fn item_by_id(&self, id: &str) -> Result<Option<Arc<dyn Item>>> {
        self.ensure_registered().await;
        self.inner.item_by_id(id).await
    }

    fn mark_dirty(&self) {
        self.inner.mark_dirty();
    }

    fn signal(&self) -> &DirtySignal {
        self.inner.signal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::item::RowItem;

    fn static_source(ids: &[&str]) -> SnapshotSource {
        let rows: Vec<Arc<dyn Item>> = ids
            .iter()
            .map(|id| Arc::new(RowItem::new(*id, vec![id.to_string()])) as Arc<dyn Item>)
            .collect();
        SnapshotSource::new(Arc::new(move || {
            let rows = rows.clone();
            Box::pin(async move { Ok(rows) })
        }))
    }

    fn counting_source(ids: &'static [&'static str], counter: Arc<AtomicUsize>) -> SnapshotSource {
        SnapshotSource::new(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(ids
                    .iter()
                    .map(|id| Arc::new(RowItem::new(*id, vec![id.to_string()])) as Arc<dyn Item>)
                    .collect())
            })
        }))
    }

    fn ids(rows: &[Arc<dyn Item>]) -> Vec<&str> {
        rows.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn test_lines_windowing() {
        let source = static_source(&["a", "b", "c", "d", "e"]);

        assert_eq!(ids(&source.lines(0, 3).await.unwrap()), ["a", "b", "c"]);
        assert_eq!(ids(&source.lines(3, 10).await.unwrap()), ["d", "e"]);
        assert!(source.lines(5, 2).await.unwrap().is_empty());
        assert!(source.lines(100, 2).await.unwrap().is_empty());
        assert!(source.lines(0, 0).await.unwrap().is_empty());
        assert_eq!(source.len().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_above_below_recover_contiguous_range() {
        let source = static_source(&["a", "b", "c", "d", "e"]);

        let above = source.above("c", 2).await.unwrap();
        let below = source.below("c", 2).await.unwrap();
        assert_eq!(ids(&above), ["a", "b"]);
        assert_eq!(ids(&below), ["d", "e"]);

        // above + anchor + below is the contiguous window around the anchor
        let (idx, anchor) = source.find("c").await.unwrap().unwrap();
        assert_eq!(idx, 2);
        let mut combined = ids(&above);
        combined.push(anchor.id());
        combined.extend(ids(&below));
        assert_eq!(combined, ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_above_clamps_at_start() {
        let source = static_source(&["a", "b", "c"]);
        assert_eq!(ids(&source.above("b", 10).await.unwrap()), ["a"]);
        assert!(source.above("a", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_yields_empty_windows() {
        let source = static_source(&["a"]);
        assert!(source.above("zz", 2).await.unwrap().is_empty());
        assert!(source.below("zz", 2).await.unwrap().is_empty());
        assert!(source.find("zz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_consistent_with_lines() {
        let source = static_source(&["a", "b", "c", "d"]);
        for (expect_idx, id) in ["a", "b", "c", "d"].iter().enumerate() {
            let (idx, row) = source.find(id).await.unwrap().unwrap();
            assert_eq!(idx, expect_idx);
            assert_eq!(row.id(), *id);
            let line = source.lines(idx, 1).await.unwrap();
            assert_eq!(line[0].id(), *id);
        }
    }

    #[tokio::test]
    async fn test_dirty_triggers_exactly_one_populate() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["a"], counter.clone());

        // first read populates
        source.lines(0, 1).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // clean reads do not
        source.lines(0, 1).await.unwrap();
        source.len().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // one mark, one repopulate
        source.mark_dirty();
        assert!(source.signal().is_dirty());
        source.lines(0, 1).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!source.signal().is_dirty());

        source.lines(0, 1).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_populate_error_keeps_snapshot_and_dirty() {
        let fail = Arc::new(AtomicBool::new(false));
        let source = SnapshotSource::new(Arc::new({
            let fail = fail.clone();
            move || {
                let fail = fail.load(Ordering::SeqCst);
                Box::pin(async move {
                    if fail {
                        Err(crate::NavError::Decode {
                            what: "test".to_string(),
                            message: "boom".to_string(),
                        })
                    } else {
                        Ok(vec![
                            Arc::new(RowItem::new("a", vec!["a".to_string()])) as Arc<dyn Item>
                        ])
                    }
                })
            }
        }));

        source.lines(0, 1).await.unwrap();

        fail.store(true, Ordering::SeqCst);
        source.mark_dirty();
        assert!(source.lines(0, 1).await.is_err());
        // previous snapshot survives and the source stays dirty
        assert!(source.signal().is_dirty());

        fail.store(false, Ordering::SeqCst);
        let rows = source.lines(0, 1).await.unwrap();
        assert_eq!(ids(&rows), ["a"]);
        assert!(!source.signal().is_dirty());
    }

    #[tokio::test]
    async fn test_dirty_signal_notifier_fires_on_mark() {
        let signal = DirtySignal::new();
        let fired = Arc::new(AtomicUsize::new(0));
        signal.set_notifier(Arc::new({
            let fired = fired.clone();
            move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        }));

        signal.mark();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(signal.is_dirty());

        // silent set does not notify
        signal.set(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // the notifier is set-once
        signal.set_notifier(Arc::new(|| panic!("second notifier installed")));
        signal.mark();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_matches_filters() {
        use kc_cluster::{ObjectEvent, ObjectEventKind};

        let event = ObjectEvent {
            kind: ObjectEventKind::Modified,
            namespace: Some("testns".to_string()),
            name: "cm1".to_string(),
            object: None,
        };

        assert!(event_matches(&event, None, None));
        assert!(event_matches(&event, Some("testns"), None));
        assert!(event_matches(&event, Some("testns"), Some("cm1")));
        assert!(!event_matches(&event, Some("other"), None));
        assert!(!event_matches(&event, Some("testns"), Some("cm2")));
        assert!(!event_matches(&event, None, Some("cm2")));
    }
}

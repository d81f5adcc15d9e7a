//! Resource-group folders (cluster- and namespace-scoped)
//!
//! Both folders list the discovered resource kinds that support `list` and
//! `watch`, one [`ResourceGroupItem`] per GVR. Items persist across
//! re-populates so count and emptiness observations survive; a finalize
//! signature over `(id, cells, path, visibility)` decides whether an
//! observation change actually dirties the folder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use kc_cluster::{Gvr, ResourceInfo};

use crate::config::ResourceOrder;
use crate::deps::Deps;
use crate::error::Result;
use crate::folder::{Folder, FolderBase};
use crate::folders::group::ResourceGroupItem;
use crate::folders::objects::objects_folder;
use crate::item::{EnterFn, Item};
use crate::source::{DirtySignal, SnapshotSource};

/// Columns of every resources folder
fn resource_columns() -> Vec<String> {
    vec!["Name".to_string(), "Group".to_string(), "Count".to_string()]
}

pub(crate) type Signature = Vec<(String, Vec<String>, Vec<String>, bool)>;

/// Remembers the last finalized signature; [`Finalizer::finalize`] reports
/// whether the produced item set actually changed
#[derive(Default)]
pub(crate) struct Finalizer {
    last: StdMutex<Option<Signature>>,
}

impl Finalizer {
    pub(crate) fn finalize(&self, signature: Signature) -> bool {
        let mut last = self.last.lock().expect("finalizer lock poisoned");
        if last.as_ref() == Some(&signature) {
            false
        } else {
            *last = Some(signature);
            true
        }
    }
}

/// Keep only resources that can be listed and watched
pub(crate) fn listable_watchable(infos: Vec<ResourceInfo>) -> Vec<ResourceInfo> {
    infos
        .into_iter()
        .filter(|info| info.supports("list") && info.supports("watch"))
        .collect()
}

/// Cluster folder contents: cluster-scoped resources, minus `namespaces`
/// which the root folder surfaces separately
pub(crate) fn cluster_scope_infos(infos: Vec<ResourceInfo>) -> Vec<ResourceInfo> {
    listable_watchable(infos)
        .into_iter()
        .filter(|info| {
            !info.namespaced && !(info.plural == "namespaces" && info.gvk.group.is_empty())
        })
        .collect()
}

/// Namespaced folder contents
pub(crate) fn namespaced_infos(infos: Vec<ResourceInfo>) -> Vec<ResourceInfo> {
    listable_watchable(infos)
        .into_iter()
        .filter(|info| info.namespaced)
        .collect()
}

/// Deterministic tri-modal sort; alpha is case-insensitive on the plural
pub(crate) fn sort_infos(
    infos: &mut [ResourceInfo],
    order: ResourceOrder,
    favorites: &[String],
) {
    let is_favorite =
        |plural: &str| favorites.iter().any(|f| f.eq_ignore_ascii_case(plural));
    match order {
        ResourceOrder::Alpha => {
            infos.sort_by(|a, b| {
                (a.plural.to_lowercase(), &a.gvk.group)
                    .cmp(&(b.plural.to_lowercase(), &b.gvk.group))
            });
        }
        ResourceOrder::Group => {
            infos.sort_by(|a, b| {
                (&a.gvk.group, a.plural.to_lowercase())
                    .cmp(&(&b.gvk.group, b.plural.to_lowercase()))
            });
        }
        ResourceOrder::Favorites => {
            infos.sort_by(|a, b| {
                (!is_favorite(&a.plural), a.plural.to_lowercase(), &a.gvk.group).cmp(&(
                    !is_favorite(&b.plural),
                    b.plural.to_lowercase(),
                    &b.gvk.group,
                ))
            });
        }
    }
}

/// Item cache plus display order; shared between the populate callback and
/// the observation-change hooks
#[derive(Default)]
pub(crate) struct GroupRows {
    items: StdMutex<HashMap<String, Arc<ResourceGroupItem>>>,
    order: StdMutex<Vec<String>>,
    finalizer: Finalizer,
}

impl GroupRows {
    /// Get or create the item for an id, wiring its change hook to
    /// re-finalize the folder
    pub(crate) fn item(
        self: &Arc<Self>,
        deps: &Deps,
        signal: &DirtySignal,
        id: &str,
        gvr: Gvr,
        namespace: Option<String>,
        path: Vec<String>,
    ) -> Arc<ResourceGroupItem> {
        let mut items = self.items.lock().expect("group items lock poisoned");
        if let Some(item) = items.get(id) {
            return item.clone();
        }

        let enter: EnterFn = {
            let deps = deps.clone();
            let gvr = gvr.clone();
            let namespace = namespace.clone();
            let path = path.clone();
            Arc::new(move || {
                let deps = deps.clone();
                let gvr = gvr.clone();
                let namespace = namespace.clone();
                let path = path.clone();
                Box::pin(async move {
                    Ok(Box::new(objects_folder(deps, gvr, namespace, path)) as Box<dyn Folder>)
                })
            })
        };

        let item = Arc::new(ResourceGroupItem::new(
            deps.cluster.clone(),
            deps.config.resources.peek_interval,
            id.to_string(),
            gvr.clone(),
            namespace,
            path,
            gvr.api_version(),
            enter,
        ));
        item.set_on_change({
            let rows = Arc::downgrade(self);
            let signal = signal.clone();
            let show_non_empty = deps.config.resources.show_non_empty_only;
            Arc::new(move || {
                if let Some(rows) = rows.upgrade() {
                    rows.refinalize(show_non_empty, &signal);
                }
            })
        });
        items.insert(id.to_string(), item.clone());
        item
    }

    /// Record the display order and the signature of a fresh populate
    pub(crate) fn record(&self, order: Vec<String>, signature: Signature) {
        *self.order.lock().expect("group order lock poisoned") = order;
        let _ = self.finalizer.finalize(signature);
    }

    /// Recompute the signature from cached observations and dirty the folder
    /// iff it differs from the last finalize
    pub(crate) fn refinalize(&self, show_non_empty_only: bool, signal: &DirtySignal) {
        let order = self.order.lock().expect("group order lock poisoned").clone();
        let signature = {
            let items = self.items.lock().expect("group items lock poisoned");
            order
                .iter()
                .filter_map(|id| items.get(id))
                .map(|item| {
                    let visible = item.visible(show_non_empty_only);
                    item.signature_entry(visible)
                })
                .collect()
        };
        if self.finalizer.finalize(signature) {
            signal.mark();
        }
    }
}

/// Accumulates resource-group rows for one populate pass, then records the
/// display order and finalize signature
pub(crate) struct GroupRowsBuilder<'a> {
    rows: &'a Arc<GroupRows>,
    deps: &'a Deps,
    signal: &'a DirtySignal,
    order: Vec<String>,
    signature: Signature,
    out: Vec<Arc<dyn Item>>,
}

impl<'a> GroupRowsBuilder<'a> {
    pub(crate) fn new(rows: &'a Arc<GroupRows>, deps: &'a Deps, signal: &'a DirtySignal) -> Self {
        GroupRowsBuilder {
            rows,
            deps,
            signal,
            order: Vec::new(),
            signature: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Add the group row for one GVR, triggering its async count
    pub(crate) fn push(&mut self, id: &str, gvr: Gvr, namespace: Option<&str>, path: Vec<String>) {
        let item = self.rows.item(
            self.deps,
            self.signal,
            id,
            gvr,
            namespace.map(str::to_string),
            path,
        );
        // async count resolution kicks off on first demand
        let _ = item.resolve_count();
        let visible = item.visible(self.deps.config.resources.show_non_empty_only);
        self.order.push(id.to_string());
        self.signature.push(item.signature_entry(visible));
        if visible {
            self.out.push(item as Arc<dyn Item>);
        }
    }

    pub(crate) fn push_info(&mut self, info: &ResourceInfo, namespace: Option<&str>, parent_path: &[String]) {
        let gvr = info.gvr();
        let id = match namespace {
            Some(ns) => format!("{ns}/{gvr}"),
            None => gvr.to_string(),
        };
        let mut path = parent_path.to_vec();
        path.push(gvr.resource.clone());
        self.push(&id, gvr, namespace, path);
    }

    /// Record order and signature, returning the visible rows
    pub(crate) fn finish(self) -> Vec<Arc<dyn Item>> {
        self.rows.record(self.order, self.signature);
        self.out
    }
}

/// Build the rows for a set of resource infos, reusing cached items, and
/// record the finalize signature
pub(crate) fn build_group_rows(
    rows: &Arc<GroupRows>,
    deps: &Deps,
    signal: &DirtySignal,
    infos: Vec<ResourceInfo>,
    namespace: Option<&str>,
    parent_path: &[String],
) -> Vec<Arc<dyn Item>> {
    let mut builder = GroupRowsBuilder::new(rows, deps, signal);
    for info in &infos {
        builder.push_info(info, namespace, parent_path);
    }
    builder.finish()
}

/// Folder over the cluster-scoped resource groups
pub fn cluster_resources_folder(deps: Deps, path: Vec<String>) -> FolderBase {
    let signal = DirtySignal::new();
    let rows = Arc::new(GroupRows::default());
    let parent_path = path.clone();

    let populate = {
        let signal = signal.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let signal = signal.clone();
            let rows = rows.clone();
            let parent_path = parent_path.clone();
            Box::pin(async move {
                let infos = deps.cluster.resource_infos().await?;
                let mut infos = cluster_scope_infos(infos);
                sort_infos(
                    &mut infos,
                    deps.config.resources.order,
                    &deps.config.resources.favorites,
                );
                Ok(build_group_rows(&rows, &deps, &signal, infos, None, &parent_path))
            }) as futures::future::BoxFuture<'static, Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = SnapshotSource::with_signal(populate, signal);
    FolderBase::new(resource_columns(), path, Arc::new(source))
}

/// Folder over the namespaced resource groups of one namespace
pub fn namespaced_resources_folder(deps: Deps, namespace: String, path: Vec<String>) -> FolderBase {
    let signal = DirtySignal::new();
    let rows = Arc::new(GroupRows::default());
    let parent_path = path.clone();

    let populate = {
        let signal = signal.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let signal = signal.clone();
            let rows = rows.clone();
            let namespace = namespace.clone();
            let parent_path = parent_path.clone();
            Box::pin(async move {
                let infos = deps.cluster.resource_infos().await?;
                let mut infos = namespaced_infos(infos);
                sort_infos(
                    &mut infos,
                    deps.config.resources.order,
                    &deps.config.resources.favorites,
                );
                Ok(build_group_rows(
                    &rows,
                    &deps,
                    &signal,
                    infos,
                    Some(&namespace),
                    &parent_path,
                ))
            }) as futures::future::BoxFuture<'static, Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = SnapshotSource::with_signal(populate, signal);
    FolderBase::new(resource_columns(), path, Arc::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn info(group: &str, plural: &str, namespaced: bool, verbs: &[&str]) -> ResourceInfo {
        ResourceInfo {
            gvk: GroupVersionKind::gvk(group, "v1", plural),
            plural: plural.to_string(),
            namespaced,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn plurals(infos: &[ResourceInfo]) -> Vec<&str> {
        infos.iter().map(|i| i.plural.as_str()).collect()
    }

    #[test]
    fn test_verbs_filter_requires_list_and_watch() {
        let infos = vec![
            info("", "pods", true, &["list", "watch", "get"]),
            info("", "bindings", true, &["create"]),
            info("authorization.k8s.io", "selfsubjectreviews", false, &["create"]),
            info("", "configmaps", true, &["list", "watch"]),
        ];
        let kept = listable_watchable(infos);
        assert_eq!(plurals(&kept), ["pods", "configmaps"]);
    }

    #[test]
    fn test_cluster_scope_filter_drops_namespaces() {
        let infos = vec![
            info("", "namespaces", false, &["list", "watch"]),
            info("", "nodes", false, &["list", "watch"]),
            info("", "pods", true, &["list", "watch"]),
        ];
        let kept = cluster_scope_infos(infos);
        assert_eq!(plurals(&kept), ["nodes"]);
    }

    #[test]
    fn test_namespaced_filter() {
        let infos = vec![
            info("", "nodes", false, &["list", "watch"]),
            info("", "configmaps", true, &["list", "watch"]),
            info("apps", "deployments", true, &["list", "watch"]),
        ];
        let kept = namespaced_infos(infos);
        assert_eq!(plurals(&kept), ["configmaps", "deployments"]);
    }

    #[test]
    fn test_alpha_sort_is_case_insensitive_and_deterministic() {
        let mut infos = vec![
            info("zoo.example.com", "Zebras", true, &["list", "watch"]),
            info("", "pods", true, &["list", "watch"]),
            info("apps", "deployments", true, &["list", "watch"]),
        ];
        sort_infos(&mut infos, ResourceOrder::Alpha, &[]);
        assert_eq!(plurals(&infos), ["deployments", "pods", "Zebras"]);

        // equal inputs sort equally
        let mut again = infos.clone();
        sort_infos(&mut again, ResourceOrder::Alpha, &[]);
        assert_eq!(plurals(&again), plurals(&infos));
    }

    #[test]
    fn test_group_sort() {
        let mut infos = vec![
            info("batch", "jobs", true, &["list", "watch"]),
            info("", "pods", true, &["list", "watch"]),
            info("apps", "deployments", true, &["list", "watch"]),
            info("apps", "daemonsets", true, &["list", "watch"]),
        ];
        sort_infos(&mut infos, ResourceOrder::Group, &[]);
        assert_eq!(plurals(&infos), ["pods", "daemonsets", "deployments", "jobs"]);
    }

    #[test]
    fn test_favorites_sort_promotes_favorites() {
        let mut infos = vec![
            info("", "configmaps", true, &["list", "watch"]),
            info("", "pods", true, &["list", "watch"]),
            info("apps", "deployments", true, &["list", "watch"]),
        ];
        sort_infos(
            &mut infos,
            ResourceOrder::Favorites,
            &["Pods".to_string(), "deployments".to_string()],
        );
        assert_eq!(plurals(&infos), ["deployments", "pods", "configmaps"]);
    }

    #[test]
    fn test_finalizer_reports_changes_once() {
        let finalizer = Finalizer::default();
        let sig = |count: &str| -> Signature {
            vec![(
                "/v1/nodes".to_string(),
                vec!["/nodes".to_string(), "v1".to_string(), count.to_string()],
                vec!["nodes".to_string()],
                true,
            )]
        };

        assert!(finalizer.finalize(sig("")));
        // identical input is idempotent
        assert!(!finalizer.finalize(sig("")));
        assert!(!finalizer.finalize(sig("")));
        // a changed cell is a change
        assert!(finalizer.finalize(sig("4")));
        assert!(!finalizer.finalize(sig("4")));
    }

    #[test]
    fn test_finalizer_sees_visibility_changes() {
        let finalizer = Finalizer::default();
        let sig = |visible: bool| -> Signature {
            vec![(
                "id".to_string(),
                vec!["/x".to_string()],
                vec!["x".to_string()],
                visible,
            )]
        };
        assert!(finalizer.finalize(sig(true)));
        assert!(finalizer.finalize(sig(false)));
        assert!(!finalizer.finalize(sig(false)));
    }
}

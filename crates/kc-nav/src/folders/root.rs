//! Root folder
//!
//! The entry point of the tree: a contexts row (when the host provides a
//! context source), the `namespaces` resource group, and the remaining
//! cluster-scoped resource groups.

use std::sync::Arc;

use kc_cluster::Gvr;

use crate::deps::Deps;
use crate::folder::{Folder, FolderBase};
use crate::folders::contexts::contexts_folder;
use crate::folders::resources::{GroupRows, GroupRowsBuilder, cluster_scope_infos, sort_infos};
use crate::item::{EnterFn, Item, RowItem};
use crate::source::{DirtySignal, SnapshotSource};

/// Fixed id of the contexts row
pub const CONTEXTS_ID: &str = "contexts";

/// Fixed id of the namespaces resource-group row
pub const NAMESPACES_ID: &str = "namespaces";

fn contexts_row(deps: &Deps, count: usize) -> Arc<dyn Item> {
    let enter: EnterFn = {
        let deps = deps.clone();
        Arc::new(move || {
            let deps = deps.clone();
            Box::pin(async move {
                Ok(Box::new(contexts_folder(deps, vec![CONTEXTS_ID.to_string()]))
                    as Box<dyn Folder>)
            })
        })
    };
    Arc::new(
        RowItem::new(
            CONTEXTS_ID,
            vec![
                format!("/{CONTEXTS_ID}"),
                String::new(),
                count.to_string(),
            ],
        )
        .with_path(vec![CONTEXTS_ID.to_string()])
        .with_enter(enter),
    )
}

/// The root folder; its path is empty so no back row is injected
pub fn root_folder(deps: Deps) -> FolderBase {
    let signal = DirtySignal::new();
    let rows = Arc::new(GroupRows::default());

    let populate = {
        let deps = deps.clone();
        let signal = signal.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let signal = signal.clone();
            let rows = rows.clone();
            Box::pin(async move {
                let mut out: Vec<Arc<dyn Item>> = Vec::new();

                // contexts first, hidden when empty under non-empty filtering
                if let Some(contexts) = &deps.contexts {
                    let count = contexts.names().len();
                    if count > 0 || !deps.config.resources.show_non_empty_only {
                        out.push(contexts_row(&deps, count));
                    }
                }

                let infos = deps.cluster.resource_infos().await?;
                let mut builder = GroupRowsBuilder::new(&rows, &deps, &signal);

                // namespaces is surfaced here instead of among the cluster
                // resources, under its short id
                builder.push(
                    NAMESPACES_ID,
                    Gvr::core("v1", "namespaces"),
                    None,
                    vec![NAMESPACES_ID.to_string()],
                );

                let mut infos = cluster_scope_infos(infos);
                sort_infos(
                    &mut infos,
                    deps.config.resources.order,
                    &deps.config.resources.favorites,
                );
                for info in &infos {
                    builder.push_info(info, None, &[]);
                }

                out.extend(builder.finish());
                Ok(out)
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = SnapshotSource::with_signal(populate, signal);
    FolderBase::new(
        vec!["Name".to_string(), "Group".to_string(), "Count".to_string()],
        Vec::new(),
        Arc::new(source),
    )
}

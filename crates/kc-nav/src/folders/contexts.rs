//! Kubeconfig contexts folder

use std::sync::Arc;

use crate::deps::Deps;
use crate::error::NavError;
use crate::folder::FolderBase;
use crate::item::{EnterFn, Item, RowItem};
use crate::source::SnapshotSource;

/// Folder over the context names of the active kubeconfig. Entering a
/// context is delegated to the host's context source.
pub fn contexts_folder(deps: Deps, path: Vec<String>) -> FolderBase {
    let populate = {
        let deps = deps.clone();
        Arc::new(move || {
            let deps = deps.clone();
            Box::pin(async move {
                let Some(contexts) = deps.contexts.clone() else {
                    return Ok(Vec::new());
                };
                let rows = contexts
                    .names()
                    .into_iter()
                    .map(|name| {
                        let enter: EnterFn = {
                            let contexts = contexts.clone();
                            let name = name.clone();
                            Arc::new(move || {
                                let contexts = contexts.clone();
                                let name = name.clone();
                                Box::pin(async move {
                                    contexts.enter(&name).await?.ok_or(NavError::NotEnterable {
                                        id: name.clone(),
                                    })
                                })
                            })
                        };
                        Arc::new(
                            RowItem::new(name.clone(), vec![name]).with_enter(enter),
                        ) as Arc<dyn Item>
                    })
                    .collect();
                Ok(rows)
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = SnapshotSource::new(populate);
    FolderBase::new(vec!["Name".to_string()], path, Arc::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kc_cluster::Cluster;

    use crate::config::UiConfig;
    use crate::deps::ContextSource;
    use crate::folder::Folder as _;
    use crate::item::BACK_ID;

    struct StaticContexts(Vec<String>);

    #[async_trait]
    impl ContextSource for StaticContexts {
        fn names(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    fn deps_with_contexts(names: &[&str]) -> Deps {
        let kube_config = kube::Config::new("http://127.0.0.1:59999".parse().unwrap());
        let cluster = Arc::new(Cluster::new(kube_config).unwrap());
        Deps::new(cluster, Arc::new(UiConfig::default())).with_contexts(Arc::new(
            StaticContexts(names.iter().map(|n| n.to_string()).collect()),
        ))
    }

    #[tokio::test]
    async fn test_contexts_rows() {
        let folder = contexts_folder(deps_with_contexts(&["prod", "staging"]), vec![
            "contexts".to_string(),
        ]);

        let rows = folder.lines(0, 10).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id()).collect();
        assert_eq!(ids, [BACK_ID, "prod", "staging"]);
        assert!(rows[1].enterable().is_some());
    }

    #[tokio::test]
    async fn test_default_context_source_refuses_enter() {
        let folder = contexts_folder(deps_with_contexts(&["prod"]), vec!["contexts".to_string()]);
        let rows = folder.lines(0, 10).await.unwrap();
        let err = match rows[1].enterable().unwrap().enter().await {
            Err(e) => e,
            Ok(_) => panic!("expected enter to fail"),
        };
        assert!(matches!(err, NavError::NotEnterable { .. }));
    }

    #[tokio::test]
    async fn test_no_context_source_is_empty() {
        let kube_config = kube::Config::new("http://127.0.0.1:59999".parse().unwrap());
        let cluster = Arc::new(Cluster::new(kube_config).unwrap());
        let deps = Deps::new(cluster, Arc::new(UiConfig::default()));

        let folder = contexts_folder(deps, vec!["contexts".to_string()]);
        assert_eq!(folder.len().await.unwrap(), 1); // just the back row
    }
}

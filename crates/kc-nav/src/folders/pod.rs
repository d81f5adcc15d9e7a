//! Pod container folders
//!
//! The drill-down under a pod row: sections (`containers`, `init`,
//! `ephemeral`) with counts, container names per section, a `logs` entry per
//! container, and finally a `latest` row whose view content fetches the log
//! tail. All of these share a live source bound to the parent pod, so any
//! change to the pod dirties the whole chain.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kc_cluster::{DEFAULT_LOG_TAIL_LINES, Gvr};

use crate::deps::Deps;
use crate::folder::{Folder, FolderBase};
use crate::folders::parse_object;
use crate::item::{EnterFn, Item, RowItem, ViewContent, ViewFn};
use crate::source::{DirtySignal, LiveSource, PopulateFn};

/// The three container lists of a pod spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSection {
    Containers,
    Init,
    Ephemeral,
}

impl ContainerSection {
    pub fn label(&self) -> &'static str {
        match self {
            ContainerSection::Containers => "containers",
            ContainerSection::Init => "init",
            ContainerSection::Ephemeral => "ephemeral",
        }
    }
}

/// The non-empty sections of a pod, with their container counts
pub(crate) fn sections_of(pod: &Pod) -> Vec<(ContainerSection, usize)> {
    let Some(spec) = &pod.spec else {
        return Vec::new();
    };
    let mut sections = Vec::new();
    if !spec.containers.is_empty() {
        sections.push((ContainerSection::Containers, spec.containers.len()));
    }
    if let Some(init) = &spec.init_containers
        && !init.is_empty()
    {
        sections.push((ContainerSection::Init, init.len()));
    }
    if let Some(ephemeral) = &spec.ephemeral_containers
        && !ephemeral.is_empty()
    {
        sections.push((ContainerSection::Ephemeral, ephemeral.len()));
    }
    sections
}

/// Container names of one section
pub(crate) fn container_names(pod: &Pod, section: ContainerSection) -> Vec<String> {
    let Some(spec) = &pod.spec else {
        return Vec::new();
    };
    match section {
        ContainerSection::Containers => spec.containers.iter().map(|c| c.name.clone()).collect(),
        ContainerSection::Init => spec
            .init_containers
            .as_ref()
            .map(|cs| cs.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
        ContainerSection::Ephemeral => spec
            .ephemeral_containers
            .as_ref()
            .map(|cs| cs.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
    }
}

/// Live source bound to the parent pod
fn pod_source(deps: &Deps, namespace: &str, pod: &str, populate: PopulateFn) -> LiveSource {
    LiveSource::new(
        populate,
        DirtySignal::new(),
        deps.cluster.clone(),
        Gvr::core("v1", "pods"),
        Some(namespace.to_string()),
        Some(pod.to_string()),
    )
}

async fn fetch_pod(deps: &Deps, namespace: &str, name: &str) -> crate::Result<Pod> {
    let object = deps
        .cluster
        .get_by_gvr(&Gvr::core("v1", "pods"), Some(namespace), name)
        .await?;
    parse_object(&object, "Pod")
}

/// Sections folder: one row per non-empty container section
pub fn pod_sections_folder(
    deps: Deps,
    namespace: String,
    pod: String,
    path: Vec<String>,
) -> FolderBase {
    let folder_path = path.clone();
    let populate: PopulateFn = {
        let deps = deps.clone();
        let namespace = namespace.clone();
        let pod = pod.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let namespace = namespace.clone();
            let pod = pod.clone();
            let folder_path = folder_path.clone();
            Box::pin(async move {
                let parsed = fetch_pod(&deps, &namespace, &pod).await?;
                let rows = sections_of(&parsed)
                    .into_iter()
                    .map(|(section, count)| {
                        let label = section.label();
                        let mut section_path = folder_path.clone();
                        section_path.push(label.to_string());

                        let enter: EnterFn = {
                            let deps = deps.clone();
                            let namespace = namespace.clone();
                            let pod = pod.clone();
                            let section_path = section_path.clone();
                            Arc::new(move || {
                                let deps = deps.clone();
                                let namespace = namespace.clone();
                                let pod = pod.clone();
                                let section_path = section_path.clone();
                                Box::pin(async move {
                                    Ok(Box::new(pod_containers_folder(
                                        deps,
                                        namespace,
                                        pod,
                                        section,
                                        section_path,
                                    )) as Box<dyn Folder>)
                                })
                            })
                        };

                        Arc::new(
                            RowItem::new(
                                label,
                                vec![format!("/{label}"), count.to_string()],
                            )
                            .with_path(section_path)
                            .with_enter(enter),
                        ) as Arc<dyn Item>
                    })
                    .collect();
                Ok(rows)
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = pod_source(&deps, &namespace, &pod, populate);
    FolderBase::new(
        vec!["Name".to_string(), "Count".to_string()],
        path,
        Arc::new(source),
    )
}

/// Container list folder for one section
pub fn pod_containers_folder(
    deps: Deps,
    namespace: String,
    pod: String,
    section: ContainerSection,
    path: Vec<String>,
) -> FolderBase {
    let folder_path = path.clone();
    let populate: PopulateFn = {
        let deps = deps.clone();
        let namespace = namespace.clone();
        let pod = pod.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let namespace = namespace.clone();
            let pod = pod.clone();
            let folder_path = folder_path.clone();
            Box::pin(async move {
                let parsed = fetch_pod(&deps, &namespace, &pod).await?;
                let rows = container_names(&parsed, section)
                    .into_iter()
                    .map(|container| {
                        let mut container_path = folder_path.clone();
                        container_path.push(container.clone());

                        let enter: EnterFn = {
                            let deps = deps.clone();
                            let namespace = namespace.clone();
                            let pod = pod.clone();
                            let container = container.clone();
                            let container_path = container_path.clone();
                            Arc::new(move || {
                                let deps = deps.clone();
                                let namespace = namespace.clone();
                                let pod = pod.clone();
                                let container = container.clone();
                                let container_path = container_path.clone();
                                Box::pin(async move {
                                    Ok(Box::new(container_folder(
                                        deps,
                                        namespace,
                                        pod,
                                        container,
                                        container_path,
                                    )) as Box<dyn Folder>)
                                })
                            })
                        };

                        Arc::new(
                            RowItem::new(container.clone(), vec![format!("/{container}")])
                                .with_path(container_path)
                                .with_enter(enter),
                        ) as Arc<dyn Item>
                    })
                    .collect();
                Ok(rows)
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = pod_source(&deps, &namespace, &pod, populate);
    FolderBase::new(vec!["Name".to_string()], path, Arc::new(source))
}

/// Per-container folder, currently holding the `logs` entry
pub fn container_folder(
    deps: Deps,
    namespace: String,
    pod: String,
    container: String,
    path: Vec<String>,
) -> FolderBase {
    let folder_path = path.clone();
    let populate: PopulateFn = {
        let deps = deps.clone();
        let namespace = namespace.clone();
        let pod = pod.clone();
        let container = container.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let namespace = namespace.clone();
            let pod = pod.clone();
            let container = container.clone();
            let mut logs_path = folder_path.clone();
            logs_path.push("logs".to_string());
            Box::pin(async move {
                let enter: EnterFn = {
                    let logs_path = logs_path.clone();
                    Arc::new(move || {
                        let deps = deps.clone();
                        let namespace = namespace.clone();
                        let pod = pod.clone();
                        let container = container.clone();
                        let logs_path = logs_path.clone();
                        Box::pin(async move {
                            Ok(Box::new(container_logs_folder(
                                deps, namespace, pod, container, logs_path,
                            )) as Box<dyn Folder>)
                        })
                    })
                };
                Ok(vec![
                    Arc::new(
                        RowItem::new("logs", vec!["/logs".to_string()])
                            .with_path(logs_path)
                            .with_enter(enter),
                    ) as Arc<dyn Item>,
                ])
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = pod_source(&deps, &namespace, &pod, populate);
    FolderBase::new(vec!["Name".to_string()], path, Arc::new(source))
}

/// Logs folder: a single `latest` row whose view content is the log tail
pub fn container_logs_folder(
    deps: Deps,
    namespace: String,
    pod: String,
    container: String,
    path: Vec<String>,
) -> FolderBase {
    let populate: PopulateFn = {
        let deps = deps.clone();
        let namespace = namespace.clone();
        let pod = pod.clone();
        let container = container.clone();
        Arc::new(move || {
            let view: ViewFn = {
                let deps = deps.clone();
                let namespace = namespace.clone();
                let pod = pod.clone();
                let container = container.clone();
                Arc::new(move || {
                    let deps = deps.clone();
                    let namespace = namespace.clone();
                    let pod = pod.clone();
                    let container = container.clone();
                    Box::pin(async move {
                        let body = deps
                            .cluster
                            .pod_logs(&namespace, &pod, &container, DEFAULT_LOG_TAIL_LINES)
                            .await?;
                        Ok(ViewContent {
                            title: format!("{pod}/{container}"),
                            body,
                            language: String::new(),
                            content_type: String::new(),
                            filename: format!("{pod}_{container}.log"),
                        })
                    })
                })
            };
            Box::pin(async move {
                Ok(vec![
                    Arc::new(
                        RowItem::new("latest", vec!["latest".to_string()]).with_view(view),
                    ) as Arc<dyn Item>,
                ])
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = pod_source(&deps, &namespace, &pod, populate);
    FolderBase::new(vec!["Name".to_string()], path, Arc::new(source))
}

//! Object listing folders
//!
//! Lists the objects of one GVR (optionally in one namespace), preferring
//! the server-side table representation: columns follow the table's
//! definitions and priorities, a trailing `Age` column is always appended.
//! When the server cannot produce a table the folder falls back to the
//! unstructured cache and lists plain names. Rows with a registered child
//! kind (pods, configmaps, secrets, namespaces) enter their child folder and
//! carry a `/`-prefixed name cell.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kc_cluster::{ClusterError, Gvr};
use kc_table::{RowList, TableColumnDefinition, TableError};
use kube::api::DynamicObject;
use serde_json::Value;
use tracing::warn;

use crate::config::{ColumnsMode, ObjectOrder};
use crate::deps::Deps;
use crate::error::Result;
use crate::folder::{Folder, FolderBase, SharedColumns, shared_columns};
use crate::item::{EnterFn, Item, RowItem, ViewContent, ViewFn};
use crate::registry::child_constructor;
use crate::source::{DirtySignal, LiveSource};
use crate::util::{display_cell, format_age};

/// Indices of the columns visible under a columns mode
pub(crate) fn visible_columns(columns: &[TableColumnDefinition], mode: ColumnsMode) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| mode == ColumnsMode::Wide || column.priority == 0)
        .map(|(idx, _)| idx)
        .collect()
}

/// A built row plus its sort keys
struct ObjectRow {
    name: String,
    created: Option<DateTime<Utc>>,
    item: Arc<dyn Item>,
}

/// Sort object rows; name is case-insensitive, creation falls back to the
/// name for equal timestamps
fn sort_object_rows(rows: &mut [ObjectRow], order: ObjectOrder) {
    match order {
        ObjectOrder::Name => rows.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
        }),
        ObjectOrder::NameDesc => rows.sort_by(|a, b| {
            b.name
                .to_lowercase()
                .cmp(&a.name.to_lowercase())
        }),
        ObjectOrder::Creation => rows.sort_by(|a, b| {
            (a.created, a.name.to_lowercase()).cmp(&(b.created, b.name.to_lowercase()))
        }),
        ObjectOrder::CreationDesc => rows.sort_by(|a, b| {
            (b.created, b.name.to_lowercase()).cmp(&(a.created, a.name.to_lowercase()))
        }),
    }
}

/// YAML view of an embedded object with `metadata.managedFields` stripped
pub(crate) fn yaml_view(name: &str, object: Option<Value>) -> Result<ViewContent> {
    let mut value = object.unwrap_or(Value::Null);
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
    }
    Ok(ViewContent {
        title: name.to_string(),
        body: serde_yaml::to_string(&value)?,
        language: "yaml".to_string(),
        content_type: String::new(),
        filename: format!("{name}.yaml"),
    })
}

fn yaml_view_fn(name: String, object: Option<Value>) -> ViewFn {
    Arc::new(move || {
        let name = name.clone();
        let object = object.clone();
        Box::pin(async move { yaml_view(&name, object) })
    })
}

/// Enter closure through the child-kind registry, when the GVR has one
fn child_enter(
    deps: &Deps,
    gvr: &Gvr,
    namespace: Option<&str>,
    name: &str,
    child_path: Vec<String>,
) -> Option<EnterFn> {
    let constructor = child_constructor(gvr)?;
    let deps = deps.clone();
    let namespace = namespace.map(str::to_string);
    let name = name.to_string();
    Some(Arc::new(move || {
        let constructor = constructor.clone();
        let deps = deps.clone();
        let namespace = namespace.clone();
        let name = name.clone();
        let child_path = child_path.clone();
        Box::pin(async move { Ok(constructor(deps, namespace, name, child_path)) })
    }))
}

/// Build display rows from a table response
fn table_rows(
    deps: &Deps,
    gvr: &Gvr,
    namespace: Option<&str>,
    folder_path: &[String],
    list: &RowList,
) -> (Vec<String>, Vec<Arc<dyn Item>>) {
    let indices = visible_columns(&list.columns, deps.config.objects.columns);
    let mut column_names: Vec<String> = indices
        .iter()
        .map(|&idx| list.columns[idx].name.clone())
        .collect();
    column_names.push("Age".to_string());

    let mut rows: Vec<ObjectRow> = list
        .items
        .iter()
        .filter(|row| !row.name().is_empty())
        .map(|row| {
            let name = row.name().to_string();
            let mut cells: Vec<String> = indices
                .iter()
                .map(|&idx| display_cell(row.cells.get(idx)))
                .collect();
            cells.push(format_age(row.metadata.creation_timestamp.as_ref()));

            let row_namespace = row.namespace().or(namespace);
            let mut child_path = folder_path.to_vec();
            child_path.push(name.clone());

            let enter = child_enter(deps, gvr, row_namespace, &name, child_path.clone());
            if enter.is_some()
                && let Some(first) = cells.first_mut()
            {
                *first = format!("/{first}");
            }

            let mut item = RowItem::new(name.clone(), cells)
                .with_path(child_path)
                .with_view(yaml_view_fn(name.clone(), row.object.clone()));
            if let Some(enter) = enter {
                item = item.with_enter(enter);
            }

            ObjectRow {
                created: row.metadata.creation_timestamp.as_ref().map(|t| t.0),
                name,
                item: Arc::new(item),
            }
        })
        .collect();

    sort_object_rows(&mut rows, deps.config.objects.order);
    (column_names, rows.into_iter().map(|row| row.item).collect())
}

/// Build fallback rows from unstructured objects: names plus the age column
fn fallback_rows(
    deps: &Deps,
    gvr: &Gvr,
    namespace: Option<&str>,
    folder_path: &[String],
    objects: &[Arc<DynamicObject>],
) -> (Vec<String>, Vec<Arc<dyn Item>>) {
    let column_names = vec!["Name".to_string(), "Age".to_string()];

    let mut rows: Vec<ObjectRow> = objects
        .iter()
        .filter_map(|object| {
            let name = object.metadata.name.clone()?;
            let mut cells = vec![
                name.clone(),
                format_age(object.metadata.creation_timestamp.as_ref()),
            ];

            let row_namespace = object.metadata.namespace.as_deref().or(namespace);
            let mut child_path = folder_path.to_vec();
            child_path.push(name.clone());

            let enter = child_enter(deps, gvr, row_namespace, &name, child_path.clone());
            if enter.is_some() {
                cells[0] = format!("/{}", cells[0]);
            }

            let view_object = serde_json::to_value(object.as_ref()).ok();
            let mut item = RowItem::new(name.clone(), cells)
                .with_path(child_path)
                .with_view(yaml_view_fn(name.clone(), view_object));
            if let Some(enter) = enter {
                item = item.with_enter(enter);
            }

            Some(ObjectRow {
                created: object.metadata.creation_timestamp.as_ref().map(|t| t.0),
                name,
                item: Arc::new(item) as Arc<dyn Item>,
            })
        })
        .collect();

    sort_object_rows(&mut rows, deps.config.objects.order);
    (column_names, rows.into_iter().map(|row| row.item).collect())
}

/// The table list failed in a way that means "no table available" rather
/// than a real API failure
fn table_unavailable(err: &ClusterError) -> bool {
    matches!(
        err,
        ClusterError::Table(TableError::Api(kube::Error::SerdeError(_)))
    )
}

/// Folder over the objects of one GVR; live-updates on any change to the
/// GVR in the bound namespace
pub fn objects_folder(
    deps: Deps,
    gvr: Gvr,
    namespace: Option<String>,
    path: Vec<String>,
) -> FolderBase {
    let signal = DirtySignal::new();
    let columns: SharedColumns = shared_columns(vec!["Name".to_string(), "Age".to_string()]);
    let folder_path = path.clone();

    let populate = {
        let deps = deps.clone();
        let gvr = gvr.clone();
        let namespace = namespace.clone();
        let columns = columns.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let gvr = gvr.clone();
            let namespace = namespace.clone();
            let columns = columns.clone();
            let folder_path = folder_path.clone();
            Box::pin(async move {
                let ns = namespace.as_deref();
                let (column_names, rows) =
                    match deps.cluster.list_rows_by_gvr(&gvr, ns).await {
                        Ok(list) if !list.columns.is_empty() => {
                            table_rows(&deps, &gvr, ns, &folder_path, &list)
                        }
                        Ok(_) => {
                            let objects = deps.cluster.list_by_gvr(&gvr, ns).await?;
                            fallback_rows(&deps, &gvr, ns, &folder_path, &objects)
                        }
                        Err(err) if table_unavailable(&err) => {
                            warn!(gvr = %gvr, "server returned no table, listing names only");
                            let objects = deps.cluster.list_by_gvr(&gvr, ns).await?;
                            fallback_rows(&deps, &gvr, ns, &folder_path, &objects)
                        }
                        Err(err) => return Err(err.into()),
                    };
                *columns.lock().expect("columns lock poisoned") = column_names;
                Ok(rows)
            }) as futures::future::BoxFuture<'static, Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = LiveSource::new(
        populate,
        signal.clone(),
        deps.cluster.clone(),
        gvr,
        namespace,
        None,
    );
    FolderBase::with_shared_columns(columns, path, Arc::new(source))
}

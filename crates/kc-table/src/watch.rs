//! Row watch adapter
//!
//! Wraps a Table-negotiated watch and turns every table payload into one
//! event per contained row. Some servers cannot deliver table watch events
//! (decode errors on the stream, or plain object payloads); in that case the
//! adapter transparently falls back, once, to a raw object watch and
//! rehydrates each event into a row via a one-row table Get.

use std::collections::HashSet;
use std::pin::pin;

use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::{ErrorResponse, GroupVersionKind, TypeMeta, WatchEvent};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event, watcher};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Result, TableError};
use crate::fetcher::TableClient;
use crate::row::{ROW_KIND, Row, table_api_version};
use crate::table::{Table, TableColumnDefinition, rows_from_table};

/// A row-level watch event with the target GVK set on the carried row
#[derive(Debug, Clone)]
pub enum RowEvent {
    Added(Row),
    Modified(Row),
    Deleted(Row),
    Bookmark { resource_version: String },
}

/// Handle to a running row watch. Events arrive on [`RowWatcher::recv`];
/// [`RowWatcher::stop`] is idempotent and stops the upstream watch once.
pub struct RowWatcher {
    rx: UnboundedReceiver<Result<RowEvent>>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RowWatcher {
    /// Receive the next event; `None` once the watch has ended
    pub async fn recv(&mut self) -> Option<Result<RowEvent>> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for RowWatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl TableClient {
    /// Start a row watch for a resolved mapping. `None` namespace watches
    /// cluster-wide.
    pub fn watch_rows(
        &self,
        ar: ApiResource,
        namespace: Option<String>,
        target: GroupVersionKind,
        resource_version: String,
    ) -> RowWatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let driver = WatchDriver {
            fetcher: self.clone(),
            ar,
            namespace,
            target,
            resource_version,
            tx,
            token: token.clone(),
        };
        let task = tokio::spawn(driver.run());
        RowWatcher { rx, token, task }
    }
}

/// Outcome of the primary (table) watch loop
enum Primary {
    Done,
    FallBack,
}

struct WatchDriver {
    fetcher: TableClient,
    ar: ApiResource,
    namespace: Option<String>,
    target: GroupVersionKind,
    resource_version: String,
    tx: UnboundedSender<Result<RowEvent>>,
    token: CancellationToken,
}

impl WatchDriver {
    async fn run(self) {
        // The fallback is one-shot: once the object watch takes over, the
        // adapter stays on it until stopped.
        if let Primary::FallBack = self.primary().await {
            warn!(
                resource = %self.ar.plural,
                "table watch unavailable, falling back to object watch"
            );
            self.fallback().await;
        }
    }

    async fn primary(&self) -> Primary {
        let stream = match self
            .fetcher
            .watch_table(&self.ar, self.namespace.as_deref(), &self.resource_version)
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                let _ = self.tx.send(Err(err));
                return Primary::Done;
            }
        };
        let mut stream = pin!(stream);

        loop {
            tokio::select! {
                () = self.token.cancelled() => return Primary::Done,
                event = stream.next() => match event {
                    // stream close before cancellation: the server gave up on
                    // delivering table events
                    None => return Primary::FallBack,
                    Some(Ok(WatchEvent::Bookmark(b))) => {
                        let _ = self.tx.send(Ok(RowEvent::Bookmark {
                            resource_version: b.metadata.resource_version.clone(),
                        }));
                    }
                    Some(Ok(WatchEvent::Added(t))) => match self.emit_table(&t, EventKind::Added) {
                        Ok(()) => {}
                        Err(()) => return Primary::FallBack,
                    },
                    Some(Ok(WatchEvent::Modified(t))) => match self.emit_table(&t, EventKind::Modified) {
                        Ok(()) => {}
                        Err(()) => return Primary::FallBack,
                    },
                    Some(Ok(WatchEvent::Deleted(t))) => match self.emit_table(&t, EventKind::Deleted) {
                        Ok(()) => {}
                        Err(()) => return Primary::FallBack,
                    },
                    Some(Ok(WatchEvent::Error(status))) => {
                        if is_decode_status(&status) {
                            return Primary::FallBack;
                        }
                        let _ = self.tx.send(Err(TableError::WatchStatus(status)));
                    }
                    Some(Err(err)) => {
                        if is_decode_failure(&err) {
                            return Primary::FallBack;
                        }
                        let _ = self.tx.send(Err(err.into()));
                        return Primary::Done;
                    }
                },
            }
        }
    }

    /// Emit one row event per table row; `Err(())` asks for the fallback
    /// because the payload was not a table.
    fn emit_table(&self, table: &Table, kind: EventKind) -> std::result::Result<(), ()> {
        if !table.is_table() {
            return Err(());
        }
        for event in table_to_events(table, kind, &self.target) {
            let _ = self.tx.send(Ok(event));
        }
        Ok(())
    }

    async fn fallback(&self) {
        let api: Api<DynamicObject> = match self.namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.fetcher.client(), ns, &self.ar),
            None => Api::all_with(self.fetcher.client(), &self.ar),
        };
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        let mut stream = pin!(stream);
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                () = self.token.cancelled() => return,
                event = stream.next() => match event {
                    None => return,
                    Some(Ok(Event::Init | Event::InitDone)) => {}
                    Some(Ok(Event::InitApply(o) | Event::Apply(o))) => {
                        let added = seen.insert(object_key(&o.metadata));
                        let kind = if added { EventKind::Added } else { EventKind::Modified };
                        self.rehydrate(&o, kind).await;
                    }
                    Some(Ok(Event::Delete(o))) => {
                        seen.remove(&object_key(&o.metadata));
                        let row = synthetic_row(&o.metadata, &self.target);
                        let _ = self.tx.send(Ok(RowEvent::Deleted(row)));
                    }
                    Some(Err(err)) => {
                        warn!(resource = %self.ar.plural, error = %err, "object watch error");
                    }
                },
            }
        }
    }

    /// Fetch a fresh one-row table for the object and emit it; on failure
    /// emit a minimal synthetic row instead.
    async fn rehydrate(&self, object: &DynamicObject, kind: EventKind) {
        let name = object.metadata.name.as_deref().unwrap_or("");
        let namespace = object.metadata.namespace.as_deref();
        let row = match self.fetcher.get_table(&self.ar, namespace, name).await {
            Ok(table) => {
                let mut list = rows_from_table(&table, &self.target);
                match list.items.drain(..).next() {
                    Some(mut row) => {
                        if row.metadata.namespace.is_none() {
                            row.metadata.namespace = object.metadata.namespace.clone();
                        }
                        row
                    }
                    None => synthetic_row(&object.metadata, &self.target),
                }
            }
            Err(err) => {
                warn!(
                    resource = %self.ar.plural,
                    name,
                    error = %err,
                    "row rehydration failed, emitting synthetic row"
                );
                synthetic_row(&object.metadata, &self.target)
            }
        };
        let _ = self.tx.send(Ok(kind.wrap(row)));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    Added,
    Modified,
    Deleted,
}

impl EventKind {
    fn wrap(self, row: Row) -> RowEvent {
        match self {
            EventKind::Added => RowEvent::Added(row),
            EventKind::Modified => RowEvent::Modified(row),
            EventKind::Deleted => RowEvent::Deleted(row),
        }
    }
}

fn object_key(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or(""),
        meta.name.as_deref().unwrap_or("")
    )
}

/// One row event per table row, carrying the upstream event type
fn table_to_events(table: &Table, kind: EventKind, target: &GroupVersionKind) -> Vec<RowEvent> {
    rows_from_table(table, target)
        .items
        .into_iter()
        .map(|row| kind.wrap(row))
        .collect()
}

/// A watch status the server uses to report that it could not encode or
/// decode the table payload
fn is_decode_status(status: &ErrorResponse) -> bool {
    status.message.to_ascii_lowercase().contains("decod")
}

/// A client-side failure to decode the stream payload as a Table
fn is_decode_failure(err: &kube::Error) -> bool {
    matches!(err, kube::Error::SerdeError(_))
}

/// Minimal row carrying only name/namespace/uid/resourceVersion, used when a
/// fresh table cannot be fetched for an event
fn synthetic_row(meta: &ObjectMeta, target: &GroupVersionKind) -> Row {
    let column = |name: &str| TableColumnDefinition {
        name: name.to_string(),
        type_: "string".to_string(),
        ..TableColumnDefinition::default()
    };
    let cell = |v: Option<&String>| Value::String(v.cloned().unwrap_or_default());

    Row {
        types: Some(TypeMeta {
            api_version: table_api_version(),
            kind: ROW_KIND.to_string(),
        }),
        metadata: ObjectMeta {
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
            ..ObjectMeta::default()
        },
        columns: vec![
            column("Name"),
            column("Namespace"),
            column("UID"),
            column("ResourceVersion"),
        ],
        cells: vec![
            cell(meta.name.as_ref()),
            cell(meta.namespace.as_ref()),
            cell(meta.uid.as_ref()),
            cell(meta.resource_version.as_ref()),
        ],
        object: None,
        target: Some(target.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "Pod")
    }

    fn meta(name: &str, ns: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: ns.map(str::to_string),
            uid: Some("u-1".to_string()),
            resource_version: Some("7".to_string()),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn test_synthetic_row_cells() {
        let row = synthetic_row(&meta("web-0", Some("testns")), &pod_gvk());

        let names: Vec<&str> = row.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Name", "Namespace", "UID", "ResourceVersion"]);
        assert_eq!(
            row.cells,
            vec![json!("web-0"), json!("testns"), json!("u-1"), json!("7")]
        );
        assert_eq!(row.name(), "web-0");
        assert_eq!(row.target.as_ref().unwrap(), &pod_gvk());
        assert!(row.object.is_none());
    }

    #[test]
    fn test_table_to_events_sets_target_and_kind() {
        let table: Table = serde_json::from_value(json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "Table",
            "columnDefinitions": [{ "name": "Name", "type": "string" }],
            "rows": [
                { "cells": ["a"], "object": { "metadata": { "name": "a" } } },
                { "cells": ["b"], "object": { "metadata": { "name": "b" } } }
            ]
        }))
        .unwrap();

        let events = table_to_events(&table, EventKind::Modified, &pod_gvk());
        assert_eq!(events.len(), 2);
        for event in &events {
            let RowEvent::Modified(row) = event else {
                panic!("expected modified event");
            };
            assert_eq!(row.target.as_ref().unwrap(), &pod_gvk());
        }
    }

    #[test]
    fn test_decode_status_detection() {
        let decode = ErrorResponse {
            status: "Failure".to_string(),
            message: "unable to decode an event from the watch stream".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        };
        assert!(is_decode_status(&decode));

        let forbidden = ErrorResponse {
            status: "Failure".to_string(),
            message: "pods is forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        };
        assert!(!is_decode_status(&forbidden));
    }

    #[test]
    fn test_decode_failure_detection() {
        let serde_err = serde_json::from_str::<Table>("not json").unwrap_err();
        assert!(is_decode_failure(&kube::Error::SerdeError(serde_err)));
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(&meta("a", Some("ns"))), "ns/a");
        assert_eq!(object_key(&meta("a", None)), "/a");
    }
}

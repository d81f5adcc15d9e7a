//! ConfigMap and Secret key folders
//!
//! One row per data key, sorted ascending. The row's view content is the
//! decoded value: Secret values (and ConfigMap `binaryData`) arrive
//! base64-decoded from the API machinery; values that look like text go to
//! the viewer as plain text, anything else as an octet stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kc_cluster::Gvr;

use crate::deps::Deps;
use crate::folder::FolderBase;
use crate::folders::parse_object;
use crate::item::{Item, RowItem, ViewContent, ViewFn};
use crate::source::{DirtySignal, LiveSource};
use crate::util::is_text_like;

fn key_columns() -> Vec<String> {
    vec!["Key".to_string()]
}

/// Data keys of a ConfigMap, `data` and `binaryData` merged and sorted
pub(crate) fn config_map_entries(config_map: &ConfigMap) -> Vec<(String, Vec<u8>)> {
    let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    if let Some(data) = &config_map.data {
        for (key, value) in data {
            entries.insert(key.clone(), value.clone().into_bytes());
        }
    }
    if let Some(binary) = &config_map.binary_data {
        for (key, value) in binary {
            entries.insert(key.clone(), value.0.clone());
        }
    }
    entries.into_iter().collect()
}

/// Data keys of a Secret, values already base64-decoded
pub(crate) fn secret_entries(secret: &Secret) -> Vec<(String, Vec<u8>)> {
    secret
        .data
        .as_ref()
        .map(|data| {
            data.iter()
                .map(|(key, value)| (key.clone(), value.0.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Viewer content for one key value
pub(crate) fn value_view(parent: &str, key: &str, bytes: &[u8]) -> ViewContent {
    let (body, content_type) = if is_text_like(bytes) {
        (String::from_utf8_lossy(bytes).into_owned(), String::new())
    } else {
        (
            String::from_utf8_lossy(bytes).into_owned(),
            "application/octet-stream".to_string(),
        )
    };
    ViewContent {
        title: format!("{parent}:{key}"),
        body,
        language: String::new(),
        content_type,
        filename: format!("{parent}_{key}"),
    }
}

fn value_view_fn(parent: String, key: String, bytes: Vec<u8>) -> ViewFn {
    Arc::new(move || {
        let parent = parent.clone();
        let key = key.clone();
        let bytes = bytes.clone();
        Box::pin(async move { Ok(value_view(&parent, &key, &bytes)) })
    })
}

fn key_rows(parent: &str, entries: Vec<(String, Vec<u8>)>) -> Vec<Arc<dyn Item>> {
    entries
        .into_iter()
        .map(|(key, bytes)| {
            Arc::new(
                RowItem::new(key.clone(), vec![key.clone()]).with_view(value_view_fn(
                    parent.to_string(),
                    key,
                    bytes,
                )),
            ) as Arc<dyn Item>
        })
        .collect()
}

/// Folder over the data keys of one ConfigMap
pub fn configmap_keys_folder(
    deps: Deps,
    namespace: String,
    name: String,
    path: Vec<String>,
) -> FolderBase {
    let signal = DirtySignal::new();
    let gvr = Gvr::core("v1", "configmaps");

    let populate = {
        let deps = deps.clone();
        let gvr = gvr.clone();
        let namespace = namespace.clone();
        let name = name.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let gvr = gvr.clone();
            let namespace = namespace.clone();
            let name = name.clone();
            Box::pin(async move {
                let object = deps
                    .cluster
                    .get_by_gvr(&gvr, Some(&namespace), &name)
                    .await?;
                let config_map: ConfigMap = parse_object(&object, "ConfigMap")?;
                Ok(key_rows(&name, config_map_entries(&config_map)))
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = LiveSource::new(
        populate,
        signal,
        deps.cluster.clone(),
        gvr,
        Some(namespace),
        Some(name),
    );
    FolderBase::new(key_columns(), path, Arc::new(source))
}

/// Folder over the data keys of one Secret
pub fn secret_keys_folder(
    deps: Deps,
    namespace: String,
    name: String,
    path: Vec<String>,
) -> FolderBase {
    let signal = DirtySignal::new();
    let gvr = Gvr::core("v1", "secrets");

    let populate = {
        let deps = deps.clone();
        let gvr = gvr.clone();
        let namespace = namespace.clone();
        let name = name.clone();
        Arc::new(move || {
            let deps = deps.clone();
            let gvr = gvr.clone();
            let namespace = namespace.clone();
            let name = name.clone();
            Box::pin(async move {
                let object = deps
                    .cluster
                    .get_by_gvr(&gvr, Some(&namespace), &name)
                    .await?;
                let secret: Secret = parse_object(&object, "Secret")?;
                Ok(key_rows(&name, secret_entries(&secret)))
            }) as futures::future::BoxFuture<'static, crate::Result<Vec<Arc<dyn Item>>>>
        })
    };

    let source = LiveSource::new(
        populate,
        signal,
        deps.cluster.clone(),
        gvr,
        Some(namespace),
        Some(name),
    );
    FolderBase::new(key_columns(), path, Arc::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;

    #[test]
    fn test_config_map_entries_sorted() {
        let config_map = ConfigMap {
            data: Some(
                [("b".to_string(), "B".to_string()), ("a".to_string(), "A".to_string())]
                    .into_iter()
                    .collect(),
            ),
            binary_data: Some(
                [("c".to_string(), ByteString(vec![0x00, 0x01]))]
                    .into_iter()
                    .collect(),
            ),
            ..ConfigMap::default()
        };

        let entries = config_map_entries(&config_map);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(entries[0].1, b"A");
        assert_eq!(entries[2].1, vec![0x00, 0x01]);
    }

    #[test]
    fn test_secret_entries_are_decoded_bytes() {
        let secret = Secret {
            data: Some(
                [
                    ("y".to_string(), ByteString(b"yy".to_vec())),
                    ("x".to_string(), ByteString(b"xx".to_vec())),
                ]
                .into_iter()
                .collect(),
            ),
            ..Secret::default()
        };

        let entries = secret_entries(&secret);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["x", "y"]);
        assert_eq!(entries[0].1, b"xx");
    }

    #[test]
    fn test_value_view_text() {
        let view = value_view("sec1", "x", b"xx");
        assert_eq!(view.title, "sec1:x");
        assert_eq!(view.body, "xx");
        assert_eq!(view.language, "");
        assert_eq!(view.content_type, "");
        assert_eq!(view.filename, "sec1_x");
    }

    #[test]
    fn test_value_view_binary() {
        let view = value_view("sec1", "blob", &[0x00, 0xff, 0x10]);
        assert_eq!(view.title, "sec1:blob");
        assert_eq!(view.content_type, "application/octet-stream");
        assert_eq!(view.filename, "sec1_blob");
    }

    #[test]
    fn test_key_rows_shape() {
        let rows = key_rows(
            "cm1",
            vec![("a".to_string(), b"A".to_vec()), ("b".to_string(), b"B".to_vec())],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id(), "a");
        assert_eq!(rows[0].cells(), ["a"]);
        assert_eq!(rows[1].id(), "b");
        assert_eq!(rows[1].cells(), ["b"]);
        assert!(rows[0].viewable().is_some());
        assert!(rows[0].enterable().is_none());
    }

    #[tokio::test]
    async fn test_key_row_view_content() {
        let rows = key_rows("cm1", vec![("a".to_string(), b"A".to_vec())]);
        let view = rows[0].viewable().unwrap().view_content().await.unwrap();
        assert_eq!(view.title, "cm1:a");
        assert_eq!(view.body, "A");
    }
}

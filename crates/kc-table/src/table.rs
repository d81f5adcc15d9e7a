//! meta/v1 Table wire types and conversion into [`RowList`]
//!
//! k8s-openapi does not ship the Table representation, so the structs the
//! server returns under `Accept: ...;as=Table` are declared here.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
use kube::core::{GroupVersionKind, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::row::{ROW_KIND, ROW_LIST_KIND, Row, RowList, table_api_version};

/// One column of a server-side table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub type_: String,

    #[serde(default)]
    pub format: String,

    #[serde(default)]
    pub description: String,

    /// 0 means always shown; higher priorities only appear in wide output
    #[serde(default)]
    pub priority: i32,
}

/// One row of a server-side table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<Value>,

    /// Embedded object, present when the request carried `includeObject=Object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

/// The meta/v1 Table representation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ListMeta,

    #[serde(default)]
    pub column_definitions: Vec<TableColumnDefinition>,

    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Whether the payload actually declared itself as a Table
    pub fn is_table(&self) -> bool {
        self.types.as_ref().is_some_and(|t| t.kind == "Table")
    }
}

/// Object metadata extracted from an embedded raw object, zero when absent
/// or unparseable. Labels, annotations, finalizers, owner references, managed
/// fields and deletion timestamps all ride along with the full meta block.
pub(crate) fn object_meta_from_embedded(object: Option<&Value>) -> ObjectMeta {
    let Some(object) = object else {
        return ObjectMeta::default();
    };
    object
        .get("metadata")
        .cloned()
        .and_then(|m| serde_json::from_value(m).ok())
        .unwrap_or_default()
}

/// Convert a table response into a [`RowList`] for the given target kind.
///
/// Column definitions are copied once onto the list and once per row; cells
/// and embedded objects are deep copies, independent of later mutation of the
/// input table.
pub fn rows_from_table(table: &Table, target: &GroupVersionKind) -> RowList {
    let columns = table.column_definitions.clone();
    let items = table
        .rows
        .iter()
        .map(|tr| Row {
            types: Some(TypeMeta {
                api_version: table_api_version(),
                kind: ROW_KIND.to_string(),
            }),
            metadata: object_meta_from_embedded(tr.object.as_ref()),
            columns: columns.clone(),
            cells: tr.cells.clone(),
            object: tr.object.clone(),
            target: Some(target.clone()),
        })
        .collect();

    RowList {
        types: Some(TypeMeta {
            api_version: table_api_version(),
            kind: ROW_LIST_KIND.to_string(),
        }),
        metadata: ListMeta {
            resource_version: table.metadata.resource_version.clone(),
            ..ListMeta::default()
        },
        columns,
        items,
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

    fn sample_table() -> Table {
        serde_json::from_value(json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "Table",
            "metadata": { "resourceVersion": "42" },
            "columnDefinitions": [
                { "name": "Name", "type": "string", "format": "name", "priority": 0 },
                { "name": "Ready", "type": "string", "priority": 0 },
                { "name": "IP", "type": "string", "priority": 1 }
            ],
            "rows": [
                {
                    "cells": ["web-0", "1/1", "10.0.0.3"],
                    "object": {
                        "apiVersion": "v1",
                        "kind": "Pod",
                        "metadata": {
                            "name": "web-0",
                            "namespace": "default",
                            "uid": "u-1",
                            "labels": { "app": "web" }
                        }
                    }
                },
                { "cells": ["web-1", "0/1", "10.0.0.4"] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_table_decodes_from_wire() {
        let table = sample_table();
        assert!(table.is_table());
        assert_eq!(table.column_definitions.len(), 3);
        assert_eq!(table.column_definitions[0].type_, "string");
        assert_eq!(table.column_definitions[2].priority, 1);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_conversion_carries_columns_and_items() {
        let table = sample_table();
        let list = rows_from_table(&table, &pod_gvk());

        assert_eq!(list.columns, table.column_definitions);
        assert_eq!(list.items.len(), table.rows.len());
        assert_eq!(list.metadata.resource_version.as_deref(), Some("42"));
        for row in &list.items {
            assert_eq!(row.columns, list.columns);
            assert_eq!(row.target.as_ref().unwrap(), &pod_gvk());
        }
    }

    #[test]
    fn test_conversion_extracts_object_meta() {
        let list = rows_from_table(&sample_table(), &pod_gvk());

        let with_object = &list.items[0];
        assert_eq!(with_object.name(), "web-0");
        assert_eq!(with_object.namespace(), Some("default"));
        assert_eq!(with_object.metadata.uid.as_deref(), Some("u-1"));
        assert_eq!(
            with_object.metadata.labels.as_ref().unwrap().get("app"),
            Some(&"web".to_string())
        );

        // no embedded object: zero meta
        let bare = &list.items[1];
        assert_eq!(bare.name(), "");
        assert!(bare.metadata.namespace.is_none());
    }

    #[test]
    fn test_conversion_deep_copies_cells() {
        let mut table = sample_table();
        let list = rows_from_table(&table, &pod_gvk());

        table.rows[0].cells[0] = json!("mutated");
        table.column_definitions[0].name = "Mutated".to_string();

        assert_eq!(list.items[0].cells[0], json!("web-0"));
        assert_eq!(list.columns[0].name, "Name");
    }

    #[test]
    fn test_non_table_payload_detected() {
        let not_a_table: Table = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "PodList",
            "items": []
        }))
        .unwrap();
        assert!(!not_a_table.is_table());
    }
}

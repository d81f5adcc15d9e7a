//! First-class carriers for server-side Table rows
//!
//! The Kubernetes Table representation is a wire format, not an object kind a
//! cache can key on. `Row` and `RowList` lift table entries into real objects
//! under a private API group so that the rest of the stack (caches, watches,
//! folders) can treat them like any other resource. The *target* GVK carried
//! next to the type meta names the real kind a row describes (e.g. `Pod`).

use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
use kube::core::{GroupVersionKind, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table::TableColumnDefinition;

/// API group the row kinds live under
pub const TABLE_GROUP: &str = "table.kc.dev";

/// API version the row kinds live under
pub const TABLE_VERSION: &str = "v1alpha1";

/// Kind of a single table row
pub const ROW_KIND: &str = "Row";

/// Kind of a list of table rows
pub const ROW_LIST_KIND: &str = "RowList";

/// `group/version` string for the row kinds
pub fn table_api_version() -> String {
    format!("{TABLE_GROUP}/{TABLE_VERSION}")
}

/// A single server-side table row, addressable like a regular object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Column definitions; shared (by value) across all rows of one list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<TableColumnDefinition>,

    /// Raw cell values, in column order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<Value>,

    /// The embedded object as returned with `includeObject=Object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,

    /// Group-version-kind of the real object this row describes
    #[serde(skip)]
    pub target: Option<GroupVersionKind>,
}

impl Row {
    /// Create an empty row for the given target kind
    pub fn new(target: GroupVersionKind) -> Self {
        Row {
            types: Some(TypeMeta {
                api_version: table_api_version(),
                kind: ROW_KIND.to_string(),
            }),
            target: Some(target),
            ..Row::default()
        }
    }

    /// Object name from metadata, empty if unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// Object namespace from metadata
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// The target GVK, or a descriptive error when the caller forgot to set it
    pub fn target_gvk(&self) -> crate::Result<&GroupVersionKind> {
        self.target
            .as_ref()
            .ok_or(crate::TableError::MissingTarget { kind: ROW_KIND })
    }
}

impl kube::Resource for Row {
    type DynamicType = ();
    type Scope = k8s_openapi::NamespaceResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        ROW_KIND.into()
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        TABLE_GROUP.into()
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        TABLE_VERSION.into()
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        "rows".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// A list of [`Row`]s with the originating table's column definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowList {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,

    #[serde(default)]
    pub metadata: ListMeta,

    /// Column definitions shared by every item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<TableColumnDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Row>,

    /// Group-version-kind of the real objects the rows describe
    #[serde(skip)]
    pub target: Option<GroupVersionKind>,
}

impl RowList {
    /// Create an empty list for the given target kind
    pub fn new(target: GroupVersionKind) -> Self {
        RowList {
            types: Some(TypeMeta {
                api_version: table_api_version(),
                kind: ROW_LIST_KIND.to_string(),
            }),
            target: Some(target),
            ..RowList::default()
        }
    }

    /// The target GVK, or a descriptive error when the caller forgot to set it
    pub fn target_gvk(&self) -> crate::Result<&GroupVersionKind> {
        self.target
            .as_ref()
            .ok_or(crate::TableError::MissingTarget {
                kind: ROW_LIST_KIND,
            })
    }

    /// Find the row for an object name
    pub fn row_for(&self, name: &str) -> Option<&Row> {
        self.items.iter().find(|r| r.name() == name)
    }

    /// Replace `other`'s contents with a deep copy of `self`, preserving
    /// `other`'s target kind
    pub fn copy_into(&self, other: &mut RowList) {
        let target = other.target.clone();
        *other = self.clone();
        other.target = target.clone();
        for item in &mut other.items {
            item.target = target.clone();
        }
    }
}

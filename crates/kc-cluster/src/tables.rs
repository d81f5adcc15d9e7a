//! Table-aware cache facade
//!
//! Row and RowList reads are served by a fresh table fetch and conversion;
//! everything else delegates to the informer-backed [`ObjectCache`]. Informer
//! access for the row kinds is rejected outright so no watch machinery is
//! ever created for table payloads.

use std::sync::Arc;

use kc_table::{Row, RowList, TABLE_GROUP, TableClient, rows_from_table};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use tokio::sync::broadcast;

use crate::discovery::{Gvr, ResourceMapper};
use crate::error::{ClusterError, Result};
use crate::objects::{ObjectCache, ObjectEvent};

pub struct TableCache {
    fetcher: TableClient,
    objects: Arc<ObjectCache>,
    mapper: Arc<ResourceMapper>,
}

impl TableCache {
    pub fn new(fetcher: TableClient, objects: Arc<ObjectCache>, mapper: Arc<ResourceMapper>) -> Self {
        TableCache {
            fetcher,
            objects,
            mapper,
        }
    }

    pub fn fetcher(&self) -> &TableClient {
        &self.fetcher
    }

    /// Fill `list` with the current table rows for its target kind.
    /// The target GVK must be set beforehand; it survives the copy.
    pub async fn list(&self, list: &mut RowList, namespace: Option<&str>) -> Result<()> {
        let target = list.target_gvk()?.clone();
        let (ar, _caps) = self.mapper.resolve_gvk(&target).await?;
        let table = self.fetcher.list_table(&ar, namespace).await?;
        rows_from_table(&table, &target).copy_into(list);
        Ok(())
    }

    /// Fill `row` with the table row for one object. The target GVK must be
    /// set beforehand; the namespace is taken from the key.
    pub async fn get(&self, namespace: Option<&str>, name: &str, row: &mut Row) -> Result<()> {
        let target = row.target_gvk()?.clone();
        let (ar, _caps) = self.mapper.resolve_gvk(&target).await?;
        let table = self.fetcher.get_table(&ar, namespace, name).await?;
        let list = rows_from_table(&table, &target);

        let Some(found) = list.row_for(name) else {
            return Err(ClusterError::NotFound {
                gvr: Gvr::from_api_resource(&ar).to_string(),
                name: name.to_string(),
            });
        };
        *row = found.clone();
        row.target = Some(target);
        if let Some(ns) = namespace {
            row.metadata.namespace = Some(ns.to_string());
        }
        Ok(())
    }

    /// Cache-backed unstructured list for non-row kinds
    pub async fn list_objects(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
    ) -> Result<Vec<Arc<DynamicObject>>> {
        self.objects.list(gvr, namespace).await
    }

    /// Cache-backed unstructured get for non-row kinds
    pub async fn get_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Arc<DynamicObject>> {
        self.objects.get(gvr, namespace, name).await
    }

    /// Informer subscription by kind. Row kinds have no informer; asking for
    /// one is a caller bug surfaced as a descriptive error.
    pub async fn subscribe(
        &self,
        gvk: &GroupVersionKind,
    ) -> Result<broadcast::Receiver<ObjectEvent>> {
        if gvk.group == TABLE_GROUP {
            return Err(ClusterError::RowInformerUnsupported {
                kind: gvk.kind.clone(),
            });
        }
        let (ar, _caps) = self.mapper.resolve_gvk(gvk).await?;
        self.objects.subscribe(&Gvr::from_api_resource(&ar)).await
    }
}

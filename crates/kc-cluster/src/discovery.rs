//! Resource identifiers and the refreshing discovery mapper

use std::fmt;
use std::sync::Arc;

use kube::Client;
use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ClusterError, Result};

/// A group-version-resource identifier, the plural-side counterpart of
/// [`GroupVersionKind`]. The core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Gvr {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Core-group (`""`) resource
    pub fn core(version: &str, resource: &str) -> Self {
        Gvr::new("", version, resource)
    }

    /// The `group/version` string, just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The identifier for an [`ApiResource`] as resolved by discovery
    pub fn from_api_resource(ar: &ApiResource) -> Self {
        Gvr::new(&ar.group, &ar.version, &ar.plural)
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)
    }
}

/// One entry of the flattened server-preferred resource list
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInfo {
    pub gvk: GroupVersionKind,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

impl ResourceInfo {
    pub fn gvr(&self) -> Gvr {
        Gvr::new(&self.gvk.group, &self.gvk.version, &self.plural)
    }

    pub fn supports(&self, verb: &str) -> bool {
        self.verbs.iter().any(|v| v == verb)
    }
}

/// Discovery-backed resolution of resource identifiers.
///
/// The underlying [`Discovery`] run is performed lazily on first use and
/// replaced wholesale on [`ResourceMapper::refresh`], which the cluster calls
/// from its refresh ticker. Readers always see a complete snapshot.
pub struct ResourceMapper {
    client: Client,
    discovery: RwLock<Option<Arc<Discovery>>>,
}

impl ResourceMapper {
    pub fn new(client: Client) -> Self {
        ResourceMapper {
            client,
            discovery: RwLock::new(None),
        }
    }

    /// Current discovery snapshot, running discovery on first use
    pub async fn current(&self) -> Result<Arc<Discovery>> {
        if let Some(discovery) = self.discovery.read().await.as_ref() {
            return Ok(discovery.clone());
        }

        let mut slot = self.discovery.write().await;
        // a concurrent first-user may have won the race
        if let Some(discovery) = slot.as_ref() {
            return Ok(discovery.clone());
        }
        let discovery = Arc::new(Discovery::new(self.client.clone()).run().await?);
        *slot = Some(discovery.clone());
        Ok(discovery)
    }

    /// Invalidate and rebuild the discovery snapshot
    pub async fn refresh(&self) -> Result<()> {
        let fresh = Arc::new(Discovery::new(self.client.clone()).run().await?);
        *self.discovery.write().await = Some(fresh);
        debug!("discovery refreshed");
        Ok(())
    }

    /// Resolve a GVR to its API resource and capabilities
    pub async fn resolve_gvr(&self, gvr: &Gvr) -> Result<(ApiResource, ApiCapabilities)> {
        let discovery = self.current().await?;
        for group in discovery.groups() {
            if group.name() != gvr.group {
                continue;
            }
            for (ar, caps) in group.versioned_resources(&gvr.version) {
                if ar.plural == gvr.resource {
                    return Ok((ar, caps));
                }
            }
        }
        Err(ClusterError::NoSuchResource {
            gvr: gvr.to_string(),
        })
    }

    /// Resolve a GVK to its API resource and capabilities
    pub async fn resolve_gvk(
        &self,
        gvk: &GroupVersionKind,
    ) -> Result<(ApiResource, ApiCapabilities)> {
        let discovery = self.current().await?;
        discovery
            .resolve_gvk(gvk)
            .ok_or_else(|| ClusterError::NoSuchKind {
                gvk: format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind),
            })
    }

    /// The flattened server-preferred resource list, in server order.
    /// Subresources and nameless/kindless entries are dropped; callers sort.
    pub async fn resource_infos(&self) -> Result<Vec<ResourceInfo>> {
        let discovery = self.current().await?;
        let mut infos = Vec::new();
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if ar.plural.is_empty() || ar.kind.is_empty() || ar.plural.contains('/') {
                    continue;
                }
                infos.push(ResourceInfo {
                    gvk: GroupVersionKind::gvk(&ar.group, &ar.version, &ar.kind),
                    plural: ar.plural.clone(),
                    namespaced: caps.scope == Scope::Namespaced,
                    verbs: caps.operations.clone(),
                });
            }
        }
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvr_display() {
        assert_eq!(Gvr::core("v1", "pods").to_string(), "/v1/pods");
        assert_eq!(
            Gvr::new("apps", "v1", "deployments").to_string(),
            "apps/v1/deployments"
        );
    }

    #[test]
    fn test_gvr_api_version() {
        assert_eq!(Gvr::core("v1", "configmaps").api_version(), "v1");
        assert_eq!(
            Gvr::new("apps", "v1", "deployments").api_version(),
            "apps/v1"
        );
    }

    #[test]
    fn test_gvr_from_api_resource() {
        let ar = ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk("batch", "v1", "Job"),
            "jobs",
        );
        assert_eq!(Gvr::from_api_resource(&ar), Gvr::new("batch", "v1", "jobs"));
    }

    #[test]
    fn test_resource_info_verbs() {
        let info = ResourceInfo {
            gvk: GroupVersionKind::gvk("", "v1", "Pod"),
            plural: "pods".to_string(),
            namespaced: true,
            verbs: vec!["list".to_string(), "watch".to_string()],
        };
        assert!(info.supports("list"));
        assert!(info.supports("watch"));
        assert!(!info.supports("deletecollection"));
        assert_eq!(info.gvr(), Gvr::core("v1", "pods"));
    }
}

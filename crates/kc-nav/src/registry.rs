//! Child-kind registry
//!
//! Process-wide map from a GVR to the constructor of its virtual child
//! folder: pods get container sections, ConfigMaps and Secrets get key
//! listings, namespaces get the namespaced resource groups. Read-mostly;
//! additional kinds register at startup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use kc_cluster::Gvr;
use once_cell::sync::Lazy;

use crate::deps::Deps;
use crate::folder::Folder;
use crate::folders::keys::{configmap_keys_folder, secret_keys_folder};
use crate::folders::pod::pod_sections_folder;
use crate::folders::resources::namespaced_resources_folder;

/// Builds the child folder for one object: `(deps, namespace, object name,
/// base path)`. Constructors are pure apart from reading the dependencies;
/// the returned folder populates lazily.
pub type ChildConstructor =
    Arc<dyn Fn(Deps, Option<String>, String, Vec<String>) -> Box<dyn Folder> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<Gvr, ChildConstructor>>> =
    Lazy::new(|| RwLock::new(builtin_children()));

/// Register a child folder constructor for a GVR, replacing any previous one
pub fn register_child_kind(gvr: Gvr, constructor: ChildConstructor) {
    REGISTRY
        .write()
        .expect("registry lock poisoned")
        .insert(gvr, constructor);
}

/// The child folder constructor for a GVR, if one is registered
pub fn child_constructor(gvr: &Gvr) -> Option<ChildConstructor> {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .get(gvr)
        .cloned()
}

fn builtin_children() -> HashMap<Gvr, ChildConstructor> {
    let mut children: HashMap<Gvr, ChildConstructor> = HashMap::new();

    children.insert(
        Gvr::core("v1", "pods"),
        Arc::new(|deps, namespace, name, path| {
            Box::new(pod_sections_folder(
                deps,
                namespace.unwrap_or_default(),
                name,
                path,
            ))
        }),
    );
    children.insert(
        Gvr::core("v1", "configmaps"),
        Arc::new(|deps, namespace, name, path| {
            Box::new(configmap_keys_folder(
                deps,
                namespace.unwrap_or_default(),
                name,
                path,
            ))
        }),
    );
    children.insert(
        Gvr::core("v1", "secrets"),
        Arc::new(|deps, namespace, name, path| {
            Box::new(secret_keys_folder(
                deps,
                namespace.unwrap_or_default(),
                name,
                path,
            ))
        }),
    );
    children.insert(
        Gvr::core("v1", "namespaces"),
        Arc::new(|deps, _namespace, name, path| {
            Box::new(namespaced_resources_folder(deps, name, path))
        }),
    );

    children
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_child_kinds() {
        for (group, resource) in [
            ("", "pods"),
            ("", "configmaps"),
            ("", "secrets"),
            ("", "namespaces"),
        ] {
            let gvr = Gvr::new(group, "v1", resource);
            assert!(child_constructor(&gvr).is_some(), "missing {gvr}");
        }
    }

    #[test]
    fn test_unregistered_kind_has_no_child() {
        assert!(child_constructor(&Gvr::new("apps", "v1", "deployments")).is_none());
        // version is part of the key
        assert!(child_constructor(&Gvr::core("v2", "pods")).is_none());
    }
}

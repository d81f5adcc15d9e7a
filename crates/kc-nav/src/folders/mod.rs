//! Concrete folders of the navigation tree

pub mod contexts;
pub mod group;
pub mod keys;
pub mod objects;
pub mod pod;
pub mod resources;
pub mod root;

use kube::api::DynamicObject;
use serde::de::DeserializeOwned;

use crate::error::{NavError, Result};

/// Decode an unstructured object into its concrete kind
pub(crate) fn parse_object<K: DeserializeOwned>(object: &DynamicObject, what: &str) -> Result<K> {
    let value = serde_json::to_value(object).map_err(|err| NavError::Decode {
        what: what.to_string(),
        message: err.to_string(),
    })?;
    serde_json::from_value(value).map_err(|err| NavError::Decode {
        what: what.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use serde_json::json;

    #[test]
    fn test_parse_object_into_concrete_kind() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm1", "namespace": "testns" },
            "data": { "a": "A" }
        }))
        .unwrap();

        let config_map: ConfigMap = parse_object(&object, "ConfigMap").unwrap();
        assert_eq!(config_map.metadata.name.as_deref(), Some("cm1"));
        assert_eq!(config_map.data.unwrap()["a"], "A");
    }

    #[test]
    fn test_parse_object_decode_failure() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm1" },
            "data": { "a": 42 }
        }))
        .unwrap();

        let err = parse_object::<ConfigMap>(&object, "ConfigMap").unwrap_err();
        assert!(matches!(err, NavError::Decode { .. }));
        assert!(err.to_string().contains("ConfigMap"));
    }
}

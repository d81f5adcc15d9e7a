//! Persisted view configuration
//!
//! Read-only for the navigation core; the host application loads and saves
//! it. Durations use the humantime format (`30s`, `5m`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default single-item peek validity window
pub const DEFAULT_PEEK_INTERVAL: Duration = Duration::from_secs(30);

/// Default horizontal scroll step, in columns
pub const DEFAULT_SCROLL_STEP: u16 = 4;

/// Default idle TTL for pooled clusters
pub const DEFAULT_POOL_IDLE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    pub viewer: ViewerConfig,
    pub scroll_step: ScrollStep,
    pub resources: ResourcesConfig,
    pub objects: ObjectsConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub theme: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            theme: "default".to_string(),
        }
    }
}

/// Positive horizontal scroll step; zero deserializes to the default
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "u16")]
pub struct ScrollStep(u16);

impl ScrollStep {
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for ScrollStep {
    fn default() -> Self {
        ScrollStep(DEFAULT_SCROLL_STEP)
    }
}

impl From<u16> for ScrollStep {
    fn from(value: u16) -> Self {
        if value == 0 {
            ScrollStep::default()
        } else {
            ScrollStep(value)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourcesConfig {
    /// Hide resource groups that are known to be empty
    pub show_non_empty_only: bool,

    pub order: ResourceOrder,

    /// Resource plurals promoted to the top under the `favorites` order;
    /// matched case-insensitively
    pub favorites: Vec<String>,

    /// How long a single-item peek stays valid
    #[serde(with = "humantime_serde")]
    pub peek_interval: Duration,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        ResourcesConfig {
            show_non_empty_only: false,
            order: ResourceOrder::default(),
            favorites: Vec::new(),
            peek_interval: DEFAULT_PEEK_INTERVAL,
        }
    }
}

impl ResourcesConfig {
    pub fn is_favorite(&self, plural: &str) -> bool {
        self.favorites.iter().any(|f| f.eq_ignore_ascii_case(plural))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceOrder {
    #[default]
    Alpha,
    Group,
    Favorites,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectsConfig {
    pub columns: ColumnsMode,
    pub order: ObjectOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnsMode {
    /// Only columns with priority 0
    #[default]
    Normal,
    /// All columns
    Wide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectOrder {
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "-name")]
    NameDesc,
    #[serde(rename = "creation")]
    Creation,
    #[serde(rename = "-creation")]
    CreationDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// How long an unused cluster stays pooled
    #[serde(with = "humantime_serde")]
    pub idle_ttl: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            idle_ttl: DEFAULT_POOL_IDLE_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UiConfig::default();
        assert_eq!(config.scroll_step.get(), 4);
        assert_eq!(config.resources.order, ResourceOrder::Alpha);
        assert!(!config.resources.show_non_empty_only);
        assert_eq!(config.resources.peek_interval, Duration::from_secs(30));
        assert_eq!(config.objects.columns, ColumnsMode::Normal);
        assert_eq!(config.objects.order, ObjectOrder::Name);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: UiConfig = serde_json::from_str(
            r#"{
                "scrollStep": 8,
                "resources": { "order": "favorites", "favorites": ["Pods"], "peekInterval": "1m" },
                "objects": { "columns": "wide", "order": "-creation" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.scroll_step.get(), 8);
        assert_eq!(config.resources.order, ResourceOrder::Favorites);
        assert!(config.resources.is_favorite("pods"));
        assert_eq!(config.resources.peek_interval, Duration::from_secs(60));
        assert_eq!(config.objects.columns, ColumnsMode::Wide);
        assert_eq!(config.objects.order, ObjectOrder::CreationDesc);
    }

    #[test]
    fn test_zero_scroll_step_falls_back_to_default() {
        let config: UiConfig = serde_json::from_str(r#"{ "scrollStep": 0 }"#).unwrap();
        assert_eq!(config.scroll_step.get(), DEFAULT_SCROLL_STEP);
    }

    #[test]
    fn test_favorites_case_insensitive() {
        let resources = ResourcesConfig {
            favorites: vec!["ConfigMaps".to_string()],
            ..ResourcesConfig::default()
        };
        assert!(resources.is_favorite("configmaps"));
        assert!(resources.is_favorite("CONFIGMAPS"));
        assert!(!resources.is_favorite("secrets"));
    }
}

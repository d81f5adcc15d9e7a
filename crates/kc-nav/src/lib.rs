//! kc Nav - the navigation folder engine of the Kubernetes browser
//!
//! This crate provides:
//! - **Items**: rows with a capability set (enterable, viewable, countable)
//!   checked per row by the table widget
//! - **Row sources**: windowed snapshots with dirty tracking, optionally
//!   informer-driven
//! - **Folders**: the lazily-populated tree from the root down to pod
//!   container logs, all behind one windowed listing interface
//! - **Child-kind registry**: which GVRs have a virtual child folder
//! - **View configuration**: the persisted, read-only display settings

pub mod config;
pub mod deps;
pub mod error;
pub mod folder;
pub mod folders;
pub mod item;
pub mod registry;
pub mod source;
pub mod util;

pub use config::{ColumnsMode, ObjectOrder, ResourceOrder, ResourcesConfig, UiConfig};
pub use deps::{ContextSource, Deps};
pub use error::{NavError, Result};
pub use folder::{Folder, FolderBase};
pub use folders::contexts::contexts_folder;
pub use folders::group::{ChangeHook, ResourceGroupItem};
pub use folders::keys::{configmap_keys_folder, secret_keys_folder};
pub use folders::objects::objects_folder;
pub use folders::pod::{
    ContainerSection, container_folder, container_logs_folder, pod_containers_folder,
    pod_sections_folder,
};
pub use folders::resources::{cluster_resources_folder, namespaced_resources_folder};
pub use folders::root::{CONTEXTS_ID, NAMESPACES_ID, root_folder};
pub use item::{
    BACK_ID, BackItem, CountState, Countable, EnterFn, Enterable, Item, RowItem, ViewContent,
    ViewFn, Viewable,
};
pub use registry::{ChildConstructor, child_constructor, register_child_kind};
pub use source::{DirtySignal, LiveSource, Notifier, PopulateFn, RowSource, SnapshotSource};

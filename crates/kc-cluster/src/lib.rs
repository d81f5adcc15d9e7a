//! kc Cluster - per-cluster runtime for the Kubernetes browser
//!
//! This crate provides:
//! - **Discovery mapper**: lazily-run, periodically-refreshed resolution of
//!   GVR/GVK identifiers to API resources
//! - **Object cache**: one lazily-started informer per GVR over unstructured
//!   objects, with change-event fan-out
//! - **Table cache**: Row/RowList reads via table fetches, everything else
//!   delegated to the object cache
//! - **Cluster**: the uniform read API (`list/get/has_any/list_rows/get_row`
//!   by GVR) the navigation layer consumes
//! - **Cluster pool**: per-context clusters with idle-TTL eviction

pub mod cluster;
pub mod discovery;
pub mod error;
pub mod objects;
pub mod pool;
pub mod tables;

pub use cluster::{Cluster, DEFAULT_LOG_TAIL_LINES, DEFAULT_REFRESH_INTERVAL};
pub use discovery::{Gvr, ResourceInfo, ResourceMapper};
pub use error::{ClusterError, Result};
pub use objects::{ObjectCache, ObjectEvent, ObjectEventKind};
pub use pool::{ClusterKey, ClusterPool, ConfigSource, DEFAULT_IDLE_TTL};
pub use tables::TableCache;

//! Row items and their capability set
//!
//! Every row a folder exposes is an [`Item`]. What a row can *do* is modeled
//! as capabilities ([`Enterable`], [`Viewable`], [`Countable`]) that concrete
//! item types opt into; the table widget checks capabilities per row instead
//! of switching on concrete types.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{NavError, Result};
use crate::folder::Folder;

/// Fixed id of the synthetic back row
pub const BACK_ID: &str = "__back__";

/// Content handed to the viewer pane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewContent {
    pub title: String,
    pub body: String,
    /// Syntax highlighting hint, empty for plain text
    pub language: String,
    /// Empty for text; `application/octet-stream` for binary values
    pub content_type: String,
    pub filename: String,
}

/// Tri-state object count of a resource group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountState {
    /// No observation yet; a background resolution may be in flight
    Unknown,
    Known(usize),
    /// The server refuses watches for this resource; counts as zero
    NonWatchable,
}

impl CountState {
    /// The text shown in the count column
    pub fn cell_text(&self) -> String {
        match self {
            CountState::Unknown => String::new(),
            CountState::Known(n) => n.to_string(),
            CountState::NonWatchable => "0".to_string(),
        }
    }
}

/// A single row in a folder
pub trait Item: Send + Sync {
    /// Stable row id, unique within one folder
    fn id(&self) -> &str;

    /// Cell values, matching the folder's columns
    fn cells(&self) -> Vec<String>;

    /// Breadcrumb path for rows that lead somewhere
    fn path(&self) -> Option<Vec<String>> {
        None
    }

    fn enterable(&self) -> Option<&dyn Enterable> {
        None
    }

    fn viewable(&self) -> Option<&dyn Viewable> {
        None
    }

    fn countable(&self) -> Option<&dyn Countable> {
        None
    }

    fn is_back(&self) -> bool {
        false
    }
}

/// Rows that open a child folder
#[async_trait]
pub trait Enterable: Send + Sync {
    async fn enter(&self) -> Result<Box<dyn Folder>>;
}

/// Rows with content for the viewer pane
#[async_trait]
pub trait Viewable: Send + Sync {
    async fn view_content(&self) -> Result<ViewContent>;
}

/// Rows that carry an object count
pub trait Countable: Send + Sync {
    fn count(&self) -> CountState;
}

/// The synthetic row leading to the parent folder
pub struct BackItem;

impl Item for BackItem {
    fn id(&self) -> &str {
        BACK_ID
    }

    fn cells(&self) -> Vec<String> {
        vec!["..".to_string()]
    }

    fn is_back(&self) -> bool {
        true
    }
}

pub type EnterFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Box<dyn Folder>>> + Send + Sync>;
pub type ViewFn = Arc<dyn Fn() -> BoxFuture<'static, Result<ViewContent>> + Send + Sync>;

/// A plain row assembled from parts; capabilities appear as closures are
/// attached
pub struct RowItem {
    id: String,
    cells: Vec<String>,
    path: Option<Vec<String>>,
    enter: Option<EnterFn>,
    view: Option<ViewFn>,
}

impl RowItem {
    pub fn new(id: impl Into<String>, cells: Vec<String>) -> Self {
        RowItem {
            id: id.into(),
            cells,
            path: None,
            enter: None,
            view: None,
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_enter(mut self, enter: EnterFn) -> Self {
        self.enter = Some(enter);
        self
    }

    pub fn with_view(mut self, view: ViewFn) -> Self {
        self.view = Some(view);
        self
    }
}

impl Item for RowItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn cells(&self) -> Vec<String> {
        self.cells.clone()
    }

    fn path(&self) -> Option<Vec<String>> {
        self.path.clone()
    }

    fn enterable(&self) -> Option<&dyn Enterable> {
        self.enter.is_some().then_some(self as &dyn Enterable)
    }

    fn viewable(&self) -> Option<&dyn Viewable> {
        self.view.is_some().then_some(self as &dyn Viewable)
    }
}

#[async_trait]
impl Enterable for RowItem {
    async fn enter(&self) -> Result<Box<dyn Folder>> {
        match &self.enter {
            Some(enter) => enter().await,
            None => Err(NavError::NotEnterable {
                id: self.id.clone(),
            }),
        }
    }
}

#[async_trait]
impl Viewable for RowItem {
    async fn view_content(&self) -> Result<ViewContent> {
        match &self.view {
            Some(view) => view().await,
            None => Err(NavError::NotViewable {
                id: self.id.clone(),
            }),
        }
    }
}

/// Whether a row satisfies the richer navigation item contract, i.e. does
/// anything beyond displaying cells
pub(crate) fn is_nav_item(item: &Arc<dyn Item>) -> bool {
    item.is_back()
        || item.enterable().is_some()
        || item.viewable().is_some()
        || item.countable().is_some()
}

//! Folder base
//!
//! A folder is a breadcrumb path, a column set, a dirty flag and a row
//! source. Folders with a non-empty path expose a synthetic back row at
//! index 0 and shift every source row down by one.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use crate::error::Result;
use crate::item::{BACK_ID, BackItem, Item};
use crate::source::{DirtySignal, Notifier, RowSource};

/// Columns shared between a folder and the populate callback that discovers
/// them (object folders learn their columns from the table response)
pub type SharedColumns = Arc<StdMutex<Vec<String>>>;

pub fn shared_columns(columns: Vec<String>) -> SharedColumns {
    Arc::new(StdMutex::new(columns))
}

/// The virtualized listing interface the table widget consumes
#[async_trait]
pub trait Folder: Send + Sync {
    fn columns(&self) -> Vec<String>;

    fn path(&self) -> Vec<String>;

    fn is_dirty(&self) -> bool;

    /// Mark the folder dirty; the next read re-populates
    fn refresh(&self);

    /// Install the UI callback fired when the folder turns dirty
    /// asynchronously; set-once
    fn set_dirty_notifier(&self, notifier: Notifier);

    async fn lines(&self, top: usize, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    async fn above(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    async fn below(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>>;

    async fn len(&self) -> Result<usize>;

    async fn find(&self, id: &str) -> Result<Option<(usize, Arc<dyn Item>)>>;

    async fn item_by_id(&self, id: &str) -> Result<Option<Arc<dyn Item>>>;
}

/// Common folder behavior; concrete folders are constructed as a base around
/// a populate callback or live source
pub struct FolderBase {
    columns: SharedColumns,
    path: Vec<String>,
    source: Arc<dyn RowSource>,
    signal: DirtySignal,
    back: Arc<dyn Item>,
}

impl FolderBase {
    pub fn new(columns: Vec<String>, path: Vec<String>, source: Arc<dyn RowSource>) -> Self {
        Self::with_shared_columns(shared_columns(columns), path, source)
    }

    pub fn with_shared_columns(
        columns: SharedColumns,
        path: Vec<String>,
        source: Arc<dyn RowSource>,
    ) -> Self {
        let signal = source.signal().clone();
        FolderBase {
            columns,
            path,
            source,
            signal,
            back: Arc::new(BackItem),
        }
    }

    /// Root folders (empty path) have no back row
    fn has_back(&self) -> bool {
        !self.path.is_empty()
    }
}

#[async_trait]
impl Folder for FolderBase {
    fn columns(&self) -> Vec<String> {
        self.columns.lock().expect("columns lock poisoned").clone()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn is_dirty(&self) -> bool {
        self.signal.is_dirty()
    }

    fn refresh(&self) {
        self.source.mark_dirty();
    }

    fn set_dirty_notifier(&self, notifier: Notifier) {
        self.signal.set_notifier(notifier);
    }

    async fn lines(&self, top: usize, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        if !self.has_back() {
            return self.source.lines(top, num).await;
        }
        if num == 0 {
            // still drive the populate so dirty state settles
            self.source.lines(0, 0).await?;
            return Ok(Vec::new());
        }
        if top == 0 {
            let mut rows: Vec<Arc<dyn Item>> = vec![self.back.clone()];
            rows.extend(self.source.lines(0, num - 1).await?);
            Ok(rows)
        } else {
            self.source.lines(top - 1, num).await
        }
    }

    async fn above(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        if !self.has_back() {
            return self.source.above(id, num).await;
        }
        if id == BACK_ID {
            return Ok(Vec::new());
        }
        let Some((source_idx, _)) = self.source.find(id).await? else {
            return Ok(Vec::new());
        };
        let folder_idx = source_idx + 1;
        let start = folder_idx.saturating_sub(num);
        if start == 0 {
            let mut rows: Vec<Arc<dyn Item>> = vec![self.back.clone()];
            rows.extend(self.source.lines(0, source_idx).await?);
            Ok(rows)
        } else {
            self.source.lines(start - 1, folder_idx - start).await
        }
    }

    async fn below(&self, id: &str, num: usize) -> Result<Vec<Arc<dyn Item>>> {
        if self.has_back() && id == BACK_ID {
            return self.source.lines(0, num).await;
        }
        self.source.below(id, num).await
    }

    async fn len(&self) -> Result<usize> {
        let len = self.source.len().await?;
        Ok(len + usize::from(self.has_back()))
    }

    async fn find(&self, id: &str) -> Result<Option<(usize, Arc<dyn Item>)>> {
        if self.has_back() && id == BACK_ID {
            return Ok(Some((0, self.back.clone())));
        }
        let shift = usize::from(self.has_back());
        Ok(self
            .source
            .find(id)
            .await?
            .map(|(idx, row)| (idx + shift, row)))
    }

    async fn item_by_id(&self, id: &str) -> Result<Option<Arc<dyn Item>>> {
        if self.has_back() && id == BACK_ID {
            return Ok(Some(self.back.clone()));
        }
        self.source.item_by_id(id).await
    }
}

//! kc Table - server-side Table rows as first-class objects
//!
//! This crate provides:
//! - **Row / RowList**: carriers for table entries under the private
//!   `table.kc.dev/v1alpha1` group, with the target kind attached
//! - **Table fetcher**: list/get/watch with Table content negotiation
//! - **Row watch adapter**: row-level events with a one-shot fallback to a
//!   raw object watch when the server cannot deliver table events

pub mod error;
pub mod fetcher;
pub mod row;
pub mod table;
pub mod watch;

pub use error::{Result, TableError};
pub use fetcher::TableClient;
pub use row::{ROW_KIND, ROW_LIST_KIND, Row, RowList, TABLE_GROUP, TABLE_VERSION, table_api_version};
pub use table::{Table, TableColumnDefinition, TableRow, rows_from_table};
pub use watch::{RowEvent, RowWatcher};

//! Core domain types shared by the rowcache crates.

pub mod cell;
pub mod config;
pub mod error;
pub mod page;
pub mod statement;
pub mod view;

pub use cell::{CellValue, Row};
pub use config::{CacheConfig, LoggingConfig, PagerConfig, RowcacheConfig, UpstreamConfig, ViewConfig};
pub use error::{CoreError, CoreResult};
pub use page::RowsPage;
pub use statement::{ColumnMeta, MetaUpdate, StatementMeta, StatementState};
pub use view::ViewMeta;

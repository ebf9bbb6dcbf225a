//! Orchestration of statement results: submission, paging, views and export.

pub mod export;
pub mod metrics;
mod page_writer;
mod pager;
mod report_service;
mod view_builder;

pub use export::{export_csv, ExportOptions};
pub use metrics::{ServiceStats, StatsSnapshot};
pub use report_service::ReportService;

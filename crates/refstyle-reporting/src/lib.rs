//! Rendering of [`refstyle_core::Analysis`] results for people and tools.

pub mod export;
pub mod types;

pub use export::{export_report, render_report};
pub use types::{ExportFormat, ReportOptions};

//! Latency harness: drives repeated synchronous runs and reports where the time went.

pub mod aggregate;
pub mod client;
pub mod decompose;
pub mod report;

pub use aggregate::{run_batch, BatchOptions, BatchReport, GroupStats, SegmentStats};
pub use client::{HttpRunClient, InProcessClient, RunClient};
pub use decompose::{decompose, MetricRow};
pub use report::{format_markdown_table, render_result, render_tables};

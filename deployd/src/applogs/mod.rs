//! Application log aggregation
//!
//! Reads the stdout/stderr files the supervisor writes, extracts timestamps
//! and severities, merges streams, paginates, and purges old files.

pub mod aggregator;
pub mod paginate;
pub mod retention;
pub mod severity;
pub mod timestamp;

pub use aggregator::{LogAggregator, LogStats};
pub use paginate::{LogPage, Pagination};

//! Data models persisted by the store

pub mod application;
pub mod deployment;
pub mod log;

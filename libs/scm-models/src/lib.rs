//! Source-control host models
//!
//! Wire shapes returned by the GitHub REST API and the normalized records
//! deployd stores on an application.

pub mod models;

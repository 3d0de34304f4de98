//! deployd library
//!
//! Core modules of the deployment daemon: resource allocation, the
//! deployment pipeline, process supervision, log aggregation, and status
//! broadcasting.

pub mod alloc;
pub mod app;
pub mod applogs;
pub mod cache;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod store;
pub mod supervisor;
pub mod telemetry;
pub mod utils;
pub mod workers;

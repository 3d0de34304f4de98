//! Event payloads delivered to status subscribers

pub mod models;

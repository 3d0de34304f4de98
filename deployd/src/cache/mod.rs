//! In-memory bounded state

pub mod rate_limit;

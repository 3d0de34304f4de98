//! Local control API

pub mod error;
pub mod handlers;
pub mod serve;
pub mod state;

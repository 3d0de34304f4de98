//! Background workers

pub mod log_tail;
pub mod retention;

//! Integration tests for deployd

mod fixtures;
mod test_allocator;
mod test_fsm;
mod test_pipeline;
mod test_rate_limit;
mod test_scm;

//! Deployment pipeline

pub mod fsm;
pub mod git;
pub mod guard;
pub mod install;
pub mod orchestrator;
pub mod process;
pub mod registry;

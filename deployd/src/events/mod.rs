//! Status broadcasting

pub mod broadcaster;
pub mod topics;

pub use broadcaster::Broadcaster;
pub use event_models::models::DeploymentStatus;
pub use topics::Topics;

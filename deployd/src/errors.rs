//! Error types for deployd

use thiserror::Error;

/// Main error type for deployd
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No available ports in range {start}-{end}")]
    PortExhaustion { start: u16, end: u16 },

    #[error("Subdomain generation failed: {0}")]
    SubdomainGenerationFailure(String),

    #[error("Git clone timed out after {0} seconds")]
    CloneTimeout(u64),

    #[error("Git clone failed: {0}")]
    CloneFailure(String),

    #[error("Dependency installation failed: {0}")]
    InstallFailure(String),

    #[error("Process start failed: {0}")]
    ProcessStartFailure(String),

    #[error("Supervisor connection error: {0}")]
    SupervisorConnection(String),

    #[error("Supervisor error: {0}")]
    SupervisorError(String),

    #[error("Source control error: {0}")]
    SourceControlError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation already in progress for app {0}")]
    Busy(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Whether the error came out of a pipeline stage
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(
            self,
            PlatformError::CloneTimeout(_)
                | PlatformError::CloneFailure(_)
                | PlatformError::InstallFailure(_)
                | PlatformError::ProcessStartFailure(_)
                | PlatformError::SupervisorConnection(_)
        )
    }
}

impl From<tokio::task::JoinError> for PlatformError {
    fn from(err: tokio::task::JoinError) -> Self {
        PlatformError::Internal(err.to_string())
    }
}

//! Record store for applications and deployment attempts
//!
//! The store is an external collaborator consumed through [`AppStore`]. Both
//! shipped backends enforce the lease invariants: a subdomain belongs to at
//! most one application and a port is held by at most one running
//! application.

mod data;
mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::errors::PlatformError;
use crate::models::application::{AppStatus, Application};
use crate::models::deployment::DeploymentAttempt;
use crate::models::log::LogEntry;

/// Filter criteria for listing applications
#[derive(Debug, Clone, Default)]
pub struct AppFilter {
    /// Filter by owner
    pub user_id: Option<String>,
    /// Filter by status
    pub status: Option<AppStatus>,
    /// Only apps with (true) or without (false) a subdomain
    pub has_subdomain: Option<bool>,
    /// Only apps with a recorded process handle
    pub has_process_handle: Option<bool>,
}

impl AppFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: AppStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_subdomain(mut self, present: bool) -> Self {
        self.has_subdomain = Some(present);
        self
    }

    #[must_use]
    pub fn with_process_handle(mut self, present: bool) -> Self {
        self.has_process_handle = Some(present);
        self
    }

    /// Whether an application passes the filter
    pub fn matches(&self, app: &Application) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &app.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if app.status() != status {
                return false;
            }
        }
        if let Some(present) = self.has_subdomain {
            if app.subdomain.is_some() != present {
                return false;
            }
        }
        if let Some(present) = self.has_process_handle {
            if app.deployment.process_handle.is_some() != present {
                return false;
            }
        }
        true
    }
}

/// Backend for application and attempt records
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Get an application by ID
    async fn get_app(&self, id: &str) -> Result<Option<Application>, PlatformError>;

    /// List applications matching the filter, oldest first
    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<Application>, PlatformError>;

    /// Insert or replace an application.
    ///
    /// Fails with `Conflict` when the record would share a subdomain with
    /// another application, or a port with another running application.
    async fn save_app(&self, app: &Application) -> Result<(), PlatformError>;

    /// Delete an application. Returns whether it existed.
    async fn delete_app(&self, id: &str) -> Result<bool, PlatformError>;

    /// Get an attempt by ID
    async fn get_attempt(&self, id: &str) -> Result<Option<DeploymentAttempt>, PlatformError>;

    /// Attempts for an application, newest first
    async fn list_attempts(
        &self,
        app_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DeploymentAttempt>, PlatformError>;

    /// Insert or replace an attempt
    async fn save_attempt(&self, attempt: &DeploymentAttempt) -> Result<(), PlatformError>;

    /// Append a log line to an attempt
    async fn append_attempt_log(
        &self,
        attempt_id: &str,
        entry: LogEntry,
    ) -> Result<(), PlatformError>;

    /// Delete every attempt of an application. Returns the count removed.
    async fn delete_attempts(&self, app_id: &str) -> Result<usize, PlatformError>;
}

/// Check a candidate against the lease invariants
pub(crate) fn check_leases<'a>(
    existing: impl Iterator<Item = &'a Application>,
    candidate: &Application,
) -> Result<(), PlatformError> {
    for other in existing.filter(|a| a.id != candidate.id) {
        if let (Some(mine), Some(theirs)) = (&candidate.subdomain, &other.subdomain) {
            if mine == theirs {
                return Err(PlatformError::Conflict(format!(
                    "subdomain '{}' already assigned to app {}",
                    mine, other.id
                )));
            }
        }
        if candidate.holds_port()
            && other.holds_port()
            && candidate.runtime.port == other.runtime.port
        {
            return Err(PlatformError::Conflict(format!(
                "port {} already held by running app {}",
                candidate.runtime.port, other.id
            )));
        }
    }
    Ok(())
}

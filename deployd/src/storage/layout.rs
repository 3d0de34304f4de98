//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::PlatformError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "DEPLOYD_HOME";

/// Storage layout for the daemon
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the record store file path
    pub fn store_file(&self) -> File {
        File::new(self.base_dir.join("store.json"))
    }

    /// Root of the per-application workspaces
    pub fn deployments_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deployments"))
    }

    /// Workspace of one application
    pub fn workspace_dir(&self, app_id: &str) -> Dir {
        self.deployments_dir().subdir(app_id)
    }

    /// Application stdout/stderr logs written by the supervisor
    pub fn app_logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deployments").join("logs"))
    }

    /// Supervisor ecosystem files
    pub fn supervisor_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("supervisor"))
    }

    /// Daemon logs
    pub fn daemon_logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), PlatformError> {
        self.deployments_dir().create().await?;
        self.app_logs_dir().create().await?;
        self.supervisor_dir().create().await?;
        self.daemon_logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/lib/deployd"));

        Self::new(base_dir)
    }
}

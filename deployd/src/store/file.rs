//! JSON-file record store

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::PlatformError;
use crate::filesys::file::File;
use crate::models::application::Application;
use crate::models::deployment::DeploymentAttempt;
use crate::models::log::LogEntry;

use super::data::StoreData;
use super::{AppFilter, AppStore};

/// Store persisted to a single JSON file, rewritten atomically on every change
pub struct FileStore {
    file: File,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Open the store, loading existing records if the file exists
    pub async fn open(file: File) -> Result<Self, PlatformError> {
        let data = if file.exists().await {
            let data: StoreData = file.read_json().await.map_err(|e| {
                PlatformError::StorageError(format!(
                    "failed to load {}: {}",
                    file.path().display(),
                    e
                ))
            })?;
            info!("Loaded record store from {}", file.path().display());
            data
        } else {
            debug!("No record store at {}, starting empty", file.path().display());
            StoreData::default()
        };

        Ok(Self {
            file,
            data: Mutex::new(data),
        })
    }

    async fn flush(&self, data: &StoreData) -> Result<(), PlatformError> {
        self.file.write_json(data).await
    }
}

#[async_trait]
impl AppStore for FileStore {
    async fn get_app(&self, id: &str) -> Result<Option<Application>, PlatformError> {
        Ok(self.data.lock().await.get_app(id))
    }

    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<Application>, PlatformError> {
        Ok(self.data.lock().await.list_apps(filter))
    }

    async fn save_app(&self, app: &Application) -> Result<(), PlatformError> {
        let mut data = self.data.lock().await;
        data.save_app(app)?;
        self.flush(&data).await
    }

    async fn delete_app(&self, id: &str) -> Result<bool, PlatformError> {
        let mut data = self.data.lock().await;
        let removed = data.delete_app(id);
        if removed {
            self.flush(&data).await?;
        }
        Ok(removed)
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<DeploymentAttempt>, PlatformError> {
        Ok(self.data.lock().await.get_attempt(id))
    }

    async fn list_attempts(
        &self,
        app_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DeploymentAttempt>, PlatformError> {
        Ok(self.data.lock().await.list_attempts(app_id, limit))
    }

    async fn save_attempt(&self, attempt: &DeploymentAttempt) -> Result<(), PlatformError> {
        let mut data = self.data.lock().await;
        data.save_attempt(attempt);
        self.flush(&data).await
    }

    async fn append_attempt_log(
        &self,
        attempt_id: &str,
        entry: LogEntry,
    ) -> Result<(), PlatformError> {
        let mut data = self.data.lock().await;
        data.append_attempt_log(attempt_id, entry)?;
        self.flush(&data).await
    }

    async fn delete_attempts(&self, app_id: &str) -> Result<usize, PlatformError> {
        let mut data = self.data.lock().await;
        let removed = data.delete_attempts(app_id);
        if removed > 0 {
            self.flush(&data).await?;
        }
        Ok(removed)
    }
}

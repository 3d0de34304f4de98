//! In-memory record store

use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::PlatformError;
use crate::models::application::Application;
use crate::models::deployment::DeploymentAttempt;
use crate::models::log::LogEntry;

use super::data::StoreData;
use super::{AppFilter, AppStore};

/// In-memory store. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreData>, PlatformError> {
        self.data
            .read()
            .map_err(|_| PlatformError::StorageError("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreData>, PlatformError> {
        self.data
            .write()
            .map_err(|_| PlatformError::StorageError("lock poisoned".to_string()))
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn get_app(&self, id: &str) -> Result<Option<Application>, PlatformError> {
        Ok(self.read()?.get_app(id))
    }

    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<Application>, PlatformError> {
        Ok(self.read()?.list_apps(filter))
    }

    async fn save_app(&self, app: &Application) -> Result<(), PlatformError> {
        self.write()?.save_app(app)
    }

    async fn delete_app(&self, id: &str) -> Result<bool, PlatformError> {
        Ok(self.write()?.delete_app(id))
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<DeploymentAttempt>, PlatformError> {
        Ok(self.read()?.get_attempt(id))
    }

    async fn list_attempts(
        &self,
        app_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DeploymentAttempt>, PlatformError> {
        Ok(self.read()?.list_attempts(app_id, limit))
    }

    async fn save_attempt(&self, attempt: &DeploymentAttempt) -> Result<(), PlatformError> {
        self.write()?.save_attempt(attempt);
        Ok(())
    }

    async fn append_attempt_log(
        &self,
        attempt_id: &str,
        entry: LogEntry,
    ) -> Result<(), PlatformError> {
        self.write()?.append_attempt_log(attempt_id, entry)
    }

    async fn delete_attempts(&self, app_id: &str) -> Result<usize, PlatformError> {
        Ok(self.write()?.delete_attempts(app_id))
    }
}

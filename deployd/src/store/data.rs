//! Shared record tables behind both store backends

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::PlatformError;
use crate::models::application::Application;
use crate::models::deployment::DeploymentAttempt;
use crate::models::log::LogEntry;

use super::{check_leases, AppFilter};

#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct StoreData {
    #[serde(default)]
    apps: HashMap<String, Application>,
    #[serde(default)]
    attempts: HashMap<String, DeploymentAttempt>,
}

impl StoreData {
    pub fn get_app(&self, id: &str) -> Option<Application> {
        self.apps.get(id).cloned()
    }

    pub fn list_apps(&self, filter: &AppFilter) -> Vec<Application> {
        let mut apps: Vec<_> = self
            .apps
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        apps
    }

    pub fn save_app(&mut self, app: &Application) -> Result<(), PlatformError> {
        check_leases(self.apps.values(), app)?;
        self.apps.insert(app.id.clone(), app.clone());
        Ok(())
    }

    pub fn delete_app(&mut self, id: &str) -> bool {
        self.apps.remove(id).is_some()
    }

    pub fn get_attempt(&self, id: &str) -> Option<DeploymentAttempt> {
        self.attempts.get(id).cloned()
    }

    pub fn list_attempts(&self, app_id: &str, limit: Option<usize>) -> Vec<DeploymentAttempt> {
        let mut attempts: Vec<_> = self
            .attempts
            .values()
            .filter(|a| a.app_id == app_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        match limit {
            Some(limit) => attempts.into_iter().take(limit).collect(),
            None => attempts,
        }
    }

    pub fn save_attempt(&mut self, attempt: &DeploymentAttempt) {
        self.attempts.insert(attempt.id.clone(), attempt.clone());
    }

    pub fn append_attempt_log(
        &mut self,
        attempt_id: &str,
        entry: LogEntry,
    ) -> Result<(), PlatformError> {
        let attempt = self
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| PlatformError::NotFound(format!("attempt {}", attempt_id)))?;
        attempt.logs.push(entry);
        Ok(())
    }

    pub fn delete_attempts(&mut self, app_id: &str) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, a| a.app_id != app_id);
        before - self.attempts.len()
    }
}

//! Per-application busy guard

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::errors::PlatformError;

/// Set of applications with an operation in flight
#[derive(Debug, Default)]
pub struct BusyApps {
    ids: Mutex<HashSet<String>>,
}

impl BusyApps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an application busy. Fails with `Busy` when it already is.
    pub fn try_acquire(self: &Arc<Self>, app_id: &str) -> Result<BusyGuard, PlatformError> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(app_id.to_string()) {
            return Err(PlatformError::Busy(app_id.to_string()));
        }
        Ok(BusyGuard {
            apps: Arc::clone(self),
            app_id: app_id.to_string(),
        })
    }

    pub fn is_busy(&self, app_id: &str) -> bool {
        let ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.contains(app_id)
    }
}

/// Releases the application when dropped
#[derive(Debug)]
pub struct BusyGuard {
    apps: Arc<BusyApps>,
    app_id: String,
}

impl BusyGuard {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut ids = self.apps.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.app_id);
    }
}

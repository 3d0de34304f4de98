//! Port and subdomain allocation
//!
//! Leases are derived from the persisted applications on every call; nothing
//! is cached here. Callers that allocate and then persist hold
//! [`ResourceAllocator::lock`] across both steps.

pub mod ports;
pub mod subdomain;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::errors::PlatformError;
use crate::models::application::Application;
use crate::storage::settings::{DomainSettings, PortRangeSettings};
use crate::store::{AppFilter, AppStore};

/// A subdomain currently assigned to an application
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubdomain {
    pub app_name: String,
    pub subdomain: String,
    pub url: Option<String>,
}

/// Derives free ports and unique subdomains from the store
pub struct ResourceAllocator {
    store: Arc<dyn AppStore>,
    ports: PortRangeSettings,
    domain: DomainSettings,
    lock: Mutex<()>,
}

impl ResourceAllocator {
    pub fn new(store: Arc<dyn AppStore>, ports: PortRangeSettings, domain: DomainSettings) -> Self {
        Self {
            store,
            ports,
            domain,
            lock: Mutex::new(()),
        }
    }

    /// Serialize allocate-then-persist sequences. Hold the guard until the
    /// record carrying the new lease is saved.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    async fn used_ports(&self, except_app: Option<&str>) -> Result<HashSet<u16>, PlatformError> {
        let apps = self.store.list_apps(&AppFilter::new()).await?;
        Ok(apps
            .iter()
            .filter(|a| a.holds_port() && Some(a.id.as_str()) != except_app)
            .map(|a| a.runtime.port)
            .collect())
    }

    /// Lowest port in the configured range not held by a running application
    pub async fn allocate_port(&self) -> Result<u16, PlatformError> {
        let used = self.used_ports(None).await?;
        let port = ports::first_free_port(self.ports.start, self.ports.end, &used)?;
        debug!("Allocated port {} ({} in use)", port, used.len());
        Ok(port)
    }

    /// New port for an application whose port is now held by another
    /// running application, `None` when its port is still free
    pub async fn reassign_port_if_taken(
        &self,
        app: &Application,
    ) -> Result<Option<u16>, PlatformError> {
        let used = self.used_ports(Some(&app.id)).await?;
        if !used.contains(&app.runtime.port) {
            return Ok(None);
        }
        let port = ports::first_free_port(self.ports.start, self.ports.end, &used)?;
        info!(
            "Port {} of app {} is taken, reassigned to {}",
            app.runtime.port, app.id, port
        );
        Ok(Some(port))
    }

    /// Unique subdomain derived from the application name
    pub async fn allocate_subdomain(&self, app_name: &str) -> Result<String, PlatformError> {
        let taken = self.taken_subdomains().await?;
        let subdomain = subdomain::generate(app_name, &taken, &mut rand::thread_rng())?;
        info!("Generated subdomain {} for '{}'", subdomain, app_name);
        Ok(subdomain)
    }

    /// `<protocol>://<subdomain>.<base domain>`
    pub fn subdomain_url(&self, subdomain: &str) -> Result<String, PlatformError> {
        let base = self
            .domain
            .base_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| PlatformError::ConfigError("base domain not configured".to_string()))?;

        let protocol = if self.domain.ssl_enabled { "https" } else { "http" };
        Ok(format!("{}://{}.{}", protocol, subdomain, base))
    }

    /// `<base url>:<port>`, used when an application has no subdomain
    pub fn fallback_url(&self, port: u16) -> String {
        let base = match self.domain.apps_base_url.as_deref() {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ if self.domain.production => "https://localhost".to_string(),
            _ => "http://localhost".to_string(),
        };
        format!("{}:{}", base, port)
    }

    /// Public URL of an application
    pub fn app_url(&self, app: &Application) -> String {
        app.subdomain
            .as_deref()
            .and_then(|s| self.subdomain_url(s).ok())
            .unwrap_or_else(|| self.fallback_url(app.runtime.port))
    }

    /// Release hook. The lease itself ends when the record is deleted.
    pub async fn release_subdomain(&self, subdomain: &str) -> Result<(), PlatformError> {
        info!("Released subdomain {}", subdomain);
        Ok(())
    }

    /// Every assigned subdomain with its URL
    pub async fn active_subdomains(&self) -> Result<Vec<ActiveSubdomain>, PlatformError> {
        let apps = self
            .store
            .list_apps(&AppFilter::new().with_subdomain(true))
            .await?;

        Ok(apps
            .into_iter()
            .filter_map(|app| {
                let subdomain = app.subdomain?;
                Some(ActiveSubdomain {
                    url: self.subdomain_url(&subdomain).ok(),
                    app_name: app.name,
                    subdomain,
                })
            })
            .collect())
    }

    /// Copy of the reserved word list
    pub fn reserved_subdomains(&self) -> Vec<String> {
        subdomain::RESERVED_SUBDOMAINS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn taken_subdomains(&self) -> Result<HashSet<String>, PlatformError> {
        let apps = self
            .store
            .list_apps(&AppFilter::new().with_subdomain(true))
            .await?;
        Ok(apps.into_iter().filter_map(|a| a.subdomain).collect())
    }
}

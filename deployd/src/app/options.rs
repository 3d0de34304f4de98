//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::events::broadcaster::{DEFAULT_CAPACITY, DEFAULT_MAX_CONNECTIONS};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{DomainSettings, PortRangeSettings, Settings, SupervisorSettings};
use crate::workers::{log_tail, retention};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Source-control API base URL
    pub scm_base_url: String,

    /// Port allocation range
    pub ports: PortRangeSettings,

    /// Public URL configuration
    pub domain: DomainSettings,

    /// Process supervisor
    pub supervisor: SupervisorSettings,

    /// Deployment pipeline
    pub orchestrator: OrchestratorOptions,

    /// Event fan-out
    pub events: EventOptions,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Enable log retention worker
    pub enable_retention_worker: bool,

    /// Log retention worker options
    pub retention_worker: retention::Options,

    /// Live log tail worker options
    pub log_tail_worker: log_tail::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

impl AppOptions {
    /// Build options from the settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout,
            scm_base_url: settings.scm.api_base_url.clone(),
            ports: settings.ports.clone(),
            domain: settings.domain.clone(),
            supervisor: settings.supervisor.clone(),
            orchestrator: OrchestratorOptions {
                git_program: settings.pipeline.git_binary.clone(),
                clone_timeout: Duration::from_secs(settings.pipeline.clone_timeout_secs),
                settle_delay: Duration::from_millis(settings.pipeline.settle_delay_ms),
                max_memory_restart: settings.supervisor.max_memory_restart.clone(),
                recent_attempts: settings.pipeline.recent_attempts,
            },
            events: EventOptions::default(),
            enable_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            enable_retention_worker: settings.retention.enabled,
            retention_worker: retention::Options {
                max_age: Duration::from_secs(settings.retention.days * 24 * 60 * 60),
                hour: settings.retention.hour,
                ..Default::default()
            },
            log_tail_worker: log_tail::Options::default(),
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Broadcaster and subscriber limits
#[derive(Debug, Clone, Copy)]
pub struct EventOptions {
    /// Buffered events per topic before slow subscribers lag
    pub topic_capacity: usize,

    /// Tracked subscriber connections
    pub max_connections: usize,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            topic_capacity: DEFAULT_CAPACITY,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

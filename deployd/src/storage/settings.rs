//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit daemon logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Port allocation range
    #[serde(default)]
    pub ports: PortRangeSettings,

    /// Public URL configuration
    #[serde(default)]
    pub domain: DomainSettings,

    /// Local control server
    #[serde(default)]
    pub server: ServerSettings,

    /// Process supervisor
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Deployment pipeline
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Application log retention
    #[serde(default)]
    pub retention: RetentionSettings,

    /// Source-control API
    #[serde(default)]
    pub scm: ScmSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            ports: PortRangeSettings::default(),
            domain: DomainSettings::default(),
            server: ServerSettings::default(),
            supervisor: SupervisorSettings::default(),
            pipeline: PipelineSettings::default(),
            retention: RetentionSettings::default(),
            scm: ScmSettings::default(),
        }
    }
}

/// Inclusive port range for application processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRangeSettings {
    #[serde(default = "default_port_start")]
    pub start: u16,

    #[serde(default = "default_port_end")]
    pub end: u16,
}

fn default_port_start() -> u16 {
    4000
}

fn default_port_end() -> u16 {
    5000
}

impl Default for PortRangeSettings {
    fn default() -> Self {
        Self {
            start: default_port_start(),
            end: default_port_end(),
        }
    }
}

/// Public URL settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainSettings {
    /// Base domain for subdomain URLs, e.g. `apps.example.com`
    #[serde(default)]
    pub base_domain: Option<String>,

    /// Use https for subdomain URLs
    #[serde(default)]
    pub ssl_enabled: bool,

    /// Fallback base URL when an app has no subdomain
    #[serde(default)]
    pub apps_base_url: Option<String>,

    /// Production mode switches the fallback base URL to https
    #[serde(default)]
    pub production: bool,
}

/// Local control server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Which supervisor implementation to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorKind {
    #[default]
    Pm2,
    Memory,
}

/// Process supervisor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    #[serde(default)]
    pub kind: SupervisorKind,

    /// Path or name of the pm2 binary
    #[serde(default = "default_pm2_binary")]
    pub pm2_binary: String,

    /// Memory ceiling passed to the supervisor
    #[serde(default = "default_max_memory")]
    pub max_memory_restart: String,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_pm2_binary() -> String {
    "pm2".to_string()
}

fn default_max_memory() -> String {
    "500M".to_string()
}

fn default_connect_attempts() -> u32 {
    5
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            kind: SupervisorKind::default(),
            pm2_binary: default_pm2_binary(),
            max_memory_restart: default_max_memory(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

/// Deployment pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Git binary used for cloning
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Clone timeout in seconds
    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,

    /// Delay between start and status verification, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Attempts returned by the recent-attempts listing
    #[serde(default = "default_recent_attempts")]
    pub recent_attempts: usize,
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_clone_timeout() -> u64 {
    300
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_recent_attempts() -> usize {
    10
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            clone_timeout_secs: default_clone_timeout(),
            settle_delay_ms: default_settle_delay(),
            recent_attempts: default_recent_attempts(),
        }
    }
}

/// Log retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Files older than this many days are deleted
    #[serde(default = "default_retention_days")]
    pub days: u64,

    /// Local hour of day the sweep runs
    #[serde(default = "default_retention_hour")]
    pub hour: u32,
}

fn default_retention_days() -> u64 {
    3
}

fn default_retention_hour() -> u32 {
    2
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            days: default_retention_days(),
            hour: default_retention_hour(),
        }
    }
}

/// Source-control API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScmSettings {
    #[serde(default = "default_scm_base_url")]
    pub api_base_url: String,
}

fn default_scm_base_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for ScmSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_scm_base_url(),
        }
    }
}

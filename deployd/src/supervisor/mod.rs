//! Process supervision contract
//!
//! The supervisor owns the OS process of every deployed application. The
//! handle it returns from `start` is the process name, `app_<id>`.

pub mod memory;
pub mod pm2;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PlatformError;
use crate::models::application::Application;

/// Timestamp format the supervisor prefixes log lines with
pub const LOG_DATE_FORMAT: &str = "YYYY-MM-DD HH:mm:ss Z";

/// Process state as reported by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Online,
    Launching,
    Stopping,
    Stopped,
    Errored,
    OneLaunchStatus,
    #[serde(other)]
    Unknown,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Online => "online",
            ProcessStatus::Launching => "launching",
            ProcessStatus::Stopping => "stopping",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Errored => "errored",
            ProcessStatus::OneLaunchStatus => "one-launch-status",
            ProcessStatus::Unknown => "unknown",
        }
    }

    /// Whether a freshly started process in this state counts as failed
    pub fn is_start_failure(&self) -> bool {
        matches!(self, ProcessStatus::Errored | ProcessStatus::Stopped)
    }
}

/// Snapshot of a supervised process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescription {
    pub name: String,
    pub status: ProcessStatus,
    pub pid: Option<u32>,
    /// Milliseconds since the process came online
    pub uptime_ms: Option<u64>,
    pub restart_count: u32,
    /// Resident memory in bytes
    pub memory: u64,
    /// CPU percentage
    pub cpu: f64,
    pub out_log_path: Option<PathBuf>,
    pub err_log_path: Option<PathBuf>,
}

/// Everything the supervisor needs to launch an application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartConfig {
    pub name: String,
    pub script: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub log_file: PathBuf,
    pub out_file: PathBuf,
    pub error_file: PathBuf,
    pub max_memory_restart: String,
    pub instances: u32,
    pub exec_mode: String,
    pub merge_logs: bool,
    pub time: bool,
    pub log_date_format: String,
}

impl StartConfig {
    /// Build the launch config for an application
    pub fn for_app(
        app: &Application,
        cwd: &Path,
        logs_dir: &Path,
        max_memory_restart: &str,
    ) -> Result<Self, PlatformError> {
        let mut parts = app.runtime.start_command.split_whitespace();
        let script = parts
            .next()
            .ok_or_else(|| PlatformError::ValidationError("empty start command".to_string()))?
            .to_string();
        let args = parts.map(str::to_string).collect();

        let name = app.process_name();

        let mut env = app.runtime.environment.clone();
        env.insert("PORT".to_string(), app.runtime.port.to_string());
        env.insert("NODE_ENV".to_string(), "production".to_string());

        Ok(Self {
            script,
            args,
            cwd: cwd.to_path_buf(),
            env,
            log_file: logs_dir.join(format!("{}.log", name)),
            out_file: logs_dir.join(format!("{}.out", name)),
            error_file: logs_dir.join(format!("{}.err", name)),
            max_memory_restart: max_memory_restart.to_string(),
            instances: 1,
            exec_mode: "fork".to_string(),
            merge_logs: true,
            time: true,
            log_date_format: LOG_DATE_FORMAT.to_string(),
            name,
        })
    }
}

/// Async interface to the process supervisor daemon
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Establish (or re-establish) the connection to the daemon
    async fn connect(&self) -> Result<(), PlatformError>;

    /// Launch a process. Returns its handle.
    async fn start(&self, config: &StartConfig) -> Result<String, PlatformError>;

    async fn stop(&self, handle: &str) -> Result<(), PlatformError>;

    async fn restart(&self, handle: &str) -> Result<(), PlatformError>;

    /// Describe a process, `None` when the supervisor does not know it
    async fn describe(&self, handle: &str) -> Result<Option<ProcessDescription>, PlatformError>;

    /// Remove a process. Removing an unknown handle succeeds.
    async fn delete(&self, handle: &str) -> Result<(), PlatformError>;

    /// Save the process list so it survives a daemon restart
    async fn persist(&self) -> Result<(), PlatformError>;

    /// Restore the saved process list
    async fn resurrect(&self) -> Result<(), PlatformError>;
}

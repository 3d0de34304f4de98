//! Application models

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build command used when an application does not specify one
pub const DEFAULT_BUILD_COMMAND: &str = "npm install";

/// Lifecycle status of an application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    #[default]
    Pending,
    Building,
    Running,
    Stopped,
    Failed,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Pending => "pending",
            AppStatus::Building => "building",
            AppStatus::Running => "running",
            AppStatus::Stopped => "stopped",
            AppStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last commit seen on the tracked branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub url: String,
}

/// Source repository reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Repository name, without owner
    pub name: String,

    /// `owner/name`
    pub full_name: String,

    /// Owner login
    pub owner: String,

    pub html_url: String,
    pub clone_url: String,

    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<LastCommit>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_build_command() -> String {
    DEFAULT_BUILD_COMMAND.to_string()
}

/// How the application is built and started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Command the supervisor runs, e.g. `node server.js`
    pub start_command: String,

    /// Shell command run in the workspace before start
    #[serde(default = "default_build_command")]
    pub build_command: String,

    /// User environment variables
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Allocated port
    pub port: u16,
}

/// Deployment bookkeeping carried on the application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    #[serde(default)]
    pub status: AppStatus,

    /// Supervisor process handle, present once a start succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deployment: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deployment_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
}

/// A deployable application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,

    /// Owner user ID
    pub user_id: String,

    pub name: String,

    pub repository: Repository,

    pub runtime: RuntimeConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    #[serde(default)]
    pub deployment: DeploymentInfo,

    /// Public URL, set after the first successful deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Current lifecycle status
    pub fn status(&self) -> AppStatus {
        self.deployment.status
    }

    /// Supervisor process name for this application
    pub fn process_name(&self) -> String {
        format!("app_{}", self.id)
    }

    /// Whether this application currently holds its port
    pub fn holds_port(&self) -> bool {
        self.deployment.status == AppStatus::Running
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

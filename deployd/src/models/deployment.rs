//! Deployment attempt models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::log::{LogEntry, Severity};

/// Status of one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }

    /// Whether the attempt has completed
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Success | AttemptStatus::Failed)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of the deployment pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentAttempt {
    pub id: String,
    pub app_id: String,
    pub user_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Ordered log lines
    #[serde(default)]
    pub logs: Vec<LogEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,

    pub branch: String,
}

impl DeploymentAttempt {
    /// Create a new attempt in the pending state
    pub fn new(app_id: &str, user_id: &str, branch: &str) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            app_id: app_id.to_string(),
            user_id: user_id.to_string(),
            status: AttemptStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            logs: Vec::new(),
            error: None,
            commit_hash: None,
            branch: branch.to_string(),
        }
    }

    /// Log lines at the given severity
    pub fn logs_at(&self, severity: Severity) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().filter(move |l| l.severity == severity)
    }
}

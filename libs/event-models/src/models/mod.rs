//! Event models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single line appended to a deployment attempt's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentLogEvent {
    pub app_id: String,
    pub deployment_id: String,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Pipeline progress reported to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Building,
    Success,
    Failed,
}

/// Attempt-level status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusEvent {
    pub app_id: String,
    pub status: DeploymentStatus,
    pub timestamp: DateTime<Utc>,
}

/// Application-level status change: running, stopped, failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusEvent {
    pub app_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Line tailed from a running application's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLogEvent {
    pub app_id: String,
    pub stream: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// User-scoped notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub level: String,
    pub timestamp: DateTime<Utc>,
}

/// Envelope sent over a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    DeploymentLog(DeploymentLogEvent),
    DeploymentStatus(DeploymentStatusEvent),
    AppStatus(AppStatusEvent),
    AppLog(AppLogEvent),
    Notification(NotificationEvent),
}

impl Event {
    /// Event name as seen by subscribers
    pub fn name(&self) -> &'static str {
        match self {
            Event::DeploymentLog(_) => "deployment_log",
            Event::DeploymentStatus(_) => "deployment_status",
            Event::AppStatus(_) => "app_status",
            Event::AppLog(_) => "app_log",
            Event::Notification(_) => "notification",
        }
    }
}

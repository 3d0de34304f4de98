//! Topic-based fan-out of lifecycle events
//!
//! Delivery is at-most-once with no replay. Subscribers that fall more than
//! the channel capacity behind lose the oldest events.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::Utc;
use event_models::models::{
    AppLogEvent, AppStatusEvent, DeploymentLogEvent, DeploymentStatus, DeploymentStatusEvent,
    Event, NotificationEvent,
};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::topics::Topics;
use crate::models::application::AppStatus;
use crate::models::log::{LogSource, Severity};

/// Default per-topic channel capacity
pub const DEFAULT_CAPACITY: usize = 256;

/// Default bound on tracked connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Bounded map of live connections to user IDs. Oldest entries are evicted.
#[derive(Debug)]
struct ConnectionTracker {
    by_connection: HashMap<String, String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ConnectionTracker {
    fn new(capacity: usize) -> Self {
        Self {
            by_connection: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, connection_id: &str, user_id: &str) {
        if self
            .by_connection
            .insert(connection_id.to_string(), user_id.to_string())
            .is_some()
        {
            self.order.retain(|c| c != connection_id);
        }
        self.order.push_back(connection_id.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.by_connection.remove(&oldest);
                debug!("Evicted connection {} from tracker", oldest);
            }
        }
    }

    fn remove(&mut self, connection_id: &str) -> Option<String> {
        let user = self.by_connection.remove(connection_id)?;
        self.order.retain(|c| c != connection_id);
        Some(user)
    }

    fn count_for(&self, user_id: &str) -> usize {
        self.by_connection.values().filter(|u| *u == user_id).count()
    }
}

/// Publish/subscribe hub keyed by topic
pub struct Broadcaster {
    topics: Mutex<HashMap<String, broadcast::Sender<Event>>>,
    capacity: usize,
    connections: Mutex<ConnectionTracker>,
}

impl Broadcaster {
    pub fn new(capacity: usize, max_connections: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            connections: Mutex::new(ConnectionTracker::new(max_connections)),
        }
    }

    fn topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<Event>>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn connections(&self) -> std::sync::MutexGuard<'_, ConnectionTracker> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to a topic, creating it if needed
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        let mut topics = self.topics();
        match topics.get(topic) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                topics.insert(topic.to_string(), sender);
                debug!("Created topic {}", topic);
                receiver
            }
        }
    }

    /// Publish to a topic. Returns the number of subscribers reached.
    pub fn publish(&self, topic: &str, event: Event) -> usize {
        let mut topics = self.topics();
        let Some(sender) = topics.get(topic) else {
            trace!("No subscribers on {} for {}", topic, event.name());
            return 0;
        };

        match sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                // Every receiver is gone
                topics.remove(topic);
                debug!("Pruned topic {}", topic);
                0
            }
        }
    }

    /// Drop topics whose receivers have all gone away
    pub fn prune(&self) -> usize {
        let mut topics = self.topics();
        let before = topics.len();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        before - topics.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics().len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Track a connection for a user
    pub fn register_connection(&self, connection_id: &str, user_id: &str) {
        self.connections().insert(connection_id, user_id);
    }

    /// Forget a connection. Returns the user it belonged to.
    pub fn unregister_connection(&self, connection_id: &str) -> Option<String> {
        self.connections().remove(connection_id)
    }

    /// Live connections of a user
    pub fn connections_for_user(&self, user_id: &str) -> usize {
        self.connections().count_for(user_id)
    }

    pub fn deployment_log(&self, app_id: &str, deployment_id: &str, level: Severity, message: &str) {
        self.publish(
            &Topics::app(app_id),
            Event::DeploymentLog(DeploymentLogEvent {
                app_id: app_id.to_string(),
                deployment_id: deployment_id.to_string(),
                level: level.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            }),
        );
    }

    /// Attempt-level status
    pub fn deployment_status(&self, app_id: &str, status: DeploymentStatus) {
        self.publish(
            &Topics::app(app_id),
            Event::DeploymentStatus(DeploymentStatusEvent {
                app_id: app_id.to_string(),
                status,
                timestamp: Utc::now(),
            }),
        );
    }

    pub fn app_status(&self, app_id: &str, status: AppStatus) {
        self.publish(
            &Topics::app(app_id),
            Event::AppStatus(AppStatusEvent {
                app_id: app_id.to_string(),
                status: status.to_string(),
                timestamp: Utc::now(),
            }),
        );
    }

    pub fn app_log(&self, app_id: &str, stream: LogSource, message: &str) {
        let stream = match stream {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::Deployment => "deployment",
        };
        self.publish(
            &Topics::app(app_id),
            Event::AppLog(AppLogEvent {
                app_id: app_id.to_string(),
                stream: stream.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            }),
        );
    }

    pub fn notification(&self, user_id: &str, title: &str, message: &str, level: Severity) {
        self.publish(
            &Topics::user(user_id),
            Event::Notification(NotificationEvent {
                user_id: user_id.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                level: level.to_string(),
                timestamp: Utc::now(),
            }),
        );
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_CONNECTIONS)
    }
}

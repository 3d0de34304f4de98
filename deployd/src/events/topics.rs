//! Subscription topic names

/// Topic patterns
pub struct Topics;

impl Topics {
    /// Per-application topic: deployment logs and status, app status, live tail
    pub fn app(app_id: &str) -> String {
        format!("app_{}", app_id)
    }

    /// Per-user topic: notifications
    pub fn user(user_id: &str) -> String {
        format!("user_{}", user_id)
    }

    /// Extract the application ID from an app topic
    pub fn parse_app_id(topic: &str) -> Option<&str> {
        topic.strip_prefix("app_").filter(|id| !id.is_empty())
    }

    /// Extract the user ID from a user topic
    pub fn parse_user_id(topic: &str) -> Option<&str> {
        topic.strip_prefix("user_").filter(|id| !id.is_empty())
    }

    /// Whether a topic name is one of the known patterns
    pub fn is_valid(topic: &str) -> bool {
        Self::parse_app_id(topic).is_some() || Self::parse_user_id(topic).is_some()
    }
}

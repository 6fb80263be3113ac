use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Notification type representing the kind of event surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    MaintenanceRequest,
    PaymentUpdate,
    Message,
    Emergency,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::MaintenanceRequest => "maintenance_request",
            NotificationType::PaymentUpdate => "payment_update",
            NotificationType::Message => "message",
            NotificationType::Emergency => "emergency",
            NotificationType::System => "system",
        }
    }

    /// Types that additionally raise a transient toast
    pub fn is_important(&self) -> bool {
        matches!(
            self,
            NotificationType::Emergency | NotificationType::MaintenanceRequest
        )
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the in-memory notification feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: String, // ISO 8601
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl NotificationData {
    /// Create an unread notification for a change on a source entity.
    ///
    /// The id combines the source entity id with the creation time in
    /// milliseconds so repeated events on one record stay distinct.
    pub fn from_source(
        source_id: &str,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: format!("{}-{}", source_id, now.timestamp_millis()),
            notification_type,
            title: title.into(),
            message: message.into(),
            timestamp: now.to_rfc3339(),
            read: false,
            data,
        }
    }

    /// Create an unread notification with a random id
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            notification_type,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            read: false,
            data: None,
        }
    }
}

/// Caller-supplied fields for a broadcast notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl NewNotification {
    /// Both title and message must carry visible text
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Notification title must not be empty".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("Notification message must not be empty".to_string());
        }
        Ok(())
    }
}

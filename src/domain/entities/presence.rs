use serde::{Deserialize, Serialize};

/// Self-reported status of a connected user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Busy => "busy",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presence payload published by a client on the presence channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: String,
    pub online_at: String, // ISO 8601
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
}

impl UserPresence {
    pub fn now(user_id: impl Into<String>, status: PresenceStatus, current_page: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            online_at: chrono::Utc::now().to_rfc3339(),
            status,
            current_page,
        }
    }
}

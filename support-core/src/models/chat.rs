use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SupportError;

/// Lifecycle of a support chat. Only `Active -> Resolved -> Deleted` is allowed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Active,
    Resolved,
    Deleted,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Active => "active",
            ChatStatus::Resolved => "resolved",
            ChatStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SupportError> {
        match value {
            "active" => Ok(ChatStatus::Active),
            "resolved" => Ok(ChatStatus::Resolved),
            "deleted" => Ok(ChatStatus::Deleted),
            other => Err(SupportError::UnknownValue {
                kind: "chat status",
                value: other.to_string(),
            }),
        }
    }

    pub fn can_transition_to(self, next: ChatStatus) -> bool {
        matches!(
            (self, next),
            (ChatStatus::Active, ChatStatus::Resolved) | (ChatStatus::Resolved, ChatStatus::Deleted)
        )
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub status: ChatStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Admin listing row: the chat plus values derived from its messages at query time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatViewModel {
    #[serde(flatten)]
    pub chat: Chat,
    pub unread_count: u64,
    pub last_message: String,
}

impl ChatViewModel {
    pub fn new(chat: Chat, unread_count: u64, last_message: Option<String>) -> Self {
        Self {
            chat,
            unread_count,
            last_message: last_message.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(ChatStatus::Active.can_transition_to(ChatStatus::Resolved));
        assert!(ChatStatus::Resolved.can_transition_to(ChatStatus::Deleted));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!ChatStatus::Active.can_transition_to(ChatStatus::Deleted));
        assert!(!ChatStatus::Active.can_transition_to(ChatStatus::Active));
        assert!(!ChatStatus::Resolved.can_transition_to(ChatStatus::Active));
        assert!(!ChatStatus::Deleted.can_transition_to(ChatStatus::Active));
        assert!(!ChatStatus::Deleted.can_transition_to(ChatStatus::Resolved));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ChatStatus::parse("resolved").unwrap(), ChatStatus::Resolved);
        assert!(ChatStatus::parse("archived").is_err());
    }

    #[test]
    fn test_view_model_flattens_chat() {
        let chat = Chat {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            display_name: "Alice".to_string(),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            status: ChatStatus::Active,
            resolved_at: None,
        };
        let view = ChatViewModel::new(chat, 2, None);
        assert_eq!(view.last_message, "");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "c1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["unread_count"], 2);
        assert_eq!(json["last_message"], "");
    }
}

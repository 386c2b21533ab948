use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SupportError;

/// Delivery state of a message. Only `Sent` counts as unread.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SupportError> {
        match value {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(SupportError::UnknownValue {
                kind: "message status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub sender_name: String,
    pub status: MessageStatus,
    pub is_system: bool,
}

/// A message about to be written; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub sender_name: String,
    pub status: MessageStatus,
    pub is_system: bool,
}

impl NewMessage {
    pub fn text(sender_id: &str, sender_name: &str, text: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.to_string(),
            timestamp,
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            status: MessageStatus::Sent,
            is_system: false,
        }
    }

    pub fn system(sender_id: &str, sender_name: &str, text: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_system: true,
            ..Self::text(sender_id, sender_name, text, timestamp)
        }
    }
}

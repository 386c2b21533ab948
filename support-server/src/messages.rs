use chrono::{DateTime, Utc};
use horizon_support::models::{Chat, ChatStatus, ChatViewModel, Message, MessageStatus, Role};
use horizon_support::ClickTarget;
use serde::{Deserialize, Serialize};
use tracing::error;

/// WebSocket message types (shared between server and browser clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    // === Client -> server ===
    #[serde(rename = "connect")]
    Connect {
        user_id: String,
        display_name: String,
        #[serde(default)]
        token: Option<String>,
    },
    #[serde(rename = "open_chat")]
    OpenChat { display_name: String },
    #[serde(rename = "send_message")]
    SendMessage { chat_id: String, text: String },
    #[serde(rename = "get_messages")]
    GetMessages { chat_id: String },
    #[serde(rename = "mark_delivered")]
    MarkDelivered { chat_id: String },
    #[serde(rename = "mark_read")]
    MarkRead { chat_id: String },
    #[serde(rename = "watch_active_chats")]
    WatchActiveChats,
    #[serde(rename = "row_click")]
    RowClick { chat_id: String, target: ClickTarget },
    #[serde(rename = "cancel_deletion")]
    CancelDeletion { chat_id: String },

    // === Server -> client ===
    #[serde(rename = "auth_response")]
    AuthResponse {
        success: bool,
        message: String,
        role: Option<Role>,
    },
    #[serde(rename = "chat_opened")]
    ChatOpened { chat: Chat },
    #[serde(rename = "new_message")]
    NewMessage { message: Message },
    #[serde(rename = "messages")]
    Messages { chat_id: String, messages: Vec<Message> },
    #[serde(rename = "receipt")]
    Receipt {
        chat_id: String,
        message_ids: Vec<String>,
        status: MessageStatus,
    },
    #[serde(rename = "active_chats")]
    ActiveChats { chats: Vec<ChatViewModel> },
    #[serde(rename = "active_chats_failed")]
    ActiveChatsFailed { message: String },
    #[serde(rename = "chat_resolved")]
    ChatResolved {
        chat_id: String,
        resolved_at: DateTime<Utc>,
        deletion_due: DateTime<Utc>,
    },
    #[serde(rename = "chat_status")]
    ChatStatusChanged { chat_id: String, status: ChatStatus },
    #[serde(rename = "navigate")]
    Navigate { path: Vec<String> },
    #[serde(rename = "deletion_cancelled")]
    DeletionCancelled { chat_id: String, cancelled: bool },
    #[serde(rename = "error")]
    Error { message: String },
}

impl WsMessage {
    /// Serialize for the wire, logging instead of failing
    pub fn to_frame(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Failed to serialize {:?}: {}", self, e);
                None
            }
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WsMessage::Error {
            message: message.into(),
        }
    }
}

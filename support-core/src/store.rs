//! The document-store seam used by the desk.
//!
//! Every write announces a [`StoreEvent`] on a broadcast channel so live views
//! (the admin projection, the relay server) can refresh.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{Chat, ChatStatus, Message, MessageStatus, NewMessage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    ChatCreated { chat_id: String },
    ChatStatusChanged { chat_id: String, status: ChatStatus },
    ChatDeleted { chat_id: String },
    MessageAdded { chat_id: String, message_id: String },
    MessagesUpdated {
        chat_id: String,
        message_ids: Vec<String>,
        status: MessageStatus,
    },
}

impl StoreEvent {
    pub fn chat_id(&self) -> &str {
        match self {
            StoreEvent::ChatCreated { chat_id }
            | StoreEvent::ChatStatusChanged { chat_id, .. }
            | StoreEvent::ChatDeleted { chat_id }
            | StoreEvent::MessageAdded { chat_id, .. }
            | StoreEvent::MessagesUpdated { chat_id, .. } => chat_id,
        }
    }
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, user_id: &str, display_name: &str, created_at: DateTime<Utc>) -> Result<Chat>;

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>>;

    /// Chats with the given status, newest first.
    async fn chats_with_status(&self, status: ChatStatus) -> Result<Vec<Chat>>;

    /// Moves a chat to `status`, rejecting transitions the lifecycle forbids.
    /// Moving to `Resolved` also stamps `resolved_at`.
    async fn update_chat_status(&self, chat_id: &str, status: ChatStatus, at: DateTime<Utc>) -> Result<Chat>;

    /// Removes a resolved chat together with its messages. Returns `false` when
    /// the chat no longer exists.
    async fn delete_chat(&self, chat_id: &str) -> Result<bool>;

    async fn add_message(&self, chat_id: &str, message: NewMessage) -> Result<Message>;

    /// Appends `closing` and moves an active chat to `Resolved` as one write.
    /// Nothing is written unless the chat is still active.
    async fn resolve_chat(&self, chat_id: &str, closing: NewMessage, at: DateTime<Utc>) -> Result<(Chat, Message)>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// All messages of a chat, oldest first.
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    async fn count_messages_with_status(&self, chat_id: &str, status: MessageStatus) -> Result<u64>;

    /// The newest message by timestamp, later inserts winning ties.
    async fn latest_message(&self, chat_id: &str) -> Result<Option<Message>>;

    /// Sets `status` on every message of the chat not sent by `reader` whose
    /// current status is one of `from`. Returns the ids that changed.
    async fn update_message_status(
        &self,
        chat_id: &str,
        reader_id: &str,
        from: &[MessageStatus],
        status: MessageStatus,
    ) -> Result<Vec<String>>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

use std::sync::Arc;

use horizon_support::models::ChatStatus;
use horizon_support::StoreEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::messages::WsMessage;
use crate::state::ServerState;

/// Forward store changes to the connected participants of each chat.
pub fn spawn_event_relay(state: Arc<ServerState>) -> JoinHandle<()> {
    let mut events = state.desk.store().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => relay_event(&state, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event relay fell behind, skipped {} store events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event relay stopped");
    })
}

async fn owner_of(state: &ServerState, chat_id: &str) -> Option<String> {
    if let Some(owner) = state.owner_of(chat_id) {
        return Some(owner);
    }
    match state.desk.store().get_chat(chat_id).await {
        Ok(Some(chat)) => {
            state.remember_owner(chat_id, &chat.user_id);
            Some(chat.user_id)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to look up owner of chat {}: {}", chat_id, e);
            None
        }
    }
}

pub async fn relay_event(state: &ServerState, event: StoreEvent) {
    match event {
        StoreEvent::ChatCreated { chat_id } => {
            // Admin lists refresh through their projections; only learn the owner
            owner_of(state, &chat_id).await;
        }
        StoreEvent::MessageAdded { chat_id, message_id } => {
            let message = match state.desk.store().get_message(&message_id).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("Message {} vanished before relay", message_id);
                    return;
                }
                Err(e) => {
                    warn!("Failed to load message {} for relay: {}", message_id, e);
                    return;
                }
            };
            let owner = owner_of(state, &chat_id).await;
            state.send_to_participants(owner.as_deref(), &WsMessage::NewMessage { message });
        }
        StoreEvent::MessagesUpdated {
            chat_id,
            message_ids,
            status,
        } => {
            let owner = owner_of(state, &chat_id).await;
            state.send_to_participants(
                owner.as_deref(),
                &WsMessage::Receipt {
                    chat_id,
                    message_ids,
                    status,
                },
            );
        }
        StoreEvent::ChatStatusChanged { chat_id, status } => {
            let owner = owner_of(state, &chat_id).await;
            state.send_to_participants(owner.as_deref(), &WsMessage::ChatStatusChanged { chat_id, status });
        }
        StoreEvent::ChatDeleted { chat_id } => {
            let owner = state.forget_chat(&chat_id);
            state.send_to_participants(
                owner.as_deref(),
                &WsMessage::ChatStatusChanged {
                    chat_id,
                    status: ChatStatus::Deleted,
                },
            );
        }
    }
}

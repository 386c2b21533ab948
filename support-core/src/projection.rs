//! Live admin listing of active chats.
//!
//! Each refresh loads the active chats, enriches every chat with its unread
//! count and last message, and publishes the whole batch at once. A failed
//! lookup fails the batch; the next store change retries.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SupportError};
use crate::models::{Chat, ChatStatus, ChatViewModel, Identity, MessageStatus};
use crate::store::{ChatStore, StoreEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionState {
    Loading,
    Ready(Arc<Vec<ChatViewModel>>),
    Failed(String),
}

impl ProjectionState {
    pub fn chats(&self) -> Option<&[ChatViewModel]> {
        match self {
            ProjectionState::Ready(chats) => Some(chats.as_slice()),
            _ => None,
        }
    }
}

/// Handle to a running projection. Dropping it stops the refresh task.
pub struct ActiveChatProjection {
    state: watch::Receiver<ProjectionState>,
    task: JoinHandle<()>,
}

impl ActiveChatProjection {
    pub fn start(store: Arc<dyn ChatStore>, admin: &Identity, lookup_concurrency: usize) -> Result<Self> {
        admin.require_admin("watching active chats")?;

        // Subscribe before the first load so no change slips between the two
        let events = store.subscribe();
        let (tx, rx) = watch::channel(ProjectionState::Loading);
        let admin_id = admin.user_id.clone();

        info!("Starting active chat projection for {}", admin_id);
        let task = tokio::spawn(run(store, events, tx, lookup_concurrency, admin_id));

        Ok(Self { state: rx, task })
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectionState> {
        self.state.clone()
    }
}

impl Drop for ActiveChatProjection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    store: Arc<dyn ChatStore>,
    mut events: broadcast::Receiver<StoreEvent>,
    tx: watch::Sender<ProjectionState>,
    lookup_concurrency: usize,
    admin_id: String,
) {
    loop {
        let state = match load_active_chats(store.as_ref(), lookup_concurrency).await {
            Ok(chats) => {
                debug!("Projection for {} refreshed with {} chats", admin_id, chats.len());
                ProjectionState::Ready(Arc::new(chats))
            }
            Err(e) => {
                warn!("Projection refresh for {} failed: {}", admin_id, e);
                ProjectionState::Failed(e.to_string())
            }
        };

        if tx.send(state).is_err() {
            break;
        }

        match events.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Projection for {} skipped {} store events", admin_id, skipped);
            }
            Err(RecvError::Closed) => break,
        }

        // Coalesce a burst of changes into one refresh
        loop {
            match events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    debug!("Projection for {} stopped", admin_id);
}

/// One refresh of the admin listing, in the store's newest-first order.
pub async fn load_active_chats(store: &dyn ChatStore, lookup_concurrency: usize) -> Result<Vec<ChatViewModel>> {
    let chats = store.chats_with_status(ChatStatus::Active).await?;

    stream::iter(chats)
        .map(|chat| enrich(store, chat))
        .buffered(lookup_concurrency.max(1))
        .try_collect()
        .await
}

async fn enrich(store: &dyn ChatStore, chat: Chat) -> Result<ChatViewModel> {
    let lookups = tokio::try_join!(
        store.count_messages_with_status(&chat.id, MessageStatus::Sent),
        store.latest_message(&chat.id),
    );

    match lookups {
        Ok((unread_count, latest)) => Ok(ChatViewModel::new(chat, unread_count, latest.map(|m| m.text))),
        Err(e) => Err(SupportError::Lookup {
            chat_id: chat.id,
            source: Box::new(e),
        }),
    }
}

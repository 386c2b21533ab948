use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::config::{SUPPORT_SENDER_ID, SUPPORT_SENDER_NAME};
use crate::error::Result;
use crate::models::NewMessage;
use crate::navigation::RowEvent;
use crate::scheduler::DeletionScheduler;
use crate::store::ChatStore;
use crate::utils::time;

/// What a successful resolve did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveReceipt {
    pub chat_id: String,
    pub system_message_id: String,
    pub resolved_at: DateTime<Utc>,
    pub deletion_due: DateTime<Utc>,
}

/// Closes out chats: closing message, status change, delayed deletion.
#[derive(Clone)]
pub struct ChatResolver {
    store: Arc<dyn ChatStore>,
    scheduler: DeletionScheduler,
    closing_message: String,
    deletion_delay: Duration,
}

impl ChatResolver {
    pub fn new(
        store: Arc<dyn ChatStore>,
        scheduler: DeletionScheduler,
        closing_message: &str,
        deletion_delay: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            closing_message: closing_message.to_string(),
            deletion_delay,
        }
    }

    /// Handles a click on a row's resolve button. The event stops propagating
    /// before anything else happens, so the row never navigates.
    pub async fn resolve_click(&self, event: &mut RowEvent) -> Result<ResolveReceipt> {
        event.stop_propagation();
        self.resolve(&event.chat_id).await
    }

    pub async fn resolve(&self, chat_id: &str) -> Result<ResolveReceipt> {
        match self.close_out(chat_id).await {
            Ok(receipt) => {
                info!(
                    "Resolved chat {}, deletion due at {}",
                    chat_id, receipt.deletion_due
                );
                Ok(receipt)
            }
            Err(e) => {
                error!("Failed to resolve chat {}: {}", chat_id, e);
                Err(e)
            }
        }
    }

    async fn close_out(&self, chat_id: &str) -> Result<ResolveReceipt> {
        let now = time::now();
        let closing = NewMessage::system(SUPPORT_SENDER_ID, SUPPORT_SENDER_NAME, &self.closing_message, now);

        // Active check, closing message and status change are a single write
        let (resolved, closing) = self.store.resolve_chat(chat_id, closing, now).await?;

        let deletion_due = self.scheduler.schedule(chat_id, self.deletion_delay);

        Ok(ResolveReceipt {
            chat_id: chat_id.to_string(),
            system_message_id: closing.id,
            resolved_at: resolved.resolved_at.unwrap_or(now),
            deletion_due,
        })
    }
}

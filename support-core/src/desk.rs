//! The support desk: every operation clients can perform on support chats.
//!
//! Users may only act on chats they own; admins may act on any chat.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SupportConfig;
use crate::error::{Result, SupportError};
use crate::models::input::{ChatIdInput, OpenChatInput, SendMessageInput, ValidateExt};
use crate::models::{Chat, ChatStatus, Identity, Message, MessageStatus, NewMessage};
use crate::navigation::{ClickTarget, Route, RowEvent};
use crate::projection::ActiveChatProjection;
use crate::resolution::{ChatResolver, ResolveReceipt};
use crate::scheduler::DeletionScheduler;
use crate::store::ChatStore;
use crate::utils::time;

/// Result of a click on an admin chat row.
#[derive(Debug)]
pub enum RowOutcome {
    Navigate(Route),
    Resolved(ResolveReceipt),
}

#[derive(Clone)]
pub struct SupportDesk {
    store: Arc<dyn ChatStore>,
    scheduler: DeletionScheduler,
    resolver: ChatResolver,
    config: SupportConfig,
}

impl SupportDesk {
    pub fn new(store: Arc<dyn ChatStore>, config: SupportConfig) -> Self {
        let scheduler = DeletionScheduler::new(store.clone());
        let resolver = ChatResolver::new(
            store.clone(),
            scheduler.clone(),
            &config.closing_message,
            config.deletion_delay,
        );
        Self {
            store,
            scheduler,
            resolver,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &DeletionScheduler {
        &self.scheduler
    }

    /// Opens a new support session owned by `user`.
    pub async fn open_chat(&self, user: &Identity, input: OpenChatInput) -> Result<Chat> {
        input.validate_input()?;

        let chat = self
            .store
            .create_chat(&user.user_id, input.display_name.trim(), time::now())
            .await?;
        info!("User {} opened support chat {}", user.user_id, chat.id);
        Ok(chat)
    }

    pub async fn post_message(&self, sender: &Identity, input: SendMessageInput) -> Result<Message> {
        input.validate_input()?;

        let chat = self.accessible_chat(sender, &input.chat_id).await?;
        if chat.status != ChatStatus::Active {
            return Err(SupportError::Validation(format!(
                "chat {} is {} and no longer accepts messages",
                chat.id, chat.status
            )));
        }

        let message = self
            .store
            .add_message(
                &chat.id,
                NewMessage::text(&sender.user_id, &sender.display_name, &input.text, time::now()),
            )
            .await?;
        debug!("Message {} posted to chat {} by {}", message.id, chat.id, sender.user_id);
        Ok(message)
    }

    pub async fn messages(&self, viewer: &Identity, chat_id: &str) -> Result<Vec<Message>> {
        ChatIdInput::new(chat_id).validate_input()?;
        let chat = self.accessible_chat(viewer, chat_id).await?;
        self.store.messages(&chat.id).await
    }

    /// Marks messages the viewer received as delivered. Returns the ids changed.
    pub async fn mark_delivered(&self, viewer: &Identity, chat_id: &str) -> Result<Vec<String>> {
        ChatIdInput::new(chat_id).validate_input()?;
        let chat = self.accessible_chat(viewer, chat_id).await?;
        self.store
            .update_message_status(&chat.id, &viewer.user_id, &[MessageStatus::Sent], MessageStatus::Delivered)
            .await
    }

    /// Marks every message the viewer received as read. Returns the ids changed.
    pub async fn mark_read(&self, viewer: &Identity, chat_id: &str) -> Result<Vec<String>> {
        ChatIdInput::new(chat_id).validate_input()?;
        let chat = self.accessible_chat(viewer, chat_id).await?;
        let changed = self
            .store
            .update_message_status(
                &chat.id,
                &viewer.user_id,
                &[MessageStatus::Sent, MessageStatus::Delivered],
                MessageStatus::Read,
            )
            .await?;
        if !changed.is_empty() {
            debug!("{} marked {} messages read in chat {}", viewer.user_id, changed.len(), chat.id);
        }
        Ok(changed)
    }

    /// Starts the live listing of active chats for `admin`.
    pub fn active_chats(&self, admin: &Identity) -> Result<ActiveChatProjection> {
        ActiveChatProjection::start(self.store.clone(), admin, self.config.lookup_concurrency)
    }

    pub async fn resolve(&self, admin: &Identity, event: &mut RowEvent) -> Result<ResolveReceipt> {
        event.stop_propagation();
        admin.require_admin("resolving a chat")?;
        self.resolver.resolve_click(event).await
    }

    /// Dispatches a click on an admin chat row.
    pub async fn click(&self, admin: &Identity, mut event: RowEvent) -> Result<RowOutcome> {
        admin.require_admin("managing chats")?;

        if event.target == ClickTarget::ResolveButton {
            let receipt = self.resolve(admin, &mut event).await?;
            return Ok(RowOutcome::Resolved(receipt));
        }

        event
            .route()
            .map(RowOutcome::Navigate)
            .ok_or_else(|| SupportError::Validation("row event was already handled".to_string()))
    }

    pub fn cancel_deletion(&self, admin: &Identity, chat_id: &str) -> Result<bool> {
        admin.require_admin("cancelling a deletion")?;
        Ok(self.scheduler.cancel(chat_id))
    }

    /// Re-schedules deletions for chats left resolved by an earlier run,
    /// keeping whatever part of the grace period remains.
    pub async fn resume_pending_deletions(&self) -> Result<usize> {
        let resolved = self.store.chats_with_status(ChatStatus::Resolved).await?;
        let now = time::now();

        for chat in &resolved {
            let resolved_at = chat.resolved_at.unwrap_or(chat.created_at);
            let elapsed = (now - resolved_at).to_std().unwrap_or_default();
            let remaining = self.config.deletion_delay.saturating_sub(elapsed);
            self.scheduler.schedule(&chat.id, remaining);
        }

        if !resolved.is_empty() {
            info!("Resumed {} pending chat deletions", resolved.len());
        }
        Ok(resolved.len())
    }

    async fn accessible_chat(&self, identity: &Identity, chat_id: &str) -> Result<Chat> {
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| SupportError::ChatNotFound(chat_id.to_string()))?;

        if identity.is_admin() || chat.user_id == identity.user_id {
            Ok(chat)
        } else {
            Err(SupportError::Forbidden(format!(
                "{} does not own chat {}",
                identity.user_id, chat_id
            )))
        }
    }
}

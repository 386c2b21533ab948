use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use horizon_support::models::input::{OpenChatInput, SendMessageInput};
use horizon_support::models::{Identity, Role};
use horizon_support::utils::validation::{normalize_display_name, validate_user_id};
use horizon_support::{ProjectionState, RowEvent, RowOutcome, SupportError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::messages::WsMessage;
use crate::state::ServerState;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// One authenticated connection
pub struct Session {
    pub identity: Identity,
    tx: mpsc::UnboundedSender<String>,
    watcher: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(identity: Identity, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            identity,
            tx,
            watcher: None,
        }
    }

    fn reply(&self, message: &WsMessage) {
        if let Some(frame) = message.to_frame() {
            let _ = self.tx.send(frame);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Handle a single WebSocket connection
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Wait for Connect message to authenticate
    let identity = match wait_for_connect(&mut ws_receiver, &state).await {
        Ok(identity) => identity,
        Err(reason) => {
            warn!("Connection rejected: {}", reason);
            let response = WsMessage::AuthResponse {
                success: false,
                message: reason,
                role: None,
            };
            if let Some(json) = response.to_frame() {
                let _ = ws_sender.send(Message::Text(json.into())).await;
            }
            let _ = ws_sender.close().await;
            return;
        }
    };

    let user_id = identity.user_id.clone();
    info!("{:?} connected: {}", identity.role, user_id);

    // Create channel for sending messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.add_client(user_id.clone(), identity.role, tx.clone());

    // Send auth success response
    let auth_response = WsMessage::AuthResponse {
        success: true,
        message: "Connected to support".to_string(),
        role: Some(identity.role),
    };
    if let Some(json) = auth_response.to_frame() {
        if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
            error!("Failed to send auth response to {}: {}", user_id, e);
        }
    }

    // Spawn task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(identity, tx.clone());

    loop {
        tokio::select! {
            // Branch 1: Read from WebSocket
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(Message::Text(text))) => {
                        handle_message(&text, &mut session, &state).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("User {} sent close frame", user_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for user {}", user_id);
                        break;
                    }
                    _ => {}
                }
            }
            // Branch 2: Monitor Send Task (Write errors)
            _ = &mut send_task => {
                info!("Send task finished for user {} (likely connection lost)", user_id);
                break;
            }
        }
    }

    // Cleanup: dropping the session stops its projection and closes its sender
    drop(session);
    send_task.abort();
    state.remove_client(&user_id, &tx);

    info!("User disconnected: {}", user_id);
}

/// Wait for the Connect message from a new connection
async fn wait_for_connect(
    receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    state: &ServerState,
) -> Result<Identity, String> {
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS), async {
        while let Some(result) = receiver.next().await {
            let text = match result {
                Ok(Message::Text(text)) => text,
                Ok(_) => continue,
                Err(e) => return Err(format!("WebSocket error before authentication: {}", e)),
            };

            match serde_json::from_str::<WsMessage>(&text) {
                Ok(WsMessage::Connect {
                    user_id,
                    display_name,
                    token,
                }) => return identity_from_connect(state, &user_id, &display_name, token.as_deref()),
                Ok(_) => debug!("Ignoring message before authentication"),
                Err(e) => warn!("Failed to parse Connect message: {}", e),
            }
        }
        Err("Connection closed before authentication".to_string())
    });

    match timeout.await {
        Ok(result) => result,
        Err(_) => Err("Authentication timeout".to_string()),
    }
}

pub fn identity_from_connect(
    state: &ServerState,
    user_id: &str,
    display_name: &str,
    token: Option<&str>,
) -> Result<Identity, String> {
    validate_user_id(user_id).map_err(|e| e.to_string())?;
    let display_name = normalize_display_name(display_name).map_err(|e| e.to_string())?;

    match state.role_for_token(token) {
        Some(Role::Admin) => Ok(Identity::admin(user_id, &display_name)),
        Some(Role::User) => Ok(Identity::user(user_id, &display_name)),
        None => Err(format!("Authentication failed for {}: invalid token", user_id)),
    }
}

/// Handle an incoming message from an authenticated client.
///
/// Every desk call acts as the session's identity; nothing in the frame can
/// change who the sender is.
pub async fn handle_message(text: &str, session: &mut Session, state: &ServerState) {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", session.identity.user_id, e);
            session.reply(&WsMessage::error(format!("Invalid message: {}", e)));
            return;
        }
    };

    if let Err(e) = dispatch(msg, session, state).await {
        debug!("Request from {} failed: {}", session.identity.user_id, e);
        session.reply(&WsMessage::error(e.to_string()));
    }
}

async fn dispatch(msg: WsMessage, session: &mut Session, state: &ServerState) -> Result<(), SupportError> {
    let desk = &state.desk;
    let identity = &session.identity;

    match msg {
        WsMessage::OpenChat { display_name } => {
            let chat = desk.open_chat(identity, OpenChatInput { display_name }).await?;
            state.remember_owner(&chat.id, &chat.user_id);
            session.reply(&WsMessage::ChatOpened { chat });
        }
        WsMessage::SendMessage { chat_id, text } => {
            // Delivered back to the sender through the event relay
            desk.post_message(identity, SendMessageInput { chat_id, text }).await?;
        }
        WsMessage::GetMessages { chat_id } => {
            let messages = desk.messages(identity, &chat_id).await?;
            session.reply(&WsMessage::Messages { chat_id, messages });
        }
        WsMessage::MarkDelivered { chat_id } => {
            desk.mark_delivered(identity, &chat_id).await?;
        }
        WsMessage::MarkRead { chat_id } => {
            desk.mark_read(identity, &chat_id).await?;
        }
        WsMessage::WatchActiveChats => {
            if session.is_watching() {
                return Ok(());
            }
            let projection = desk.active_chats(identity)?;
            let tx = session.tx.clone();
            session.watcher = Some(tokio::spawn(forward_projection(projection, tx)));
        }
        WsMessage::RowClick { chat_id, target } => match desk.click(identity, RowEvent::new(&chat_id, target)).await? {
            RowOutcome::Navigate(route) => session.reply(&WsMessage::Navigate { path: route.0 }),
            RowOutcome::Resolved(receipt) => session.reply(&WsMessage::ChatResolved {
                chat_id: receipt.chat_id,
                resolved_at: receipt.resolved_at,
                deletion_due: receipt.deletion_due,
            }),
        },
        WsMessage::CancelDeletion { chat_id } => {
            let cancelled = desk.cancel_deletion(identity, &chat_id)?;
            session.reply(&WsMessage::DeletionCancelled { chat_id, cancelled });
        }
        WsMessage::Connect { .. } => {
            // Already authenticated, ignore
        }
        _ => {
            // Server-only messages, ignore from client
            debug!("Ignoring server-only message from {}", identity.user_id);
        }
    }

    Ok(())
}

/// Push every projection snapshot to one connection until either side goes away.
async fn forward_projection(projection: horizon_support::ActiveChatProjection, tx: mpsc::UnboundedSender<String>) {
    let mut rx = projection.subscribe();

    loop {
        let frame = {
            let current = rx.borrow_and_update();
            match &*current {
                ProjectionState::Loading => None,
                ProjectionState::Ready(chats) => Some(WsMessage::ActiveChats {
                    chats: chats.as_ref().clone(),
                }),
                ProjectionState::Failed(message) => Some(WsMessage::ActiveChatsFailed {
                    message: message.clone(),
                }),
            }
        };

        if let Some(json) = frame.and_then(|f| f.to_frame()) {
            if tx.send(json).is_err() {
                break;
            }
        }

        if rx.changed().await.is_err() {
            break;
        }
    }

    drop(projection);
}

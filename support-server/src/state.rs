use dashmap::DashMap;
use horizon_support::models::Role;
use horizon_support::SupportDesk;
use tokio::sync::mpsc;

use crate::messages::WsMessage;

/// One open socket and the role it authenticated with
struct ClientConnection {
    tx: mpsc::UnboundedSender<String>,
    role: Role,
}

/// Server state: the support desk plus the connected clients
pub struct ServerState {
    pub desk: SupportDesk,
    /// user_id -> open connections (supports multiple connections per user)
    clients: DashMap<String, Vec<ClientConnection>>,
    /// chat_id -> owning user id, remembered so deletions can still reach the owner
    chat_owners: DashMap<String, String>,
    admin_token: Option<String>,
}

impl ServerState {
    pub fn new(desk: SupportDesk, admin_token: Option<String>) -> Self {
        Self {
            desk,
            clients: DashMap::new(),
            chat_owners: DashMap::new(),
            admin_token: admin_token.filter(|t| !t.is_empty()),
        }
    }

    /// Decide the role for a connect attempt. `None` means the token was wrong.
    pub fn role_for_token(&self, token: Option<&str>) -> Option<Role> {
        match (token, self.admin_token.as_deref()) {
            (None, _) => Some(Role::User),
            (Some(given), Some(expected)) if given == expected => Some(Role::Admin),
            (Some(_), _) => None,
        }
    }

    /// Register a new client connection. The role belongs to this connection
    /// only, not to every connection sharing the user id.
    pub fn add_client(&self, user_id: String, role: Role, tx: mpsc::UnboundedSender<String>) {
        self.clients
            .entry(user_id)
            .or_default()
            .push(ClientConnection { tx, role });
    }

    /// Remove one connection of a user, along with any that already closed
    pub fn remove_client(&self, user_id: &str, connection: &mpsc::UnboundedSender<String>) {
        if let Some(mut entry) = self.clients.get_mut(user_id) {
            entry.retain(|c| !c.tx.same_channel(connection) && !c.tx.is_closed());
            // If no connections left, remove the user entry
            if entry.is_empty() {
                drop(entry);
                self.clients.remove_if(user_id, |_, connections| connections.is_empty());
            }
        }
    }

    /// Send message to a specific user (sends to all their connections)
    pub fn send_to_user(&self, user_id: &str, message: &str) -> bool {
        if let Some(connections) = self.clients.get(user_id) {
            let mut sent = false;
            for connection in connections.iter() {
                if connection.tx.send(message.to_string()).is_ok() {
                    sent = true;
                }
            }
            sent
        } else {
            false
        }
    }

    /// Send to every admin connection, skipping users named `skip_user_id`
    pub fn send_to_admins(&self, message: &str, skip_user_id: Option<&str>) {
        for entry in self.clients.iter() {
            if Some(entry.key().as_str()) == skip_user_id {
                continue;
            }
            for connection in entry.value().iter().filter(|c| c.role == Role::Admin) {
                let _ = connection.tx.send(message.to_string());
            }
        }
    }

    /// Send to the chat's owner and every admin, each user at most once
    pub fn send_to_participants(&self, owner_id: Option<&str>, message: &WsMessage) {
        let Some(frame) = message.to_frame() else {
            return;
        };
        if let Some(owner) = owner_id {
            self.send_to_user(owner, &frame);
        }
        self.send_to_admins(&frame, owner_id);
    }

    pub fn remember_owner(&self, chat_id: &str, user_id: &str) {
        self.chat_owners.insert(chat_id.to_string(), user_id.to_string());
    }

    pub fn owner_of(&self, chat_id: &str) -> Option<String> {
        self.chat_owners.get(chat_id).map(|owner| owner.clone())
    }

    pub fn forget_chat(&self, chat_id: &str) -> Option<String> {
        self.chat_owners.remove(chat_id).map(|(_, owner)| owner)
    }
}

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Result, SupportError};
use crate::models::{Chat, ChatStatus, Message, MessageStatus, NewMessage};
use crate::store::{ChatStore, StoreEvent};
use crate::utils::time::{from_millis, to_millis};

const EVENT_CHANNEL_CAPACITY: usize = 256;

const CHAT_COLUMNS: &str = "id, user_id, display_name, status, created_at, resolved_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, text, timestamp, sender_id, sender_name, status, is_system";

/// SQLite-backed chat store. The connection is only locked for synchronous
/// statement execution, never across an await.
pub struct Database {
    conn: Mutex<Connection>,
    events: broadcast::Sender<StoreEvent>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened support database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            events,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock()?;
        f(&mut conn)
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        -- Support chats, one per user session
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            status TEXT CHECK(status IN ('active', 'resolved', 'deleted')) NOT NULL DEFAULT 'active',
            created_at INTEGER NOT NULL
        );

        -- Messages, ordered by timestamp then insertion
        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            text TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            sender_id TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            status TEXT CHECK(status IN ('sent', 'delivered', 'read')) NOT NULL DEFAULT 'sent',
            is_system INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_chats_status_created ON chats(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_chat_timestamp ON messages(chat_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_messages_chat_status ON messages(chat_id, status);
        ",
    )?;

    // Migration: resolved_at was added after the first release
    let has_resolved_at: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('chats') WHERE name = 'resolved_at'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .map(|count| count > 0)
        .unwrap_or(false);

    if !has_resolved_at {
        conn.execute("ALTER TABLE chats ADD COLUMN resolved_at INTEGER", [])?;
    }

    Ok(())
}

struct ChatRow {
    id: String,
    user_id: String,
    display_name: String,
    status: String,
    created_at: i64,
    resolved_at: Option<i64>,
}

impl ChatRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            display_name: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            resolved_at: row.get(5)?,
        })
    }

    fn into_chat(self) -> Result<Chat> {
        Ok(Chat {
            status: ChatStatus::parse(&self.status)?,
            created_at: from_millis(self.created_at)?,
            resolved_at: self.resolved_at.map(from_millis).transpose()?,
            id: self.id,
            user_id: self.user_id,
            display_name: self.display_name,
        })
    }
}

struct MessageRow {
    id: String,
    chat_id: String,
    text: String,
    timestamp: i64,
    sender_id: String,
    sender_name: String,
    status: String,
    is_system: bool,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            text: row.get(2)?,
            timestamp: row.get(3)?,
            sender_id: row.get(4)?,
            sender_name: row.get(5)?,
            status: row.get(6)?,
            is_system: row.get::<_, i32>(7)? == 1,
        })
    }

    fn into_message(self) -> Result<Message> {
        Ok(Message {
            status: MessageStatus::parse(&self.status)?,
            timestamp: from_millis(self.timestamp)?,
            id: self.id,
            chat_id: self.chat_id,
            text: self.text,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            is_system: self.is_system,
        })
    }
}

fn find_chat(conn: &Connection, chat_id: &str) -> Result<Option<Chat>> {
    conn.query_row(
        &format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS),
        [chat_id],
        ChatRow::from_row,
    )
    .optional()?
    .map(ChatRow::into_chat)
    .transpose()
}

fn find_message(conn: &Connection, message_id: &str) -> Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
        [message_id],
        MessageRow::from_row,
    )
    .optional()?
    .map(MessageRow::into_message)
    .transpose()
}

fn stamp_message(chat_id: &str, message: NewMessage) -> Message {
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        text: message.text,
        timestamp: message.timestamp,
        sender_id: message.sender_id,
        sender_name: message.sender_name,
        status: message.status,
        is_system: message.is_system,
    }
}

fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, chat_id, text, timestamp, sender_id, sender_name, status, is_system)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &message.id,
            &message.chat_id,
            &message.text,
            to_millis(message.timestamp),
            &message.sender_id,
            &message.sender_name,
            message.status.as_str(),
            message.is_system as i32
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ChatStore for Database {
    async fn create_chat(&self, user_id: &str, display_name: &str, created_at: DateTime<Utc>) -> Result<Chat> {
        let chat = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            created_at,
            status: ChatStatus::Active,
            resolved_at: None,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, user_id, display_name, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &chat.id,
                    &chat.user_id,
                    &chat.display_name,
                    chat.status.as_str(),
                    to_millis(chat.created_at)
                ],
            )?;
            Ok(())
        })?;

        self.notify(StoreEvent::ChatCreated {
            chat_id: chat.id.clone(),
        });
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        self.with_conn(|conn| find_chat(conn, chat_id))
    }

    async fn chats_with_status(&self, status: ChatStatus) -> Result<Vec<Chat>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM chats WHERE status = ?1 ORDER BY created_at DESC, rowid DESC",
                CHAT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([status.as_str()], ChatRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ChatRow::into_chat).collect()
        })
    }

    async fn update_chat_status(&self, chat_id: &str, status: ChatStatus, at: DateTime<Utc>) -> Result<Chat> {
        if status == ChatStatus::Deleted {
            return Err(SupportError::Validation(
                "chats are deleted through delete_chat".to_string(),
            ));
        }

        let chat = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let current =
                find_chat(&tx, chat_id)?.ok_or_else(|| SupportError::ChatNotFound(chat_id.to_string()))?;

            if !current.status.can_transition_to(status) {
                return Err(SupportError::InvalidTransition {
                    chat_id: chat_id.to_string(),
                    from: current.status,
                    to: status,
                });
            }

            let resolved_at = if status == ChatStatus::Resolved {
                Some(at)
            } else {
                current.resolved_at
            };
            tx.execute(
                "UPDATE chats SET status = ?1, resolved_at = ?2 WHERE id = ?3",
                params![status.as_str(), resolved_at.map(to_millis), chat_id],
            )?;
            tx.commit()?;

            Ok(Chat {
                status,
                resolved_at,
                ..current
            })
        })?;

        self.notify(StoreEvent::ChatStatusChanged {
            chat_id: chat_id.to_string(),
            status,
        });
        Ok(chat)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let deleted = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = find_chat(&tx, chat_id)? else {
                return Ok(false);
            };

            if !current.status.can_transition_to(ChatStatus::Deleted) {
                return Err(SupportError::InvalidTransition {
                    chat_id: chat_id.to_string(),
                    from: current.status,
                    to: ChatStatus::Deleted,
                });
            }

            let removed_messages = tx.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id])?;
            tx.execute("DELETE FROM chats WHERE id = ?1", [chat_id])?;
            tx.commit()?;

            debug!("Deleted chat {} with {} messages", chat_id, removed_messages);
            Ok(true)
        })?;

        if deleted {
            self.notify(StoreEvent::ChatDeleted {
                chat_id: chat_id.to_string(),
            });
        }
        Ok(deleted)
    }

    async fn add_message(&self, chat_id: &str, message: NewMessage) -> Result<Message> {
        let message = stamp_message(chat_id, message);

        self.with_conn(|conn| {
            if find_chat(conn, chat_id)?.is_none() {
                return Err(SupportError::ChatNotFound(chat_id.to_string()));
            }
            insert_message(conn, &message)
        })?;

        self.notify(StoreEvent::MessageAdded {
            chat_id: chat_id.to_string(),
            message_id: message.id.clone(),
        });
        Ok(message)
    }

    async fn resolve_chat(&self, chat_id: &str, closing: NewMessage, at: DateTime<Utc>) -> Result<(Chat, Message)> {
        let message = stamp_message(chat_id, closing);

        let chat = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let current =
                find_chat(&tx, chat_id)?.ok_or_else(|| SupportError::ChatNotFound(chat_id.to_string()))?;

            if !current.status.can_transition_to(ChatStatus::Resolved) {
                return Err(SupportError::InvalidTransition {
                    chat_id: chat_id.to_string(),
                    from: current.status,
                    to: ChatStatus::Resolved,
                });
            }

            insert_message(&tx, &message)?;
            tx.execute(
                "UPDATE chats SET status = ?1, resolved_at = ?2 WHERE id = ?3",
                params![ChatStatus::Resolved.as_str(), to_millis(at), chat_id],
            )?;
            tx.commit()?;

            Ok(Chat {
                status: ChatStatus::Resolved,
                resolved_at: Some(at),
                ..current
            })
        })?;

        // Closing message first, so listeners see it before the status change
        self.notify(StoreEvent::MessageAdded {
            chat_id: chat_id.to_string(),
            message_id: message.id.clone(),
        });
        self.notify(StoreEvent::ChatStatusChanged {
            chat_id: chat_id.to_string(),
            status: ChatStatus::Resolved,
        });
        Ok((chat, message))
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        self.with_conn(|conn| find_message(conn, message_id))
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY timestamp ASC, seq ASC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([chat_id], MessageRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }

    async fn count_messages_with_status(&self, chat_id: &str, status: MessageStatus) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE chat_id = ?1 AND status = ?2",
                params![chat_id, status.as_str()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    async fn latest_message(&self, chat_id: &str) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY timestamp DESC, seq DESC LIMIT 1",
                    MESSAGE_COLUMNS
                ),
                [chat_id],
                MessageRow::from_row,
            )
            .optional()?
            .map(MessageRow::into_message)
            .transpose()
        })
    }

    async fn update_message_status(
        &self,
        chat_id: &str,
        reader_id: &str,
        from: &[MessageStatus],
        status: MessageStatus,
    ) -> Result<Vec<String>> {
        let changed = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let candidates: Vec<(String, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, status FROM messages
                     WHERE chat_id = ?1 AND sender_id != ?2
                     ORDER BY timestamp ASC, seq ASC",
                )?;
                let rows = stmt
                    .query_map(params![chat_id, reader_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let mut changed = Vec::new();
            for (id, current) in candidates {
                if from.contains(&MessageStatus::parse(&current)?) {
                    tx.execute(
                        "UPDATE messages SET status = ?1 WHERE id = ?2",
                        params![status.as_str(), &id],
                    )?;
                    changed.push(id);
                }
            }
            tx.commit()?;
            Ok(changed)
        })?;

        if !changed.is_empty() {
            self.notify(StoreEvent::MessagesUpdated {
                chat_id: chat_id.to_string(),
                message_ids: changed.clone(),
                status,
            });
        }
        Ok(changed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

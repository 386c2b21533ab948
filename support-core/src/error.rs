use thiserror::Error;

use crate::models::ChatStatus;

pub type Result<T> = std::result::Result<T, SupportError>;

#[derive(Debug, Error)]
pub enum SupportError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("chat {chat_id} cannot move from {from} to {to}")]
    InvalidTransition {
        chat_id: String,
        from: ChatStatus,
        to: ChatStatus,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("lookup failed for chat {chat_id}: {source}")]
    Lookup {
        chat_id: String,
        #[source]
        source: Box<SupportError>,
    },

    #[error("invalid timestamp: {0}")]
    Time(i64),

    #[error("unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

impl<T> From<std::sync::PoisonError<T>> for SupportError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SupportError::LockPoisoned
    }
}

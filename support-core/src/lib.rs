//! HorizonNet live support chat.
//!
//! Chats are stored in SQLite behind the [`ChatStore`] trait. Admins watch a
//! live [`ActiveChatProjection`] of open chats with unread counts and the last
//! message, and close chats out through the [`ChatResolver`], which schedules
//! their deletion after a grace period.

pub mod config;
pub mod db;
pub mod desk;
pub mod error;
pub mod models;
pub mod navigation;
pub mod projection;
pub mod resolution;
pub mod scheduler;
pub mod store;
pub mod utils;

pub use config::SupportConfig;
pub use db::Database;
pub use desk::{RowOutcome, SupportDesk};
pub use error::{Result, SupportError};
pub use navigation::{ClickTarget, Route, RowEvent};
pub use projection::{load_active_chats, ActiveChatProjection, ProjectionState};
pub use resolution::{ChatResolver, ResolveReceipt};
pub use scheduler::DeletionScheduler;
pub use store::{ChatStore, StoreEvent};

//! HorizonNet support relay server library
//!
//! This module exposes the server components for use in integration tests.

mod config;
mod connection;
mod messages;
mod relay;
mod state;

pub use config::ServerConfig;
pub use connection::{handle_connection, handle_message, identity_from_connect, Session};
pub use messages::WsMessage;
pub use relay::{relay_event, spawn_event_relay};
pub use state::ServerState;

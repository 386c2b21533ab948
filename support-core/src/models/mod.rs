mod chat;
mod identity;
pub mod input;
mod message;

pub use chat::{Chat, ChatStatus, ChatViewModel};
pub use identity::{Identity, Role};
pub use message::{Message, MessageStatus, NewMessage};

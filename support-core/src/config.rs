use std::time::Duration;

/// Text of the system message appended when an admin resolves a chat
pub const DEFAULT_CLOSING_MESSAGE: &str =
    "This conversation has been marked as resolved by our support team. Thank you for contacting HorizonNet!";

/// Sender identity used for messages the desk writes on its own behalf
pub const SUPPORT_SENDER_ID: &str = "support";
pub const SUPPORT_SENDER_NAME: &str = "Support";

const DEFAULT_DELETION_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct SupportConfig {
    /// Grace period between resolving a chat and deleting it, so the closing
    /// message reaches the user first.
    pub deletion_delay: Duration,
    /// Upper bound on per-chat lookups in flight while building the admin list.
    pub lookup_concurrency: usize,
    pub closing_message: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            deletion_delay: DEFAULT_DELETION_DELAY,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            closing_message: DEFAULT_CLOSING_MESSAGE.to_string(),
        }
    }
}

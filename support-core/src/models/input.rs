//! Input DTOs with garde validation for desk operations.
//!
//! These structs validate client data before it reaches the store.

use garde::Validate;
use serde::Deserialize;

use crate::error::SupportError;
use crate::utils::validation::{has_control_chars, MAX_CHAT_ID_LENGTH, MAX_DISPLAY_NAME_LENGTH, MAX_MESSAGE_LENGTH};

fn validate_display_name(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Display name cannot be blank"));
    }
    if has_control_chars(value) {
        return Err(garde::Error::new("Display name contains invalid characters"));
    }
    Ok(())
}

fn validate_text(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("Message cannot be blank"))
    } else {
        Ok(())
    }
}

/// Input for opening a support session
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct OpenChatInput {
    #[garde(length(min = 1, max = MAX_DISPLAY_NAME_LENGTH), custom(validate_display_name))]
    pub display_name: String,
}

/// Input for sending a message
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct SendMessageInput {
    #[garde(length(min = 1, max = MAX_CHAT_ID_LENGTH))]
    pub chat_id: String,
    #[garde(length(min = 1, max = MAX_MESSAGE_LENGTH), custom(validate_text))]
    pub text: String,
}

/// Input naming a single chat
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct ChatIdInput {
    #[garde(length(min = 1, max = MAX_CHAT_ID_LENGTH))]
    pub chat_id: String,
}

impl ChatIdInput {
    pub fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
        }
    }
}

/// Helper trait to convert garde validation errors into `SupportError`
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), SupportError>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), SupportError> {
        self.validate().map_err(|e| SupportError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_chat_rejects_blank_name() {
        let input = OpenChatInput {
            display_name: "   ".to_string(),
        };
        assert!(matches!(input.validate_input(), Err(SupportError::Validation(_))));
    }

    #[test]
    fn test_open_chat_rejects_control_chars() {
        let input = OpenChatInput {
            display_name: "Ali\u{0007}ce".to_string(),
        };
        assert!(input.validate_input().is_err());
    }

    #[test]
    fn test_send_message_limits() {
        let ok = SendMessageInput {
            chat_id: "c1".to_string(),
            text: "Where is my order?".to_string(),
        };
        assert!(ok.validate_input().is_ok());

        let too_long = SendMessageInput {
            chat_id: "c1".to_string(),
            text: "x".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(too_long.validate_input().is_err());

        let no_chat = SendMessageInput {
            chat_id: String::new(),
            text: "hi".to_string(),
        };
        assert!(no_chat.validate_input().is_err());
    }
}

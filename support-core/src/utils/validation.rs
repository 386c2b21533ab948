//! Input validation constants and utilities
//!
//! Most validation is handled by garde in models/input.rs. These helpers back
//! its custom validators and the checks on identities coming from connections.

use crate::error::SupportError;

/// Maximum lengths for various fields
pub const MAX_USER_ID_LENGTH: usize = 128;
pub const MAX_CHAT_ID_LENGTH: usize = 256;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 10000;

pub fn has_control_chars(value: &str) -> bool {
    value.chars().any(|c| c.is_control())
}

/// Validate a user id presented by a client
pub fn validate_user_id(user_id: &str) -> Result<(), SupportError> {
    if user_id.trim().is_empty() {
        return Err(SupportError::Validation("User id cannot be empty".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LENGTH {
        return Err(SupportError::Validation(format!(
            "User id too long (max {} characters)",
            MAX_USER_ID_LENGTH
        )));
    }
    if has_control_chars(user_id) {
        return Err(SupportError::Validation(
            "User id contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a display name, trimming surrounding whitespace
pub fn normalize_display_name(name: &str) -> Result<String, SupportError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SupportError::Validation("Name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(SupportError::Validation(format!(
            "Name too long (max {} characters)",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    if has_control_chars(trimmed) {
        return Err(SupportError::Validation(
            "Name contains invalid characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_ids() {
        assert!(validate_user_id("user-1").is_ok());
        assert!(validate_user_id("a3f1c9e2-5b7d-4e8a-9c0f-1d2e3f4a5b6c").is_ok());
    }

    #[test]
    fn test_user_id_empty_or_blank() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("   ").is_err());
    }

    #[test]
    fn test_user_id_too_long() {
        assert!(validate_user_id(&"u".repeat(MAX_USER_ID_LENGTH)).is_ok());
        assert!(validate_user_id(&"u".repeat(MAX_USER_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_user_id_control_chars() {
        assert!(validate_user_id("user\n1").is_err());
        assert!(validate_user_id("user\u{0000}").is_err());
    }

    #[test]
    fn test_display_name_is_trimmed() {
        assert_eq!(normalize_display_name("  Alice  ").unwrap(), "Alice");
    }

    #[test]
    fn test_display_name_rejects_bad_input() {
        assert!(normalize_display_name("").is_err());
        assert!(normalize_display_name("Bob\tSmith").is_err());
        assert!(normalize_display_name(&"n".repeat(MAX_DISPLAY_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_display_name_counts_chars_not_bytes() {
        // 100 two-byte characters are within the limit
        let name = "é".repeat(MAX_DISPLAY_NAME_LENGTH);
        assert!(normalize_display_name(&name).is_ok());
    }
}

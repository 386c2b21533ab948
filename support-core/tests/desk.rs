//! Tests for user-facing support session operations.

use std::sync::Arc;

use horizon_support::models::input::{OpenChatInput, SendMessageInput};
use horizon_support::models::{ChatStatus, Identity, MessageStatus};
use horizon_support::{load_active_chats, ChatStore, Database, SupportConfig, SupportDesk, SupportError};

fn admin() -> Identity {
    Identity::admin("admin1", "Agent Smith")
}

fn alice() -> Identity {
    Identity::user("user1", "Alice")
}

fn bob() -> Identity {
    Identity::user("user2", "Bob")
}

fn desk() -> (Arc<Database>, SupportDesk) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let desk = SupportDesk::new(db.clone(), SupportConfig::default());
    (db, desk)
}

fn open(name: &str) -> OpenChatInput {
    OpenChatInput {
        display_name: name.to_string(),
    }
}

fn say(chat_id: &str, text: &str) -> SendMessageInput {
    SendMessageInput {
        chat_id: chat_id.to_string(),
        text: text.to_string(),
    }
}

async fn unread_count(db: &Database) -> u64 {
    load_active_chats(db, 4).await.unwrap()[0].unread_count
}

#[tokio::test]
async fn test_open_chat_starts_active() {
    let (_db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("  Alice  ")).await.unwrap();

    assert_eq!(chat.user_id, "user1");
    assert_eq!(chat.display_name, "Alice");
    assert_eq!(chat.status, ChatStatus::Active);
    assert!(chat.resolved_at.is_none());
}

#[tokio::test]
async fn test_open_chat_validates_input() {
    let (_db, desk) = desk();
    let err = desk.open_chat(&alice(), open("")).await.unwrap_err();
    assert!(matches!(err, SupportError::Validation(_)));
}

#[tokio::test]
async fn test_sender_comes_from_identity() {
    let (_db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("Alice")).await.unwrap();

    let message = desk.post_message(&alice(), say(&chat.id, "Hello")).await.unwrap();
    assert_eq!(message.sender_id, "user1");
    assert_eq!(message.sender_name, "Alice");
    assert_eq!(message.status, MessageStatus::Sent);
    assert!(!message.is_system);

    let reply = desk.post_message(&admin(), say(&chat.id, "Hi Alice")).await.unwrap();
    assert_eq!(reply.sender_id, "admin1");
    assert_eq!(reply.sender_name, "Agent Smith");
}

#[tokio::test]
async fn test_users_only_reach_their_own_chats() {
    let (_db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("Alice")).await.unwrap();

    let err = desk.post_message(&bob(), say(&chat.id, "sneaky")).await.unwrap_err();
    assert!(matches!(err, SupportError::Forbidden(_)));

    let err = desk.messages(&bob(), &chat.id).await.unwrap_err();
    assert!(matches!(err, SupportError::Forbidden(_)));

    let err = desk.mark_read(&bob(), &chat.id).await.unwrap_err();
    assert!(matches!(err, SupportError::Forbidden(_)));

    assert!(desk.messages(&admin(), &chat.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_chat() {
    let (_db, desk) = desk();
    let err = desk.post_message(&alice(), say("nope", "hi")).await.unwrap_err();
    assert!(matches!(err, SupportError::ChatNotFound(_)));
}

#[tokio::test]
async fn test_resolved_chat_rejects_messages() {
    let (db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("Alice")).await.unwrap();
    db.update_chat_status(&chat.id, ChatStatus::Resolved, chrono::Utc::now())
        .await
        .unwrap();

    let err = desk.post_message(&alice(), say(&chat.id, "one more thing")).await.unwrap_err();
    assert!(matches!(err, SupportError::Validation(_)));
}

#[tokio::test]
async fn test_read_and_delivery_receipts_drive_unread_count() {
    let (db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("Alice")).await.unwrap();
    let first = desk.post_message(&alice(), say(&chat.id, "first")).await.unwrap();
    let second = desk.post_message(&alice(), say(&chat.id, "second")).await.unwrap();
    desk.post_message(&admin(), say(&chat.id, "on it")).await.unwrap();

    // Alice's two messages plus the admin reply are all still "sent"
    assert_eq!(unread_count(&db).await, 3);

    // Alice reading only touches the admin's reply
    let read_by_alice = desk.mark_read(&alice(), &chat.id).await.unwrap();
    assert_eq!(read_by_alice.len(), 1);
    assert_eq!(unread_count(&db).await, 2);

    // Delivered is no longer unread
    let delivered = desk.mark_delivered(&admin(), &chat.id).await.unwrap();
    assert_eq!(delivered, vec![first.id.clone(), second.id.clone()]);
    assert_eq!(unread_count(&db).await, 0);

    // Delivered messages still become read
    let read_by_admin = desk.mark_read(&admin(), &chat.id).await.unwrap();
    assert_eq!(read_by_admin, vec![first.id, second.id]);
    assert!(desk.mark_read(&admin(), &chat.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_messages_in_timestamp_order() {
    let (_db, desk) = desk();
    let chat = desk.open_chat(&alice(), open("Alice")).await.unwrap();
    for text in ["one", "two", "three"] {
        desk.post_message(&alice(), say(&chat.id, text)).await.unwrap();
    }

    let texts: Vec<_> = desk
        .messages(&alice(), &chat.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::ChatStore;
use crate::utils::time;

struct PendingDeletion {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Delayed chat deletions, at most one per chat id.
///
/// Scheduling a chat that already has a pending deletion replaces it.
#[derive(Clone)]
pub struct DeletionScheduler {
    store: Arc<dyn ChatStore>,
    pending: Arc<DashMap<String, PendingDeletion>>,
    next_ticket: Arc<AtomicU64>,
}

impl DeletionScheduler {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            pending: Arc::new(DashMap::new()),
            next_ticket: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Deletes `chat_id` once `delay` has elapsed. Returns when the deletion is due.
    pub fn schedule(&self, chat_id: &str, delay: Duration) -> DateTime<Utc> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let due = time::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        // Hold the map slot while spawning so the task's own cleanup cannot
        // run before its entry exists
        let slot = self.pending.entry(chat_id.to_string());

        let store = self.store.clone();
        let pending = self.pending.clone();
        let id = chat_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match store.delete_chat(&id).await {
                Ok(true) => info!("Deleted resolved chat {}", id),
                Ok(false) => debug!("Chat {} was already gone at deletion time", id),
                Err(e) => warn!("Scheduled deletion of chat {} failed: {}", id, e),
            }

            pending.remove_if(&id, |_, entry| entry.ticket == ticket);
        });

        let entry = PendingDeletion { ticket, handle };
        match slot {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(entry);
                previous.handle.abort();
                debug!("Replaced pending deletion of chat {}", chat_id);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        due
    }

    /// Aborts the pending deletion of `chat_id`. Returns whether one was pending.
    pub fn cancel(&self, chat_id: &str) -> bool {
        match self.pending.remove(chat_id) {
            Some((_, entry)) => {
                let was_pending = !entry.handle.is_finished();
                entry.handle.abort();
                if was_pending {
                    info!("Cancelled pending deletion of chat {}", chat_id);
                }
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self, chat_id: &str) -> bool {
        self.pending
            .get(chat_id)
            .map(|entry| !entry.handle.is_finished())
            .unwrap_or(false)
    }

    /// Chat ids with a deletion still outstanding
    pub fn pending(&self) -> Vec<String> {
        self.pending
            .iter()
            .filter(|entry| !entry.value().handle.is_finished())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn shutdown(&self) {
        let count = self.pending.len();
        self.pending.retain(|_, entry| {
            entry.handle.abort();
            false
        });
        if count > 0 {
            info!("Aborted {} pending chat deletions", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ChatStatus;

    async fn resolved_chat(db: &Database) -> String {
        let chat = db.create_chat("u1", "Alice", time::now()).await.unwrap();
        db.update_chat_status(&chat.id, ChatStatus::Resolved, time::now())
            .await
            .unwrap();
        chat.id
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_after_delay() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let chat_id = resolved_chat(&db).await;

        scheduler.schedule(&chat_id, Duration::from_secs(5));
        assert!(scheduler.is_pending(&chat_id));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(db.get_chat(&chat_id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(db.get_chat(&chat_id).await.unwrap().is_none());
        assert!(!scheduler.is_pending(&chat_id));
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_chat() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let chat_id = resolved_chat(&db).await;

        scheduler.schedule(&chat_id, Duration::from_secs(5));
        assert!(scheduler.cancel(&chat_id));
        assert!(!scheduler.cancel(&chat_id));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let chat = db.get_chat(&chat_id).await.unwrap().unwrap();
        assert_eq!(chat.status, ChatStatus::Resolved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_keeps_single_entry() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let chat_id = resolved_chat(&db).await;

        scheduler.schedule(&chat_id, Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(3)).await;
        scheduler.schedule(&chat_id, Duration::from_secs(5));
        assert_eq!(scheduler.pending(), vec![chat_id.clone()]);

        // The first deadline passes without deleting
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(db.get_chat(&chat_id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(db.get_chat(&chat_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_everything() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let first = resolved_chat(&db).await;
        let second = resolved_chat(&db).await;

        scheduler.schedule(&first, Duration::from_secs(5));
        scheduler.schedule(&second, Duration::from_secs(5));
        scheduler.shutdown();
        assert!(scheduler.pending().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(db.get_chat(&first).await.unwrap().is_some());
        assert!(db.get_chat(&second).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_immediate_deletions_leave_no_entries() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(resolved_chat(&db).await);
        }

        for id in &ids {
            scheduler.schedule(id, Duration::ZERO);
        }

        for _ in 0..200 {
            if scheduler.pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.pending.is_empty(), "{} entries left behind", scheduler.pending.len());
        for id in &ids {
            assert!(db.get_chat(id).await.unwrap().is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleting_active_chat_is_refused() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = DeletionScheduler::new(db.clone());
        let chat = db.create_chat("u1", "Alice", time::now()).await.unwrap();

        scheduler.schedule(&chat.id, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The store rejects active -> deleted, the task only logs it
        assert!(db.get_chat(&chat.id).await.unwrap().is_some());
    }
}

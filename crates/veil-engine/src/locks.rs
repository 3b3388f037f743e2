//! Per-chat mutual exclusion.
//!
//! Every mutation of a chat record (reveal transitions, counter bumps,
//! sequence assignment) runs while holding that chat's lock, so exactly
//! one in-flight mutation per chat exists at a time. Two different chats
//! never contend with each other.
//!
//! Entries are created on demand and evicted by a periodic purge once
//! nothing outside the table holds them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use veil_shared::types::ChatId;

#[derive(Clone, Default)]
pub struct ChatLocks {
    inner: Arc<Mutex<HashMap<ChatId, Arc<Mutex<()>>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for one chat, waiting behind any in-flight mutation
    /// of the same chat. The guard is owned, so it can be held across
    /// await points for the duration of the critical section.
    pub async fn acquire(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries no longer held or awaited by anyone. Returns how many
    /// were evicted.
    pub async fn purge_stale(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        // strong_count == 1 means the table holds the only reference: no
        // guard is out and no acquire() has cloned it yet.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_chat_serializes() {
        let locks = ChatLocks::new();
        let chat_id = ChatId::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(chat_id).await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_chats_do_not_block() {
        let locks = ChatLocks::new();
        let guard_a = locks.acquire(ChatId::new()).await;

        // A second chat's lock must be available immediately.
        let other = ChatId::new();
        let acquired =
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.acquire(other))
                .await;
        assert!(acquired.is_ok());
        drop(guard_a);
    }

    #[tokio::test]
    async fn purge_drops_only_idle_entries() {
        let locks = ChatLocks::new();
        let held = ChatId::new();
        let idle = ChatId::new();

        let guard = locks.acquire(held).await;
        drop(locks.acquire(idle).await);

        let evicted = locks.purge_stale().await;
        assert_eq!(evicted, 1);

        // The held entry survives and still serializes.
        drop(guard);
        assert_eq!(locks.purge_stale().await, 1);
    }
}

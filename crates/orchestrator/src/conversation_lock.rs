//! Per-conversation concurrency control.
//!
//! Ensures only one turn runs per `conversationId` at a time. A turn
//! arriving while one is already in flight for the same conversation
//! queues behind it on an unbounded `Semaphore(1)`; there is no queue
//! depth limit and no "busy" rejection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Maps a conversation key to a `Semaphore(1)`. Holding the permit for the
/// duration of a turn guarantees exclusive access; it releases on drop.
pub struct ConversationLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ConversationLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the run lock for `conversation_key`, waiting if another
    /// turn for the same conversation is already in flight.
    pub async fn acquire(&self, conversation_key: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(conversation_key.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        sem.acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    /// Number of tracked conversations (for monitoring).
    pub fn conversation_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Remove locks for conversations with no in-flight turn.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = ConversationLockMap::new();
        let permit1 = map.acquire("c1").await;
        drop(permit1);
        let permit2 = map.acquire("c1").await;
        drop(permit2);
    }

    #[tokio::test]
    async fn different_conversations_concurrent() {
        let map = Arc::new(ConversationLockMap::new());
        let p1 = map.acquire("c1").await;
        let p2 = map.acquire("c2").await;
        assert_eq!(map.conversation_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_conversation_waits() {
        let map = Arc::new(ConversationLockMap::new());
        let map2 = map.clone();
        let p1 = map.acquire("c1").await;

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("c1").await;
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);

        let result = handle.await.unwrap();
        assert_eq!(result, 42);
    }
}

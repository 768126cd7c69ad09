//! In-memory, per-thread conversation state.
//!
//! Threads are created on first use and live for the rest of the process.
//! Each thread sits behind its own async mutex: a turn holds the lock from
//! start to finish, so two turns on the same thread never interleave their
//! writes while turns on different threads run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::conversation::Conversation;

pub type ThreadHandle = Arc<AsyncMutex<Conversation>>;

/// Exclusive access to one thread for the duration of a turn.
pub type ThreadGuard = OwnedMutexGuard<Conversation>;

#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, ThreadHandle>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The thread's state, created empty on first use.
    pub fn get_or_create(&self, thread_id: &str) -> ThreadHandle {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                debug!(thread_id, "new thread");
                Arc::new(AsyncMutex::new(Conversation::new()))
            })
            .clone()
    }

    pub fn get(&self, thread_id: &str) -> Option<ThreadHandle> {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    /// Lock the state a turn runs against. Without a thread id the turn
    /// gets a throwaway conversation that is never stored.
    pub async fn checkout(&self, thread_id: Option<&str>) -> ThreadGuard {
        let handle = match thread_id {
            Some(id) => self.get_or_create(id),
            None => Arc::new(AsyncMutex::new(Conversation::new())),
        };
        handle.lock_owned().await
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

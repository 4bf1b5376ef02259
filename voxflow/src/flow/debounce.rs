//! Per-key debouncing of rapid repeated triggers.
//!
//! Typing indicators and presence pings fire on every keystroke; only the
//! last trigger in a quiet window should reach the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

/// A scheduled action waiting out its quiet window.
struct PendingAction {
    /// Stamp identifying the owner of this slot; a task only removes the
    /// entry if the stamp still matches its own.
    generation: u64,
    handle: JoinHandle<()>,
}

struct DebounceInner {
    pending: Mutex<HashMap<String, PendingAction>>,
    next_generation: AtomicU64,
}

/// Coalesces rapid repeated triggers per key into one delayed execution.
///
/// Scheduling a key that already has a pending action cancels and replaces
/// it, so exactly the most recently supplied action and delay win. Must be
/// used within a Tokio runtime.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<DebounceInner>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    /// Creates a new debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DebounceInner {
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Schedules `action` to run after `delay`, replacing any action already
    /// pending for `key`.
    ///
    /// Non-blocking; the action runs on a background task. A completed or
    /// cancelled task removes only the slot it still owns, so rapid
    /// re-debouncing never loses a newer entry.
    pub fn debounce<F>(&self, key: &str, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.inner.pending.lock();
        if let Some(previous) = pending.remove(key) {
            previous.handle.abort();
            trace!(key, "replaced pending debounce");
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Re-check ownership right before running; a newer debounce may
            // have taken the slot while this task slept.
            let owned = {
                let mut pending = inner.pending.lock();
                match pending.get(&task_key) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };

            if owned {
                action();
            }
        });

        pending.insert(key.to_string(), PendingAction { generation, handle });
    }

    /// Cancels the pending action for `key`, if any. Idempotent.
    pub fn cancel(&self, key: &str) {
        if let Some(entry) = self.inner.pending.lock().remove(key) {
            entry.handle.abort();
        }
    }

    /// Cancels every pending action; used at shutdown or logout.
    pub fn cancel_all(&self) {
        let mut pending = self.inner.pending.lock();
        for (_, entry) in pending.drain() {
            entry.handle.abort();
        }
    }

    /// Number of keys with a pending action.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

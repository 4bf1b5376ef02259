//! Size- and time-bounded batching of outbound items.
//!
//! Items accumulate until the batch fills or the delay elapses, whichever
//! comes first; the processing callback then receives a stable snapshot
//! while new items keep accumulating.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, trace};

/// Configuration for batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Flush as soon as the batch holds this many items.
    pub max_size: usize,
    /// Flush this long after the first item of a batch, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_delay_ms: 1000,
        }
    }
}

impl BatchConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the size threshold.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the delay threshold in milliseconds.
    #[must_use]
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// The delay threshold as a [`Duration`].
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

struct BatchState<T> {
    items: Vec<T>,
    /// Bumped on every flush; an expired timer whose epoch no longer
    /// matches has been superseded and must not flush.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
}

struct BatcherInner<T> {
    config: BatchConfig,
    processor: Box<dyn Fn(Vec<T>) + Send + Sync>,
    state: Mutex<BatchState<T>>,
}

impl<T: Send + 'static> BatcherInner<T> {
    /// Swaps the current batch out under the lock; callers process the
    /// returned items after releasing it.
    fn take_batch(state: &mut BatchState<T>) -> Option<Vec<T>> {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.epoch += 1;
        state.started_at = None;
        if state.items.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut state.items))
        }
    }

    /// Invokes the processing callback, containing any panic so one bad
    /// batch cannot stop future batches.
    fn process(&self, items: Vec<T>) {
        let count = items.len();
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.processor)(items);
        })) {
            error!(batch_size = count, "batch processor panicked: {:?}", e);
        } else {
            trace!(batch_size = count, "batch processed");
        }
    }

    fn arm_timer(inner: &Arc<Self>, state: &mut BatchState<T>) {
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }

        let epoch = state.epoch;
        let inner = Arc::clone(inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.config.max_delay()).await;

            let batch = {
                let mut state = inner.state.lock();
                if state.epoch == epoch {
                    Self::take_batch(&mut state)
                } else {
                    None
                }
            };

            if let Some(items) = batch {
                inner.process(items);
            }
        }));
    }
}

/// Accumulates items and delivers them in batches.
///
/// Must be used within a Tokio runtime; the flush timer runs on a
/// background task.
pub struct Batcher<T> {
    inner: Arc<BatcherInner<T>>,
}

impl<T> Clone for Batcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Batcher<T> {
    /// Creates a batcher delivering to `processor`.
    #[must_use]
    pub fn new<F>(config: BatchConfig, processor: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(BatcherInner {
                config,
                processor: Box::new(processor),
                state: Mutex::new(BatchState {
                    items: Vec::new(),
                    epoch: 0,
                    timer: None,
                    started_at: None,
                }),
            }),
        }
    }

    /// Appends one item, flushing if the batch is now full.
    ///
    /// The first item of a fresh batch starts the flush countdown.
    pub fn add(&self, item: T) {
        let batch = {
            let mut state = self.inner.state.lock();
            if state.items.is_empty() {
                state.started_at = Some(Instant::now());
                BatcherInner::arm_timer(&self.inner, &mut state);
            }
            state.items.push(item);
            if state.items.len() >= self.inner.config.max_size {
                BatcherInner::take_batch(&mut state)
            } else {
                None
            }
        };

        if let Some(items) = batch {
            self.inner.process(items);
        }
    }

    /// Appends several items, flushing once if the threshold is crossed.
    pub fn add_range<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let batch = {
            let mut state = self.inner.state.lock();
            let was_empty = state.items.is_empty();
            state.items.extend(items);
            if state.items.is_empty() {
                return;
            }
            if was_empty {
                state.started_at = Some(Instant::now());
                BatcherInner::arm_timer(&self.inner, &mut state);
            }
            if state.items.len() >= self.inner.config.max_size {
                BatcherInner::take_batch(&mut state)
            } else {
                None
            }
        };

        if let Some(items) = batch {
            self.inner.process(items);
        }
    }

    /// Flushes the current batch immediately, if non-empty.
    pub fn flush_now(&self) {
        let batch = {
            let mut state = self.inner.state.lock();
            BatcherInner::take_batch(&mut state)
        };

        if let Some(items) = batch {
            self.inner.process(items);
        }
    }

    /// Number of items waiting in the current batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    /// Whether the current batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Age of the current batch, if one has started.
    #[must_use]
    pub fn batch_age(&self) -> Option<Duration> {
        self.inner.state.lock().started_at.map(|t| t.elapsed())
    }
}

impl<T> std::fmt::Debug for Batcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("config", &self.inner.config)
            .finish()
    }
}

//! Mock time source for deterministic rate-window tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arvi_core::{TimeSource, Timestamp};

/// Time source whose clock only moves when told to
///
/// Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct MockTimeSource {
    current_time: Arc<AtomicU64>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `start_time` milliseconds
    pub fn new_at(start_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time)),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::SeqCst);
    }

    pub fn current_time(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current_time())
    }
}

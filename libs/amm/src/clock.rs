//! Block-time source
//!
//! Supplies the "current block timestamp" (unix seconds) used for deadline
//! checks and `block_timestamp_last`. Production uses the system clock;
//! tests and simulations drive a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current timestamp in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Externally driven clock
#[derive(Debug, Default)]
pub struct ManualClock {
    current_time: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            current_time: AtomicU64::new(start),
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.current_time.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.current_time.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

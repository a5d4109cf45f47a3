//! Network time.
//!
//! The pool checks stake timestamps against a clock; blocks carry their own
//! timestamp and never consult one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current network time, in seconds since the network epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time relative to a network epoch.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: i64,
}

impl SystemClock {
    /// `epoch` is the unix time, in seconds, of network time zero.
    pub fn new(epoch: i64) -> Self {
        Self { epoch }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        unix - self.epoch
    }
}

/// A clock that only moves when told to. For tests and replay tools.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

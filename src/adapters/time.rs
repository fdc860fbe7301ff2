//! System clock adapter.
//!
//! Monotonic time comes from `std::time::Instant`; wall-clock stamps for
//! telemetry come from `chrono::Utc`.

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::app::ports::Clock;

/// Real-time clock for the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

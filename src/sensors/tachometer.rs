//! Fan tachometer → RPM.
//!
//! The fan's sense line pulses a fixed number of times per revolution
//! (two for standard PC fans). The actuator delivers each edge to a
//! callback on its own thread, which increments an atomic counter; once
//! per sampling window the control loop swaps the counter to zero and
//! converts the count to RPM.
//!
//! The swap is a single atomic read-and-reset, so an edge landing on the
//! window boundary is counted in exactly one window.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::app::ports::EdgeHandler;

/// Edge counter shared between the edge callback and the control loop.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU32,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the edge callback context.
    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read the count and reset it to zero.
    pub fn take(&self) -> u32 {
        self.count.swap(0, Ordering::Relaxed)
    }

    /// Current count without resetting.
    pub fn peek(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Converts windowed pulse counts to RPM.
#[derive(Debug, Clone)]
pub struct RpmEstimator {
    counter: Arc<PulseCounter>,
    pulses_per_revolution: f32,
}

impl RpmEstimator {
    pub fn new(pulses_per_revolution: u32) -> Self {
        Self {
            counter: Arc::new(PulseCounter::new()),
            pulses_per_revolution: pulses_per_revolution as f32,
        }
    }

    /// Handler to register with the actuator's edge callback.
    pub fn edge_handler(&self) -> EdgeHandler {
        let counter = Arc::clone(&self.counter);
        Box::new(move || counter.record())
    }

    /// Shared counter, for adapters that count edges themselves.
    pub fn counter(&self) -> Arc<PulseCounter> {
        Arc::clone(&self.counter)
    }

    /// Read-and-reset the counter and convert to RPM.
    ///
    /// `window_secs` is the length of the window the pulses were collected
    /// over (1.0 at the nominal cadence).
    pub fn sample(&self, window_secs: f32) -> f32 {
        let pulses = self.counter.take();
        let rpm = if window_secs > 0.0 {
            (pulses as f32 / self.pulses_per_revolution) * (60.0 / window_secs)
        } else {
            0.0
        };
        debug!("Tach: {} pulses in {:.3}s -> {:.0} RPM", pulses, window_secs, rpm);
        rpm
    }
}

//! Outbound application records and events.
//!
//! The [`ControlLoop`](super::service::ControlLoop) hands a
//! [`TelemetryRecord`] to the [`TelemetrySink`](super::ports::TelemetrySink)
//! and emits [`AppEvent`]s through the [`EventSink`](super::ports::EventSink).

use core::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::control::mapper::Regime;

/// One tick's measurements, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    /// Raw (unsmoothed) temperature, °C.
    pub temperature: f32,
    pub rpm: f32,
    pub duty_cycle: u32,
}

/// Human-readable per-tick summary.
///
/// `Display` renders the monitoring line:
/// `<timestamp> - Temp: 57C, Smoothed Temp: 55C, Target RPM: 3250, Current RPM: 3180, Duty Cycle: 142`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub timestamp: DateTime<Utc>,
    pub temperature: f32,
    pub smoothed_temperature: f32,
    pub regime: Regime,
    pub current_rpm: f32,
    pub duty_cycle: u32,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - Temp: {}C, Smoothed Temp: {}C, Target RPM: ",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.temperature as i32,
            self.smoothed_temperature as i32,
        )?;
        match self.regime.target_rpm() {
            Some(rpm) => write!(f, "{}", rpm as i32)?,
            None => write!(f, "OFF")?,
        }
        write!(
            f,
            ", Current RPM: {}, Duty Cycle: {}",
            self.current_rpm as i32, self.duty_cycle
        )
    }
}

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The loop is about to run its first tick.
    Started { initial_duty_cycle: u32 },

    /// Per-tick status.
    Status(StatusLine),

    /// Raw temperature reached the critical threshold; duty forced to max.
    CriticalTemperature { temperature: f32, threshold: f32 },

    /// A telemetry write failed this tick (not retried).
    TelemetryDropped(String),

    /// Cleanup has finished; the fan is off and all handles are released.
    Stopped,
}

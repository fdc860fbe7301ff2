//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (temperature sensor, PWM actuator, telemetry database,
//! event log, clock, config store) implement these traits. The
//! [`ControlLoop`](super::service::ControlLoop) consumes them via generics,
//! so the control core never touches hardware directly.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::FanConfig;
use crate::error::{ActuatorError, TelemetryError};

use super::events::{AppEvent, TelemetryRecord};

// ───────────────────────────────────────────────────────────────
// Temperature port (driven adapter: sensor → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the CPU temperature.
pub trait TemperaturePort {
    /// Current temperature in °C.
    ///
    /// Fails soft: when the sensor is unavailable the implementation logs
    /// the failure and returns its configured fallback value.
    fn read(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → PWM hardware)
// ───────────────────────────────────────────────────────────────

/// Which signal transition an edge callback fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Either,
}

/// Handler invoked from the actuator's own execution context on every edge.
pub type EdgeHandler = Box<dyn FnMut() + Send + 'static>;

/// Registration returned by [`ActuatorPort::register_edge_callback`].
pub trait CallbackHandle {
    /// Stop delivering edges. Idempotent.
    fn cancel(&mut self);
}

/// Write-side port: PWM output plus edge notifications from the tach pin.
pub trait ActuatorPort {
    type Callback: CallbackHandle;

    fn set_pwm_frequency(&mut self, pin: u32, hz: u32) -> Result<(), ActuatorError>;

    /// `duty` is in the actuator's PWM range (0..=max_duty_cycle).
    fn set_duty_cycle(&mut self, pin: u32, duty: u32) -> Result<(), ActuatorError>;

    fn register_edge_callback(
        &mut self,
        pin: u32,
        edge: Edge,
        handler: EdgeHandler,
    ) -> Result<Self::Callback, ActuatorError>;

    /// Release the actuator handle. Further commands fail with
    /// [`ActuatorError::Stopped`].
    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: domain → time-series store)
// ───────────────────────────────────────────────────────────────

/// Receives one [`TelemetryRecord`] per tick.
///
/// Failures are reported to the caller but must never be fatal: the
/// control loop logs them and carries on with the next tick.
pub trait TelemetrySink {
    fn write(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError>;

    /// Push out anything buffered and release the connection.
    fn flush_and_close(&mut self) -> Result<(), TelemetryError>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn write(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        (**self).write(record)
    }

    fn flush_and_close(&mut self) -> Result<(), TelemetryError> {
        (**self).flush_and_close()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The control loop emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (console log, journal, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for the loop cadence, PID delta-time and telemetry stamps.
pub trait Clock {
    /// Monotonic instant, used for every duration computation.
    fn monotonic(&self) -> Instant;

    /// Wall-clock time, used only to stamp telemetry and status lines.
    fn wall(&self) -> DateTime<Utc>;

    /// Block for one sampling window.
    fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads the configuration once at startup.
///
/// Implementations MUST call [`FanConfig::validate`] before returning;
/// invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<FanConfig, ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at the given location.
    NotFound,
    /// The file exists but is not a valid config document.
    Corrupted(String),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the file.
    IoError(std::io::ErrorKind),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(kind) => write!(f, "I/O error ({})", kind),
        }
    }
}

impl std::error::Error for ConfigError {}

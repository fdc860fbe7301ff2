//! Unified error types for the fan controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform. Subsystem errors are small `Copy`
//! enums so they can be logged and passed around without allocation.

use core::fmt;
use std::io;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The temperature sensor could not be read.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// The telemetry sink rejected a write.
    Telemetry(TelemetryError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor file could not be opened or read.
    Unavailable(io::ErrorKind),
    /// The sensor produced something that is not a number.
    Malformed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(kind) => write!(f, "sensor unavailable ({kind})"),
            Self::Malformed => write!(f, "malformed reading"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Could not reach the GPIO daemon.
    ConnectFailed,
    /// The command socket failed mid-conversation.
    Io(io::ErrorKind),
    /// The daemon answered a command with a negative status code.
    Rejected { cmd: u32, code: i32 },
    /// The actuator was already released.
    Stopped,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
            Self::Rejected { cmd, code } => write!(f, "command {cmd} rejected ({code})"),
            Self::Stopped => write!(f, "actuator stopped"),
        }
    }
}

impl From<io::Error> for ActuatorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The request never got an HTTP answer (DNS, connect, timeout).
    Transport,
    /// The server answered with a non-success status.
    Http(u16),
    /// The sink was already closed.
    Closed,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport failure"),
            Self::Http(status) => write!(f, "HTTP status {status}"),
            Self::Closed => write!(f, "sink closed"),
        }
    }
}

impl std::error::Error for TelemetryError {}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;

//! Application core: pure control logic, zero direct I/O.
//!
//! This module contains the control rules for the fan: tick
//! orchestration, telemetry records, and the port traits in [`ports`]
//! through which every external collaborator is reached, keeping this
//! layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;

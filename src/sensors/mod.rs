//! Sensor subsystem: CPU temperature and fan tachometer.
//!
//! Neither sensor carries history beyond what its contract needs; the
//! smoothed temperature lives in [`TemperatureFilter`](temperature::TemperatureFilter),
//! owned by the control loop.

pub mod tachometer;
pub mod temperature;

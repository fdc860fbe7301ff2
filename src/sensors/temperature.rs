//! CPU temperature sensor (Linux thermal zone) and exponential smoothing.
//!
//! The kernel exposes the SoC temperature in millidegrees Celsius as a
//! single integer line, e.g. `/sys/class/thermal/thermal_zone0/temp`.
//! Reads fail soft: a missing or garbled file yields the configured
//! fallback so the control loop never aborts on a sensor hiccup.

use std::fs;
use std::path::PathBuf;

use log::{debug, error, info};

use crate::app::ports::TemperaturePort;
use crate::config::TemperatureSection;
use crate::error::SensorError;

/// Exponentially-weighted moving average step.
///
/// `alpha` is the weight of the newest sample, `0 < alpha <= 1`.
pub fn smooth(current: f32, previous: f32, alpha: f32) -> f32 {
    alpha * current + (1.0 - alpha) * previous
}

/// sysfs-backed temperature source.
pub struct TemperatureSource {
    path: PathBuf,
    fallback_c: f32,
    /// Latched so the failure is logged once per outage, not every tick.
    failing: bool,
}

impl TemperatureSource {
    pub fn new(section: &TemperatureSection) -> Self {
        Self {
            path: PathBuf::from(&section.sensor_path),
            fallback_c: section.fallback_temp_c,
            failing: false,
        }
    }

    /// Strict read: integer millidegrees from the sensor file, converted to °C.
    pub fn try_read(&self) -> Result<f32, SensorError> {
        let text =
            fs::read_to_string(&self.path).map_err(|e| SensorError::Unavailable(e.kind()))?;
        let milli: i64 = text.trim().parse().map_err(|_| SensorError::Malformed)?;
        Ok(milli as f32 / 1000.0)
    }
}

impl TemperaturePort for TemperatureSource {
    fn read(&mut self) -> f32 {
        match self.try_read() {
            Ok(celsius) => {
                if self.failing {
                    info!("Temperature sensor recovered ({})", self.path.display());
                    self.failing = false;
                }
                celsius
            }
            Err(e) => {
                if self.failing {
                    debug!("Temperature sensor still failing: {e}");
                } else {
                    error!(
                        "Temperature sensor {} failed: {e}; substituting {}C",
                        self.path.display(),
                        self.fallback_c
                    );
                    self.failing = true;
                }
                self.fallback_c
            }
        }
    }
}

/// Smoothed temperature carried across ticks.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureFilter {
    alpha: f32,
    previous: f32,
}

impl TemperatureFilter {
    /// Seed the filter with an initial reading.
    pub fn new(alpha: f32, seed: f32) -> Self {
        Self {
            alpha,
            previous: seed,
        }
    }

    /// Fold in a new raw sample and return the smoothed value.
    /// Non-finite samples are skipped.
    pub fn update(&mut self, raw: f32) -> f32 {
        if raw.is_finite() {
            self.previous = smooth(raw, self.previous, self.alpha);
        }
        self.previous
    }

    pub fn value(&self) -> f32 {
        self.previous
    }
}

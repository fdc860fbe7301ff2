//! Temperature → target-RPM mapping.
//!
//! Three regimes over the smoothed temperature:
//!
//! ```text
//!   RPM
//!  5000 ┤                          ┌────────  Max  (open loop, duty = MAX)
//!       │                     ╱────┘
//!       │                ╱────
//!  1500 ┤           ┌────          Closed (PID)
//!     0 ┼───────────┘              Off   (open loop, duty = 0)
//!       └───────────┬──────────────┬────────▶ °C
//!                  45             70
//! ```
//!
//! Only the middle band is closed-loop; the extremes bypass the PID.

use crate::config::CurveSection;

/// Which control regime a temperature falls into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Regime {
    /// Fan off, duty forced to 0.
    Off,
    /// Fan flat out, duty forced to MAX. Carries the ceiling RPM.
    Max(f32),
    /// PID engaged toward this target RPM.
    Closed(f32),
}

impl Regime {
    /// Target RPM for reporting; `None` when the fan is off.
    pub fn target_rpm(&self) -> Option<f32> {
        match *self {
            Self::Off => None,
            Self::Max(rpm) | Self::Closed(rpm) => Some(rpm),
        }
    }

    /// True when the PID drives the duty cycle.
    pub fn is_closed_loop(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Pure mapping from smoothed temperature to [`Regime`].
#[derive(Debug, Clone)]
pub struct SpeedMapper {
    off_below_c: f32,
    max_at_c: f32,
    min_rpm: f32,
    max_rpm: f32,
    /// RPM gained per degree above `off_below_c`.
    slope: f32,
}

impl SpeedMapper {
    pub fn new(curve: &CurveSection) -> Self {
        Self {
            off_below_c: curve.fan_off_below_c,
            max_at_c: curve.fan_max_at_c,
            min_rpm: curve.min_rpm,
            max_rpm: curve.max_rpm,
            slope: (curve.max_rpm - curve.min_rpm) / curve.ramp_span_c,
        }
    }

    pub fn map(&self, smoothed_temp: f32) -> Regime {
        if smoothed_temp < self.off_below_c {
            Regime::Off
        } else if smoothed_temp >= self.max_at_c {
            Regime::Max(self.max_rpm)
        } else {
            let target = self.min_rpm + (smoothed_temp - self.off_below_c) * self.slope;
            Regime::Closed(target.clamp(self.min_rpm, self.max_rpm))
        }
    }
}

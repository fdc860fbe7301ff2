//! Safety supervisor.
//!
//! Runs every tick **after** the regime decision and has the final word on
//! the duty cycle: when the raw (unsmoothed) temperature reaches the
//! critical threshold, the fan is forced to maximum whatever the mapper or
//! the PID decided.
//!
//! The fault is latched only for logging; the override itself is
//! re-evaluated from scratch every tick.

use log::{error, info};

use crate::config::FanConfig;

/// Outcome of one safety evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Regime decision stands.
    Nominal,
    /// Duty forced to this value.
    Override(u32),
}

/// Critical-temperature supervisor.
pub struct SafetySupervisor {
    critical_temp_c: f32,
    max_duty_cycle: u32,
    tripped: bool,
}

impl SafetySupervisor {
    pub fn new(config: &FanConfig) -> Self {
        Self {
            critical_temp_c: config.temperature.critical_temp_c,
            max_duty_cycle: config.fan.max_duty_cycle,
            tripped: false,
        }
    }

    /// Evaluate the raw temperature against the critical threshold.
    pub fn evaluate(&mut self, raw_temp_c: f32) -> Verdict {
        let critical = raw_temp_c >= self.critical_temp_c;
        if critical && !self.tripped {
            error!(
                "SAFETY: critical temperature {:.1}C >= {:.1}C, forcing fan to max",
                raw_temp_c, self.critical_temp_c
            );
        } else if !critical && self.tripped {
            info!(
                "SAFETY: temperature back below critical ({:.1}C)",
                raw_temp_c
            );
        }
        self.tripped = critical;

        if critical {
            Verdict::Override(self.max_duty_cycle)
        } else {
            Verdict::Nominal
        }
    }

    /// Apply a verdict to a duty-cycle decision.
    pub fn apply(verdict: Verdict, duty_cycle: u32) -> u32 {
        match verdict {
            Verdict::Nominal => duty_cycle,
            Verdict::Override(forced) => forced,
        }
    }

    /// True while the raw temperature is at or above critical.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn critical_temp_c(&self) -> f32 {
        self.critical_temp_c
    }
}

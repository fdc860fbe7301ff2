//! PID controller for fan speed
//!
//! Incremental form: each call adds `P + I + D` to the previous duty cycle,
//! so the output tracks the actuator command rather than an absolute level.
//! The integral accumulator is clamped to `[0, max_duty]` (anti-windup) and
//! the final duty is clamped to the actuator range.

use std::time::Instant;

use log::debug;

use crate::config::PidSection;

/// Floor for the integral delta-time. Shorter intervals give no derivative.
const MIN_DT_SECS: f32 = 1e-3;
/// Largest delta-time; bounds the integral step after a long open-loop spell.
const MAX_DT_SECS: f32 = 5.0;

/// Cross-tick controller memory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub integral: f32,
    pub last_error: f32,
    /// `None` until the first invocation.
    pub last_time: Option<Instant>,
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    max_duty: f32,
    state: PidState,
}

impl PidController {
    pub fn new(gains: &PidSection, max_duty_cycle: u32) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            max_duty: max_duty_cycle as f32,
            state: PidState::default(),
        }
    }

    /// Compute the next duty cycle from measured and target RPM.
    ///
    /// `now` is the monotonic time of this invocation; the first call only
    /// initialises the time base and contributes neither integral nor
    /// derivative action.
    pub fn adjust(
        &mut self,
        current_rpm: f32,
        target_rpm: f32,
        last_duty_cycle: u32,
        now: Instant,
    ) -> u32 {
        let error = target_rpm - current_rpm;

        let elapsed = self
            .state
            .last_time
            .map(|last| now.saturating_duration_since(last).as_secs_f32());
        let dt = elapsed.map(|e| e.clamp(MIN_DT_SECS, MAX_DT_SECS));

        // Proportional
        let p = self.kp * error;

        // Integral (with anti-windup)
        if let Some(dt) = dt {
            self.state.integral += self.ki * error * dt;
        }
        self.state.integral = self.state.integral.clamp(0.0, self.max_duty);
        let i = self.state.integral;

        // Derivative: no rate without a measurable interval
        let d = match (elapsed, dt) {
            (Some(e), Some(dt)) if e >= MIN_DT_SECS => {
                self.kd * (error - self.state.last_error) / dt
            }
            _ => 0.0,
        };

        let output = (last_duty_cycle as f32 + p + i + d).clamp(0.0, self.max_duty);
        debug!(
            "PID err={:.0} p={:.2} i={:.2} d={:.2} -> {:.1}",
            error, p, i, d, output
        );

        self.state.last_error = error;
        self.state.last_time = Some(now);

        output.round() as u32
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }
}

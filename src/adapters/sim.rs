//! Simulated fan for running the daemon off the target board.
//!
//! The commanded duty cycle maps linearly to a steady-state speed, and the
//! simulated rotor approaches it with a first-order lag. A background
//! thread emits tach edges at the rate the current speed implies, so the
//! whole loop (edge callback, pulse counter, PID) runs as it would on the
//! real fan.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, CallbackHandle, Edge, EdgeHandler};
use crate::error::ActuatorError;

/// Simulation step of the tach thread.
const STEP: Duration = Duration::from_millis(10);
/// Rotor time constant.
const TAU_SECS: f32 = 1.5;

/// In-process fan model.
pub struct SimulatedFan {
    duty: Arc<AtomicU32>,
    max_duty_cycle: u32,
    max_rpm: f32,
    pulses_per_revolution: u32,
    pwm_freq_hz: u32,
    stopped: bool,
}

impl SimulatedFan {
    pub fn new(max_duty_cycle: u32, max_rpm: f32, pulses_per_revolution: u32) -> Self {
        info!("Simulated fan: {max_rpm} RPM at duty {max_duty_cycle}");
        Self {
            duty: Arc::new(AtomicU32::new(0)),
            max_duty_cycle,
            max_rpm,
            pulses_per_revolution,
            pwm_freq_hz: 0,
            stopped: false,
        }
    }

    pub fn duty_cycle(&self) -> u32 {
        self.duty.load(Ordering::Relaxed)
    }

    pub fn pwm_frequency(&self) -> u32 {
        self.pwm_freq_hz
    }

    fn ensure_running(&self) -> Result<(), ActuatorError> {
        if self.stopped {
            Err(ActuatorError::Stopped)
        } else {
            Ok(())
        }
    }
}

impl ActuatorPort for SimulatedFan {
    type Callback = SimCallback;

    fn set_pwm_frequency(&mut self, _pin: u32, hz: u32) -> Result<(), ActuatorError> {
        self.ensure_running()?;
        self.pwm_freq_hz = hz;
        Ok(())
    }

    fn set_duty_cycle(&mut self, _pin: u32, duty: u32) -> Result<(), ActuatorError> {
        self.ensure_running()?;
        self.duty.store(duty.min(self.max_duty_cycle), Ordering::Relaxed);
        Ok(())
    }

    fn register_edge_callback(
        &mut self,
        _pin: u32,
        edge: Edge,
        mut handler: EdgeHandler,
    ) -> Result<SimCallback, ActuatorError> {
        self.ensure_running()?;
        let duty = Arc::clone(&self.duty);
        let max_duty = self.max_duty_cycle as f32;
        let max_rpm = self.max_rpm;
        // A full tach cycle has one rising and one falling edge.
        let edges_per_rev = match edge {
            Edge::Rising | Edge::Falling => self.pulses_per_revolution as f32,
            Edge::Either => 2.0 * self.pulses_per_revolution as f32,
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let thread = thread::Builder::new()
            .name("sim-tach".into())
            .spawn(move || {
                let mut rpm = 0.0f32;
                let mut owed = 0.0f32;
                let mut last = Instant::now();
                while !flag.load(Ordering::Acquire) {
                    thread::sleep(STEP);
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f32();
                    last = now;

                    let target = duty.load(Ordering::Relaxed) as f32 / max_duty * max_rpm;
                    rpm += (target - rpm) * (dt / TAU_SECS).min(1.0);
                    owed += rpm / 60.0 * edges_per_rev * dt;
                    while owed >= 1.0 {
                        handler();
                        owed -= 1.0;
                    }
                }
                debug!("Simulated tach stopped at {rpm:.0} RPM");
            })
            .map_err(ActuatorError::from)?;

        Ok(SimCallback {
            cancelled,
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        self.duty.store(0, Ordering::Relaxed);
        self.stopped = true;
    }
}

pub struct SimCallback {
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CallbackHandle for SimCallback {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Simulated tach thread panicked");
            }
        }
    }
}

impl Drop for SimCallback {
    fn drop(&mut self) {
        self.cancel();
    }
}

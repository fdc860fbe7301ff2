//! Control loop, the hexagonal core.
//!
//! [`ControlLoop`] owns the two pieces of cross-tick state (PID memory and
//! the smoothed temperature), the regime mapper and the safety supervisor.
//! All I/O flows through port traits, making the whole loop testable with
//! mock adapters.
//!
//! ```text
//!  TemperaturePort ──▶ ┌──────────────────────────┐ ──▶ TelemetrySink
//!                      │       ControlLoop        │
//!     ActuatorPort ◀──▶│ Mapper · PID · Safety    │ ──▶ EventSink
//!            Clock ──▶ └──────────────────────────┘
//! ```
//!
//! Per tick: tach sample → temperature read + smoothing → regime → PID
//! (closed-loop band only) → critical override → actuation → telemetry →
//! status line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::FanConfig;
use crate::control::mapper::{Regime, SpeedMapper};
use crate::control::pid::PidController;
use crate::error::{ActuatorError, Error};
use crate::safety::{SafetySupervisor, Verdict};
use crate::sensors::tachometer::RpmEstimator;
use crate::sensors::temperature::TemperatureFilter;

use super::events::{AppEvent, StatusLine, TelemetryRecord};
use super::ports::{
    ActuatorPort, CallbackHandle, Clock, Edge, EventSink, TelemetrySink, TemperaturePort,
};

/// What one tick decided, returned for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub raw_temperature: f32,
    pub smoothed_temperature: f32,
    pub regime: Regime,
    pub measured_rpm: f32,
    pub duty_cycle: u32,
    pub critical: bool,
}

/// The fan control loop.
pub struct ControlLoop<T, A, S, E, C>
where
    T: TemperaturePort,
    A: ActuatorPort,
    S: TelemetrySink,
    E: EventSink,
    C: Clock,
{
    sensor: T,
    actuator: A,
    telemetry: S,
    events: E,
    clock: C,

    mapper: SpeedMapper,
    pid: PidController,
    safety: SafetySupervisor,
    rpm: RpmEstimator,
    /// `None` until seeded by the first reading.
    filter: Option<TemperatureFilter>,
    callback: Option<A::Callback>,

    alpha: f32,
    pwm_gpio: u32,
    tach_gpio: u32,
    pwm_freq_hz: u32,
    max_duty_cycle: u32,
    window: Duration,

    duty_cycle: u32,
    last_sample: Option<Instant>,
    tick_count: u64,
    started: bool,
    shut_down: bool,
}

impl<T, A, S, E, C> ControlLoop<T, A, S, E, C>
where
    T: TemperaturePort,
    A: ActuatorPort,
    S: TelemetrySink,
    E: EventSink,
    C: Clock,
{
    /// Build the loop around already-initialised adapters.
    ///
    /// Does **not** touch the hardware; call [`start`](Self::start) or
    /// [`run`](Self::run) next.
    pub fn new(
        config: &FanConfig,
        sensor: T,
        actuator: A,
        telemetry: S,
        events: E,
        clock: C,
    ) -> Self {
        Self {
            sensor,
            actuator,
            telemetry,
            events,
            clock,
            mapper: SpeedMapper::new(&config.curve),
            pid: PidController::new(&config.pid, config.fan.max_duty_cycle),
            safety: SafetySupervisor::new(config),
            rpm: RpmEstimator::new(config.fan.pulses_per_revolution),
            filter: None,
            callback: None,
            alpha: config.temperature.smoothing_alpha,
            pwm_gpio: config.fan.pwm_gpio,
            tach_gpio: config.fan.tach_gpio,
            pwm_freq_hz: config.fan.pwm_freq_hz,
            max_duty_cycle: config.fan.max_duty_cycle,
            window: config.sample_window(),
            duty_cycle: config.fan.initial_duty_cycle,
            last_sample: None,
            tick_count: 0,
            started: false,
            shut_down: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start counting tach pulses and seed the temperature filter.
    ///
    /// Called by [`run`](Self::run) unless the caller already did, so
    /// start-up failures can be told apart from failures mid-loop.
    pub fn start(&mut self) -> Result<(), Error> {
        let handler = self.rpm.edge_handler();
        let callback = self
            .actuator
            .register_edge_callback(self.tach_gpio, Edge::Rising, handler)?;
        self.callback = Some(callback);

        let seed = self.sensor.read();
        self.filter = Some(TemperatureFilter::new(self.alpha, seed));
        self.rpm.counter().take();
        self.last_sample = Some(self.clock.monotonic());
        self.started = true;

        self.events.emit(&AppEvent::Started {
            initial_duty_cycle: self.duty_cycle,
        });
        info!(
            "Control loop started (window {:?}, seed {:.1}C)",
            self.window, seed
        );
        Ok(())
    }

    /// Run until `stop` is raised, then clean up.
    ///
    /// Cleanup runs on every exit path: after a stop request, after an
    /// actuator error (which is then returned), and on unwind via `Drop`.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), Error> {
        let result = self.run_until_stopped(stop);
        if let Err(e) = &result {
            warn!("Control loop aborted: {e}");
        }
        self.shutdown();
        result
    }

    fn run_until_stopped(&mut self, stop: &AtomicBool) -> Result<(), Error> {
        if !self.started {
            self.start()?;
        }
        while !stop.load(Ordering::Acquire) {
            self.clock.sleep(self.window);
            if stop.load(Ordering::Acquire) {
                break;
            }
            self.tick()?;
        }
        info!("Stop requested after {} ticks", self.tick_count);
        Ok(())
    }

    /// Fan off, stop pulse counting, release the actuator, flush telemetry.
    ///
    /// Every step runs even if an earlier one fails. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Err(e) = self.actuator.set_duty_cycle(self.pwm_gpio, 0) {
            warn!("Shutdown: could not turn fan off: {e}");
        }
        self.duty_cycle = 0;

        if let Some(mut callback) = self.callback.take() {
            callback.cancel();
        }

        self.actuator.stop();

        if let Err(e) = self.telemetry.flush_and_close() {
            warn!("Shutdown: telemetry flush failed: {e}");
        }

        self.events.emit(&AppEvent::Stopped);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// Only actuator failures are returned; sensor and telemetry failures
    /// are absorbed by their adapters and the event sink.
    pub fn tick(&mut self) -> Result<TickReport, Error> {
        self.tick_count += 1;
        let now = self.clock.monotonic();

        // 1. Tach sample over the window that just ended
        let window_secs = match self.last_sample {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => self.window.as_secs_f32(),
        };
        self.last_sample = Some(now);
        let measured_rpm = self.rpm.sample(window_secs);

        // 2. Temperature
        let raw = self.sensor.read();
        let alpha = self.alpha;
        let smoothed = self
            .filter
            .get_or_insert_with(|| TemperatureFilter::new(alpha, raw))
            .update(raw);

        // 3. Regime → duty
        let regime = self.mapper.map(smoothed);
        let decided = match regime {
            Regime::Off => 0,
            Regime::Max(_) => self.max_duty_cycle,
            Regime::Closed(target) => self.pid.adjust(measured_rpm, target, self.duty_cycle, now),
        };

        // 4. Critical-temperature override
        let verdict = self.safety.evaluate(raw);
        let critical = matches!(verdict, Verdict::Override(_));
        if critical {
            self.events.emit(&AppEvent::CriticalTemperature {
                temperature: raw,
                threshold: self.safety.critical_temp_c(),
            });
        }
        self.duty_cycle = SafetySupervisor::apply(verdict, decided);

        // 5. Actuation
        self.actuate(regime)?;

        // 6. Telemetry (failures isolated)
        let timestamp = self.clock.wall();
        let record = TelemetryRecord {
            timestamp,
            temperature: raw,
            rpm: measured_rpm,
            duty_cycle: self.duty_cycle,
        };
        if let Err(e) = self.telemetry.write(&record) {
            self.events.emit(&AppEvent::TelemetryDropped(e.to_string()));
        }

        // 7. Status line
        self.events.emit(&AppEvent::Status(StatusLine {
            timestamp,
            temperature: raw,
            smoothed_temperature: smoothed,
            regime,
            current_rpm: measured_rpm,
            duty_cycle: self.duty_cycle,
        }));

        Ok(TickReport {
            raw_temperature: raw,
            smoothed_temperature: smoothed,
            regime,
            measured_rpm,
            duty_cycle: self.duty_cycle,
            critical,
        })
    }

    fn actuate(&mut self, regime: Regime) -> Result<(), ActuatorError> {
        if regime.is_closed_loop() {
            self.actuator
                .set_pwm_frequency(self.pwm_gpio, self.pwm_freq_hz)?;
        }
        self.actuator.set_duty_cycle(self.pwm_gpio, self.duty_cycle)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Duty cycle most recently commanded.
    pub fn duty_cycle(&self) -> u32 {
        self.duty_cycle
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn rpm_estimator(&self) -> &RpmEstimator {
        &self.rpm
    }

    pub fn smoothed_temperature(&self) -> Option<f32> {
        self.filter.map(|f| f.value())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn telemetry(&self) -> &S {
        &self.telemetry
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<T, A, S, E, C> Drop for ControlLoop<T, A, S, E, C>
where
    T: TemperaturePort,
    A: ActuatorPort,
    S: TelemetrySink,
    E: EventSink,
    C: Clock,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

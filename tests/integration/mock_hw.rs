//! Mock adapters for integration tests.
//!
//! Every side-effecting call lands in a shared [`Journal`] so tests can
//! assert on ordering across adapters (e.g. actuator stop before telemetry
//! flush) without touching a GPIO daemon or a database.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use fanctl::app::events::{AppEvent, TelemetryRecord};
use fanctl::app::ports::{
    ActuatorPort, CallbackHandle, Clock, Edge, EdgeHandler, EventSink, TelemetrySink,
    TemperaturePort,
};
use fanctl::error::{ActuatorError, TelemetryError};

// ── Journal ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetFrequency { pin: u32, hz: u32 },
    SetDuty { pin: u32, duty: u32 },
    Register { pin: u32, edge: Edge },
    Cancel,
    Stop,
    Write(u32),
    FlushAndClose,
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn duties(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetDuty { duty, .. } => Some(duty),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

// ── ScriptedTemperature ───────────────────────────────────────

/// Returns queued readings in order, then repeats the last one.
pub struct ScriptedTemperature {
    queue: VecDeque<f32>,
    last: f32,
}

impl ScriptedTemperature {
    pub fn new(readings: &[f32]) -> Self {
        Self {
            queue: readings.iter().copied().collect(),
            last: readings.last().copied().unwrap_or(0.0),
        }
    }

    pub fn push(&mut self, reading: f32) {
        self.queue.push_back(reading);
    }
}

impl TemperaturePort for ScriptedTemperature {
    fn read(&mut self) -> f32 {
        if let Some(t) = self.queue.pop_front() {
            self.last = t;
        }
        self.last
    }
}

// ── MockActuator ──────────────────────────────────────────────

pub struct MockActuator {
    journal: Journal,
    handler: Arc<Mutex<Option<EdgeHandler>>>,
    /// Fail every `set_duty_cycle` from the n-th call on (0-based).
    fail_duty_from: Option<usize>,
    fail_register: bool,
    duty_calls: usize,
}

impl MockActuator {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            handler: Arc::new(Mutex::new(None)),
            fail_duty_from: None,
            fail_register: false,
            duty_calls: 0,
        }
    }

    pub fn failing_duty_from(mut self, n: usize) -> Self {
        self.fail_duty_from = Some(n);
        self
    }

    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    /// Deliver `n` tach edges through the registered handler.
    pub fn fire_edges(&self, n: u32) {
        let mut slot = self.handler.lock().unwrap();
        if let Some(handler) = slot.as_mut() {
            for _ in 0..n {
                handler();
            }
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

impl ActuatorPort for MockActuator {
    type Callback = MockCallback;

    fn set_pwm_frequency(&mut self, pin: u32, hz: u32) -> Result<(), ActuatorError> {
        self.journal.push(Call::SetFrequency { pin, hz });
        Ok(())
    }

    fn set_duty_cycle(&mut self, pin: u32, duty: u32) -> Result<(), ActuatorError> {
        let n = self.duty_calls;
        self.duty_calls += 1;
        self.journal.push(Call::SetDuty { pin, duty });
        match self.fail_duty_from {
            Some(from) if n >= from => Err(ActuatorError::Io(std::io::ErrorKind::BrokenPipe)),
            _ => Ok(()),
        }
    }

    fn register_edge_callback(
        &mut self,
        pin: u32,
        edge: Edge,
        handler: EdgeHandler,
    ) -> Result<MockCallback, ActuatorError> {
        if self.fail_register {
            return Err(ActuatorError::Rejected { cmd: 19, code: -2 });
        }
        self.journal.push(Call::Register { pin, edge });
        *self.handler.lock().unwrap() = Some(handler);
        Ok(MockCallback {
            journal: self.journal.clone(),
            handler: Arc::clone(&self.handler),
            cancelled: false,
        })
    }

    fn stop(&mut self) {
        self.journal.push(Call::Stop);
    }
}

pub struct MockCallback {
    journal: Journal,
    handler: Arc<Mutex<Option<EdgeHandler>>>,
    cancelled: bool,
}

impl CallbackHandle for MockCallback {
    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.handler.lock().unwrap().take();
        self.journal.push(Call::Cancel);
    }
}

// ── RecordingTelemetry ────────────────────────────────────────

pub struct RecordingTelemetry {
    journal: Journal,
    pub records: Vec<TelemetryRecord>,
    pub fail: bool,
}

impl RecordingTelemetry {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            records: Vec::new(),
            fail: false,
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn write(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.journal.push(Call::Write(record.duty_cycle));
        if self.fail {
            return Err(TelemetryError::Http(503));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn flush_and_close(&mut self) -> Result<(), TelemetryError> {
        self.journal.push(Call::FlushAndClose);
        if self.fail {
            Err(TelemetryError::Transport)
        } else {
            Ok(())
        }
    }
}

// ── RecordingEvents ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Vec<AppEvent>,
}

impl RecordingEvents {
    pub fn critical_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::CriticalTemperature { .. }))
            .count()
    }

    pub fn dropped_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::TelemetryDropped(_)))
            .count()
    }

    pub fn status_lines(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Status(line) => Some(line.to_string()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Time only moves when the loop sleeps (or a test calls `advance`).
///
/// Optionally raises a stop flag after a given number of sleeps, standing
/// in for a signal arriving mid-window.
pub struct ManualClock {
    now: Cell<Instant>,
    wall: Cell<DateTime<Utc>>,
    sleeps: Cell<u32>,
    stop_after: Option<(u32, Arc<AtomicBool>)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            wall: Cell::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            sleeps: Cell::new(0),
            stop_after: None,
        }
    }

    pub fn stopping_after(sleeps: u32, flag: Arc<AtomicBool>) -> Self {
        Self {
            stop_after: Some((sleeps, flag)),
            ..Self::new()
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
        self.wall
            .set(self.wall.get() + chrono::Duration::from_std(d).unwrap());
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Instant {
        self.now.get()
    }

    fn wall(&self) -> DateTime<Utc> {
        self.wall.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        let n = self.sleeps.get() + 1;
        self.sleeps.set(n);
        if let Some((after, flag)) = &self.stop_after {
            if n >= *after {
                flag.store(true, Ordering::Release);
            }
        }
    }
}

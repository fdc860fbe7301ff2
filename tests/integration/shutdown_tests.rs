//! Loop lifecycle: stop requests, abort on actuator failure, and the
//! cleanup sequence that must run on every exit path.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use fanctl::app::events::AppEvent;
use fanctl::app::service::ControlLoop;
use fanctl::config::FanConfig;
use fanctl::error::{ActuatorError, Error};

use crate::mock_hw::{
    Call, Journal, ManualClock, MockActuator, RecordingEvents, RecordingTelemetry,
    ScriptedTemperature,
};

const CLEANUP: [Call; 4] = [
    Call::SetDuty { pin: 18, duty: 0 },
    Call::Cancel,
    Call::Stop,
    Call::FlushAndClose,
];

fn tail(journal: &Journal, n: usize) -> Vec<Call> {
    let calls = journal.calls();
    calls[calls.len().saturating_sub(n)..].to_vec()
}

#[test]
fn run_stops_on_flag_and_cleans_up() {
    let journal = Journal::default();
    let stop = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::stopping_after(3, Arc::clone(&stop)),
    );

    assert_eq!(control.run(&stop), Ok(()));

    // Flag raised during the third window: that tick never runs.
    assert_eq!(control.tick_count(), 2);
    assert_eq!(control.clock().sleeps(), 3);
    assert!(control.is_shut_down());
    assert_eq!(control.duty_cycle(), 0);
    assert_eq!(tail(&journal, 4), CLEANUP.to_vec());
    assert_eq!(control.events().events.last(), Some(&AppEvent::Stopped));
}

#[test]
fn stop_before_first_window_runs_no_ticks() {
    let journal = Journal::default();
    let stop = AtomicBool::new(true);
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );

    assert_eq!(control.run(&stop), Ok(()));
    assert_eq!(control.tick_count(), 0);
    assert_eq!(journal.count(|c| matches!(c, Call::Write(_))), 0);
    assert_eq!(tail(&journal, 4), CLEANUP.to_vec());
}

#[test]
fn actuator_error_aborts_loop_but_still_cleans_up() {
    let journal = Journal::default();
    let stop = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[57.0]),
        MockActuator::new(journal.clone()).failing_duty_from(1),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::stopping_after(100, Arc::clone(&stop)),
    );

    let result = control.run(&stop);

    assert_eq!(
        result,
        Err(Error::Actuator(ActuatorError::Io(
            std::io::ErrorKind::BrokenPipe
        )))
    );
    assert_eq!(control.tick_count(), 2);
    // The failed tick wrote no telemetry.
    assert_eq!(control.telemetry().records.len(), 1);
    // Turning the fan off also fails on this actuator; the rest still runs.
    assert_eq!(tail(&journal, 4), CLEANUP.to_vec());
    assert!(control.is_shut_down());
}

#[test]
fn registration_failure_still_releases_actuator() {
    let journal = Journal::default();
    let stop = AtomicBool::new(false);
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()).failing_register(),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );

    let result = control.run(&stop);

    assert!(matches!(
        result,
        Err(Error::Actuator(ActuatorError::Rejected { .. }))
    ));
    assert_eq!(control.tick_count(), 0);
    assert_eq!(
        journal.calls(),
        vec![
            Call::SetDuty { pin: 18, duty: 0 },
            Call::Stop,
            Call::FlushAndClose
        ],
        "nothing to cancel when registration failed"
    );
}

#[test]
fn shutdown_is_idempotent() {
    let journal = Journal::default();
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );
    control.start().unwrap();

    control.shutdown();
    control.shutdown();
    drop(control);

    assert_eq!(journal.count(|c| *c == Call::Stop), 1);
    assert_eq!(journal.count(|c| *c == Call::FlushAndClose), 1);
    assert_eq!(journal.count(|c| *c == Call::Cancel), 1);
}

#[test]
fn dropping_the_loop_cleans_up() {
    let journal = Journal::default();
    {
        let mut control = ControlLoop::new(
            &FanConfig::default(),
            ScriptedTemperature::new(&[65.0]),
            MockActuator::new(journal.clone()),
            RecordingTelemetry::new(journal.clone()),
            RecordingEvents::default(),
            ManualClock::new(),
        );
        control.start().unwrap();
        control.clock().advance(std::time::Duration::from_secs(1));
        control.tick().unwrap();
    }
    assert_eq!(tail(&journal, 4), CLEANUP.to_vec());
}

#[test]
fn edges_after_shutdown_are_not_delivered() {
    let journal = Journal::default();
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );
    control.start().unwrap();
    control.shutdown();

    assert!(!control.actuator().has_handler());
    control.actuator().fire_edges(10);
    assert_eq!(control.rpm_estimator().counter().peek(), 0);
}

#[test]
fn telemetry_flush_failure_does_not_block_stopped_event() {
    let journal = Journal::default();
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::failing(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );
    control.start().unwrap();
    control.shutdown();

    assert_eq!(control.events().events.last(), Some(&AppEvent::Stopped));
    assert_eq!(tail(&journal, 4), CLEANUP.to_vec());
}

#[test]
fn run_after_explicit_start_registers_once() {
    let journal = Journal::default();
    let stop = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::stopping_after(2, Arc::clone(&stop)),
    );
    control.start().unwrap();
    assert!(control.is_started());

    assert_eq!(control.run(&stop), Ok(()));
    assert_eq!(control.tick_count(), 1);
    assert_eq!(journal.count(|c| matches!(c, Call::Register { .. })), 1);
    let started = control
        .events()
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Started { .. }))
        .count();
    assert_eq!(started, 1);
}

#[test]
fn failed_start_is_reported_before_any_tick() {
    let journal = Journal::default();
    let mut control = ControlLoop::new(
        &FanConfig::default(),
        ScriptedTemperature::new(&[30.0]),
        MockActuator::new(journal.clone()).failing_register(),
        RecordingTelemetry::new(journal.clone()),
        RecordingEvents::default(),
        ManualClock::new(),
    );

    assert!(matches!(
        control.start(),
        Err(Error::Actuator(ActuatorError::Rejected { .. }))
    ));
    assert!(!control.is_started());
    assert_eq!(control.tick_count(), 0);

    drop(control);
    assert_eq!(
        journal.calls(),
        vec![
            Call::SetDuty { pin: 18, duty: 0 },
            Call::Stop,
            Call::FlushAndClose
        ]
    );
}

//! Log-based sink adapters.
//!
//! [`LogEventSink`] writes application events to the `log` facade (the
//! console or journal in production). [`LogTelemetrySink`] is the
//! telemetry fallback when no time-series database is configured.

use log::{debug, info, warn};

use crate::app::events::{AppEvent, TelemetryRecord};
use crate::app::ports::{EventSink, TelemetrySink};
use crate::error::TelemetryError;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { initial_duty_cycle } => {
                info!("START | initial duty cycle {}", initial_duty_cycle);
            }
            AppEvent::Status(line) => {
                info!("{}", line);
            }
            AppEvent::CriticalTemperature {
                temperature,
                threshold,
            } => {
                warn!(
                    "Critical temperature! Maxing out fan speed. ({:.1}C >= {:.1}C)",
                    temperature, threshold
                );
            }
            AppEvent::TelemetryDropped(reason) => {
                warn!("TELEM | write failed, record dropped: {}", reason);
            }
            AppEvent::Stopped => {
                info!("STOP | fan off, handles released");
            }
        }
    }
}

/// Telemetry sink that only logs records at debug level.
#[derive(Debug, Default)]
pub struct LogTelemetrySink {
    written: u64,
}

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn write(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.written += 1;
        debug!(
            "TELEM | t={} temp={:.1}C rpm={:.0} duty={}",
            record.timestamp.to_rfc3339(),
            record.temperature,
            record.rpm,
            record.duty_cycle
        );
        Ok(())
    }

    fn flush_and_close(&mut self) -> Result<(), TelemetryError> {
        info!("TELEM | {} records logged", self.written);
        Ok(())
    }
}

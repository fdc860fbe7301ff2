//! InfluxDB v2 telemetry sink.
//!
//! Records are rendered as line protocol
//!
//! ```text
//! fan_metrics,host=raspberrypi temperature=57i,rpm=3180i,duty_cycle=142i 1714564800000000000
//! ```
//!
//! buffered up to `batch_size` lines and POSTed to `/api/v2/write`. The
//! request timeout is kept below the sampling window so a slow database
//! cannot stall the control cadence. A failed batch is dropped, not
//! replayed: the next tick starts a fresh batch.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::app::events::TelemetryRecord;
use crate::app::ports::TelemetrySink;
use crate::config::InfluxSection;
use crate::error::TelemetryError;

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "INFLUXDB_TOKEN";

pub struct InfluxSink {
    client: Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
    measurement: String,
    host_tag: String,
    batch_size: usize,
    buffer: Vec<String>,
    closed: bool,
}

impl InfluxSink {
    pub fn new(section: &InfluxSection, token: String) -> Result<Self, TelemetryError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(u64::from(section.timeout_ms)))
            .build()
            .map_err(|e| {
                warn!("InfluxDB: cannot build HTTP client: {e}");
                TelemetryError::Transport
            })?;
        info!(
            "InfluxDB: writing to {} (org {}, bucket {})",
            section.url, section.org, section.bucket
        );
        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", section.url.trim_end_matches('/')),
            org: section.org.clone(),
            bucket: section.bucket.clone(),
            token,
            measurement: section.measurement.clone(),
            host_tag: section.host_tag.clone(),
            batch_size: section.batch_size.max(1),
            buffer: Vec::with_capacity(section.batch_size.max(1)),
            closed: false,
        })
    }

    /// Lines waiting for the next write request.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self) -> Result<(), TelemetryError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = self.buffer.join("\n");
        let lines = self.buffer.len();
        self.buffer.clear();

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| {
                debug!("InfluxDB: request failed: {e}");
                TelemetryError::Transport
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("InfluxDB: wrote {lines} lines");
            Ok(())
        } else {
            Err(TelemetryError::Http(status.as_u16()))
        }
    }
}

impl TelemetrySink for InfluxSink {
    fn write(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        if self.closed {
            return Err(TelemetryError::Closed);
        }
        self.buffer
            .push(line_protocol(&self.measurement, &self.host_tag, record));
        if self.buffer.len() >= self.batch_size {
            self.flush()
        } else {
            Ok(())
        }
    }

    fn flush_and_close(&mut self) -> Result<(), TelemetryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.flush();
        info!("InfluxDB: sink closed");
        result
    }
}

/// Render one record. Fields are written as integers, like the dashboard
/// queries expect.
pub fn line_protocol(measurement: &str, host: &str, record: &TelemetryRecord) -> String {
    format!(
        "{},host={} temperature={}i,rpm={}i,duty_cycle={}i {}",
        escape_key(measurement),
        escape_key(host),
        record.temperature as i64,
        record.rpm as i64,
        record.duty_cycle,
        record.timestamp.timestamp_nanos_opt().unwrap_or_default(),
    )
}

/// Escape commas, spaces and equals signs in measurement names and tags.
fn escape_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

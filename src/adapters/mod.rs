//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements                 | Connects to                 |
//! |---------------|----------------------------|-----------------------------|
//! | `pigpio`      | ActuatorPort               | pigpiod socket interface    |
//! | `sim`         | ActuatorPort               | In-process fan model        |
//! | `influx`      | TelemetrySink              | InfluxDB v2 HTTP write API  |
//! | `log_sink`    | EventSink, TelemetrySink   | `log` facade                |
//! | `config_file` | ConfigPort                 | JSON file on disk           |
//! | `time`        | Clock                      | `Instant` / system clock    |
//!
//! The temperature port is implemented directly by
//! [`TemperatureSource`](crate::sensors::temperature::TemperatureSource).

pub mod config_file;
#[cfg(feature = "influxdb")]
pub mod influx;
pub mod log_sink;
pub mod pigpio;
pub mod sim;
pub mod time;

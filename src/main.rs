//! fanctl: closed-loop fan controller daemon.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  TemperatureSource  PigpioActuator / SimulatedFan            │
//! │  (TemperaturePort)  (ActuatorPort)                           │
//! │  InfluxSink / LogTelemetrySink   LogEventSink   SystemClock  │
//! │  (TelemetrySink)                 (EventSink)    (Clock)      │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ──────────────────     │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐      │
//! │  │           ControlLoop (pure logic)                 │      │
//! │  │  Smoothing · Mapper · PID · Safety                 │      │
//! │  └────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: 0 after a signal-driven shutdown, 1 if configuration or
//! actuator initialisation (connection, pin setup, tach callback) fails
//! before the first tick, 2 if the loop aborts on an actuator error.
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use fanctl::adapters::config_file::JsonConfigFile;
use fanctl::adapters::log_sink::{LogEventSink, LogTelemetrySink};
use fanctl::adapters::pigpio::PigpioActuator;
use fanctl::adapters::sim::SimulatedFan;
use fanctl::adapters::time::SystemClock;
use fanctl::app::ports::{ActuatorPort, ConfigError, ConfigPort, TelemetrySink};
use fanctl::app::service::ControlLoop;
use fanctl::config::FanConfig;
use fanctl::sensors::temperature::TemperatureSource;

/// Closed-loop PWM fan controller
#[derive(Parser, Debug)]
#[command(name = "fanctl")]
#[command(
    about = "Drive a PWM fan from CPU temperature with tachometer feedback",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Drive an in-process simulated fan instead of pigpiod
    #[arg(long)]
    simulate: bool,

    /// Log telemetry instead of writing it to InfluxDB
    #[arg(long)]
    no_telemetry: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("fanctl v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Release)) {
        error!("Cannot install signal handler: {e}");
        return ExitCode::from(1);
    }

    let telemetry = build_telemetry(&config, args.no_telemetry);

    if args.simulate {
        let fan = SimulatedFan::new(
            config.fan.max_duty_cycle,
            config.curve.max_rpm,
            config.fan.pulses_per_revolution,
        );
        run_loop(&config, fan, telemetry, &stop)
    } else {
        match connect_pigpio(&config) {
            Ok(pi) => run_loop(&config, pi, telemetry, &stop),
            Err(e) => {
                error!("{e:#}");
                ExitCode::from(1)
            }
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Missing file → defaults; anything else wrong with the file is fatal.
fn load_config(args: &Args) -> Result<FanConfig> {
    let port = JsonConfigFile::new(&args.config);
    match port.load() {
        Ok(cfg) => Ok(cfg),
        Err(ConfigError::NotFound) => {
            warn!("{} not found, using defaults", args.config.display());
            Ok(FanConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", args.config.display())),
    }
}

fn connect_pigpio(config: &FanConfig) -> Result<PigpioActuator> {
    let mut pi = PigpioActuator::connect(&config.pigpio.host, config.pigpio.port)
        .context("failed to connect to pigpio daemon")?;
    pi.configure_fan(
        config.fan.pwm_gpio,
        config.fan.max_duty_cycle,
        config.fan.tach_gpio,
    )
    .context("failed to configure fan GPIOs")?;
    Ok(pi)
}

fn build_telemetry(config: &FanConfig, disabled: bool) -> Box<dyn TelemetrySink> {
    if disabled {
        return Box::new(LogTelemetrySink::new());
    }
    let Some(section) = &config.influxdb else {
        info!("No influxdb section configured, telemetry goes to the log");
        return Box::new(LogTelemetrySink::new());
    };
    influx_sink(section)
}

#[cfg(feature = "influxdb")]
fn influx_sink(section: &fanctl::config::InfluxSection) -> Box<dyn TelemetrySink> {
    use fanctl::adapters::influx::{InfluxSink, TOKEN_ENV};

    let Ok(token) = std::env::var(TOKEN_ENV) else {
        warn!("{TOKEN_ENV} not set, telemetry goes to the log");
        return Box::new(LogTelemetrySink::new());
    };
    match InfluxSink::new(section, token) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("InfluxDB sink unavailable ({e}), telemetry goes to the log");
            Box::new(LogTelemetrySink::new())
        }
    }
}

#[cfg(not(feature = "influxdb"))]
fn influx_sink(_section: &fanctl::config::InfluxSection) -> Box<dyn TelemetrySink> {
    warn!("Built without the influxdb feature, telemetry goes to the log");
    Box::new(LogTelemetrySink::new())
}

/// Start the loop, then run it until stopped.
///
/// A failure while starting (edge-callback registration) is still an
/// actuator initialisation error and exits 1; the loop's cleanup runs when
/// it is dropped.
fn run_loop<A: ActuatorPort>(
    config: &FanConfig,
    actuator: A,
    telemetry: Box<dyn TelemetrySink>,
    stop: &AtomicBool,
) -> ExitCode {
    let sensor = TemperatureSource::new(&config.temperature);
    let mut control = ControlLoop::new(
        config,
        sensor,
        actuator,
        telemetry,
        LogEventSink::new(),
        SystemClock::new(),
    );

    if let Err(e) = control.start().context("failed to start control loop") {
        error!("{e:#}");
        return ExitCode::from(1);
    }

    match control.run(stop).context("control loop failed") {
        Ok(()) => {
            info!("Exiting...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

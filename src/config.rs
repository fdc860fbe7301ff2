//! System configuration parameters
//!
//! All tunable parameters for the fan controller. Loaded once at startup
//! through a [`ConfigPort`](crate::app::ports::ConfigPort) and immutable
//! thereafter; components receive it by reference.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    pub fan: FanSection,
    pub temperature: TemperatureSection,
    pub curve: CurveSection,
    pub pid: PidSection,
    #[serde(rename = "loop")]
    pub control: LoopSection,
    pub pigpio: PigpioSection,
    /// Absent section = telemetry goes to the log only.
    pub influxdb: Option<InfluxSection>,
}

/// PWM output and tachometer wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanSection {
    /// PWM carrier frequency in Hz
    pub pwm_freq_hz: u32,
    /// Upper end of the duty-cycle range (PWM range on the actuator)
    pub max_duty_cycle: u32,
    /// Duty cycle commanded before the first closed-loop tick
    pub initial_duty_cycle: u32,
    pub pwm_gpio: u32,
    pub tach_gpio: u32,
    /// Tachometer edges per fan revolution
    pub pulses_per_revolution: u32,
}

impl Default for FanSection {
    fn default() -> Self {
        Self {
            pwm_freq_hz: 25_000,
            max_duty_cycle: 255,
            initial_duty_cycle: 70,
            pwm_gpio: pins::FAN_PWM_GPIO,
            tach_gpio: pins::FAN_TACH_GPIO,
            pulses_per_revolution: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureSection {
    /// Raw temperature (Celsius) at which the fan is forced to maximum
    pub critical_temp_c: f32,
    /// EWMA weight of the newest sample, 0 < alpha <= 1
    pub smoothing_alpha: f32,
    /// sysfs file reporting millidegrees Celsius
    pub sensor_path: String,
    /// Substituted when the sensor cannot be read
    pub fallback_temp_c: f32,
}

impl Default for TemperatureSection {
    fn default() -> Self {
        Self {
            critical_temp_c: 80.0,
            smoothing_alpha: 0.1,
            sensor_path: "/sys/class/thermal/thermal_zone0/temp".into(),
            fallback_temp_c: 0.0,
        }
    }
}

/// Temperature-to-target-RPM mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveSection {
    /// Below this smoothed temperature the fan is off
    pub fan_off_below_c: f32,
    /// At or above this smoothed temperature the fan runs flat out
    pub fan_max_at_c: f32,
    pub min_rpm: f32,
    pub max_rpm: f32,
    /// Degrees over which the ramp climbs from `min_rpm` to `max_rpm`
    pub ramp_span_c: f32,
}

impl Default for CurveSection {
    fn default() -> Self {
        Self {
            fan_off_below_c: 45.0,
            fan_max_at_c: 70.0,
            min_rpm: 1500.0,
            max_rpm: 5000.0,
            ramp_span_c: 24.0,
        }
    }
}

/// PID gains, fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidSection {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidSection {
    fn default() -> Self {
        Self {
            kp: 0.01,
            ki: 0.001,
            kd: 0.005,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSection {
    /// Tachometer sampling window, which is also the tick period
    pub sample_window_ms: u32,
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            sample_window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PigpioSection {
    pub host: String,
    pub port: u16,
}

impl Default for PigpioSection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8888,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxSection {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    pub host_tag: String,
    /// Lines buffered before a write request is issued
    pub batch_size: usize,
    /// Per-request timeout; keep below the sampling window
    pub timeout_ms: u32,
}

impl Default for InfluxSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".into(),
            org: String::new(),
            bucket: String::new(),
            measurement: "fan_metrics".into(),
            host_tag: "raspberrypi".into(),
            batch_size: 1,
            timeout_ms: 800,
        }
    }
}

impl FanConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let alpha = self.temperature.smoothing_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::ValidationFailed(
                "temperature.smoothing_alpha must be in (0, 1]",
            ));
        }
        if self.fan.max_duty_cycle == 0 {
            return Err(ConfigError::ValidationFailed(
                "fan.max_duty_cycle must be > 0",
            ));
        }
        if self.fan.initial_duty_cycle > self.fan.max_duty_cycle {
            return Err(ConfigError::ValidationFailed(
                "fan.initial_duty_cycle must not exceed fan.max_duty_cycle",
            ));
        }
        if self.fan.pulses_per_revolution == 0 {
            return Err(ConfigError::ValidationFailed(
                "fan.pulses_per_revolution must be > 0",
            ));
        }
        if self.fan.pwm_freq_hz == 0 {
            return Err(ConfigError::ValidationFailed("fan.pwm_freq_hz must be > 0"));
        }
        if self.curve.fan_off_below_c >= self.curve.fan_max_at_c {
            return Err(ConfigError::ValidationFailed(
                "curve.fan_off_below_c must be below curve.fan_max_at_c",
            ));
        }
        if self.curve.min_rpm < 0.0 || self.curve.min_rpm > self.curve.max_rpm {
            return Err(ConfigError::ValidationFailed(
                "curve.min_rpm must be within 0..=curve.max_rpm",
            ));
        }
        if self.curve.ramp_span_c <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "curve.ramp_span_c must be > 0",
            ));
        }
        if self.pid.kp < 0.0 || self.pid.ki < 0.0 || self.pid.kd < 0.0 {
            return Err(ConfigError::ValidationFailed("pid gains must be >= 0"));
        }
        if self.control.sample_window_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "loop.sample_window_ms must be > 0",
            ));
        }
        if let Some(influx) = &self.influxdb {
            if influx.batch_size == 0 {
                return Err(ConfigError::ValidationFailed(
                    "influxdb.batch_size must be > 0",
                ));
            }
            if influx.bucket.is_empty() || influx.org.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "influxdb.org and influxdb.bucket are required",
                ));
            }
            if influx.timeout_ms == 0 || influx.timeout_ms >= self.control.sample_window_ms {
                return Err(ConfigError::ValidationFailed(
                    "influxdb.timeout_ms must be > 0 and below loop.sample_window_ms",
                ));
            }
        }
        Ok(())
    }

    /// Length of one sampling window.
    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(u64::from(self.control.sample_window_ms))
    }
}

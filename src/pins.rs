//! GPIO pin assignments for the fan header (BCM numbering).
//!
//! Defaults only; both pins can be overridden in the `fan` config section.

/// Hardware-PWM capable pin driving the fan's PWM input.
pub const FAN_PWM_GPIO: u32 = 18;

/// Tachometer (sense) line. Open-collector on most 4-pin fans, so the
/// internal pull-up is enabled by the actuator adapter.
pub const FAN_TACH_GPIO: u32 = 24;

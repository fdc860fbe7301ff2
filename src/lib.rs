//! Closed-loop PWM fan controller library.
//!
//! Exposes the control core and its adapters for the `fanctl` daemon and
//! for integration testing. Nothing here requires the target board: the
//! pigpio adapter talks to the daemon over TCP and every other adapter is
//! plain host code.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod pins;
pub mod safety;
pub mod sensors;

//! Control algorithms: regime mapping and PID feedback.

pub mod mapper;
pub mod pid;

//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises the control loop against the mock adapters
//! in `mock_hw`. No GPIO daemon, sensor file or database is needed.

mod mock_hw;
mod shutdown_tests;

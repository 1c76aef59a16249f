//! Hardware-specific tests requiring a real DP800/DP700 instrument.
//!
//! These tests are ignored by default and require actual hardware to run.
//! They should be run manually with the `--ignored` flag and appropriate
//! environment variables set.

pub mod discovery_hardware_tests;
pub mod instrument_tests;
pub mod utils;

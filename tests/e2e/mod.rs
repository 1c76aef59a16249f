//! End-to-end tests for the Rigol DP800 agent.
//!
//! These tests run against the actual system without requiring real hardware.
//! They use an in-process fake instrument listening on a loopback TCP socket
//! and exercise the complete path from discovery through measurement.

pub mod discovery_tests;
pub mod workflow_tests;

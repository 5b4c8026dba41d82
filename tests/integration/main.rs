//! Host-side integration tests.
//!
//! These drive the full chain (command frame in, handler, response frame
//! out) against the simulation adapters, with the real ring store, config
//! store, clock and decision engine in between.

mod harness;
mod protocol_tests;
mod scenario_tests;

//! Fieldnode Test Harness - Collaborators for lifecycle testing
//!
//! This crate provides:
//! - Scripted collaborators with call recording (deterministic tests)
//! - Seeded simulated modem, carrier, time source and broker (demo, soak runs)

pub mod scripted;
pub mod simulator;

pub use scripted::*;
pub use simulator::*;

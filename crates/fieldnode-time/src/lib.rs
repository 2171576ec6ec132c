//! Fieldnode Time - Best-effort wall clock
//!
//! This crate keeps the device's Unix time estimate:
//! - Time source collaborator (async update trigger, synchronous fetch)
//! - Single-writer estimate with read-only snapshot handles
//! - Tick state machine: fetch while unset, extrapolate once acquired
//! - Timer task with extrapolating and one-shot policies

pub mod estimate;
pub mod scheduler;
pub mod source;
pub mod sync;

pub use estimate::*;
pub use scheduler::*;
pub use source::*;
pub use sync::*;

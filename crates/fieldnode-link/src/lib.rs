//! Fieldnode Link - Connectivity bring-up
//!
//! This crate brings the device online before any application logic runs:
//! - Automatic strategy (link already up, nothing to do)
//! - Carrier-managed strategy (wait for the carrier service's Ready event)
//! - Self-managed strategy (synchronous modem connect, failure is fatal)

pub mod carrier;
pub mod controller;
pub mod manager;

pub use carrier::CarrierEventHandler;
pub use controller::{recoverable_error, LinkController};
pub use manager::*;

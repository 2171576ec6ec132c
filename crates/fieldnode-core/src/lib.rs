//! Fieldnode Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every lifecycle component:
//! - Wall-clock primitives (TimestampMillis)
//! - Connectivity state and carrier events
//! - Broker session iteration outcomes
//! - Error codes and the lifecycle error type

pub mod time;
pub mod link;
pub mod session;
pub mod error;

pub use time::*;
pub use link::*;
pub use session::*;
pub use error::*;

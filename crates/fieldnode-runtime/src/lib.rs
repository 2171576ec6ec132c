//! Fieldnode Runtime - Device lifecycle orchestration
//!
//! The lifecycle runs in a fixed order:
//! 1. Bring the link up (blocks, fatal on failure)
//! 2. Initialise the broker session
//! 3. Start the clock sync scheduler (concurrent timer task)
//! 4. Drive broker session iterations until one says stop
//! 5. Disconnect the session, unconditionally

pub mod device;
pub mod session;
pub mod telemetry;

pub use device::*;
pub use session::*;
pub use telemetry::*;

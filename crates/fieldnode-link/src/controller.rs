//! Modem link control collaborator

use fieldnode_core::ErrorCode;

/// Link control provided by the modem driver stack
pub trait LinkController {
    /// Initialise the modem and attach to the network
    /// Blocks until the link is up or the attach fails
    fn init_and_connect(&mut self) -> Result<(), ErrorCode>;
}

impl<F> LinkController for F
where
    F: FnMut() -> Result<(), ErrorCode>,
{
    fn init_and_connect(&mut self) -> Result<(), ErrorCode> {
        self()
    }
}

/// Hook for non-fatal errors reported by the modem library
///
/// The library recovers on its own; we only record the code.
pub fn recoverable_error(err: u32) {
    tracing::warn!(code = err, "modem library recoverable error: {}", err);
}

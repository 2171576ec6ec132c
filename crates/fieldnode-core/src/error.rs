//! Error types for the device lifecycle

use thiserror::Error;

/// Raw status code reported by an external collaborator (errno style)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error {}", self.0)
    }
}

/// Lifecycle errors
///
/// Time-fetch failures are deliberately absent: they are logged and never
/// propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldnodeError {
    // Connectivity errors
    #[error("LTE link could not be established: {0}")]
    LinkConnect(ErrorCode),

    #[error("Carrier event source closed before the link became ready")]
    ReadinessLost,

    // Session errors
    #[error("Broker session init failed: {0}")]
    SessionInit(ErrorCode),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FieldnodeError {
    /// Does this error end the device lifecycle?
    pub fn is_fatal(&self) -> bool {
        match self {
            FieldnodeError::LinkConnect(_)
            | FieldnodeError::ReadinessLost
            | FieldnodeError::SessionInit(_) => true,
            FieldnodeError::InvalidConfig(_) => false,
        }
    }
}

/// Result type for lifecycle operations
pub type FieldnodeResult<T> = Result<T, FieldnodeError>;

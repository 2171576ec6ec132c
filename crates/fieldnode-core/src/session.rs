//! Broker session iteration outcomes

/// Result of one broker-session iteration
///
/// Zero means "keep going". Every other value stops the loop and carries no
/// further meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct IterationOutcome(pub i32);

impl IterationOutcome {
    pub const CONTINUE: IterationOutcome = IterationOutcome(0);

    #[inline]
    pub fn from_code(code: i32) -> Self {
        IterationOutcome(code)
    }

    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_continue(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for IterationOutcome {
    fn from(code: i32) -> Self {
        IterationOutcome(code)
    }
}

//! Human-in-the-loop checkpoint for sign-in walls.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInDecision {
    /// The operator signed in; resume extraction.
    Continue,
    Cancel,
}

/// Blocks until a human decides how to proceed past a sign-in page.
///
/// This is the only unbounded wait in a task. Implementations must not
/// time out on their own; only the operator ends it.
pub trait OperatorGate: Send + Sync {
    fn await_sign_in(&self, url: &str) -> SignInDecision;
}

/// Gate that always answers the same way. Useful for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedGate(pub SignInDecision);

impl OperatorGate for FixedGate {
    fn await_sign_in(&self, _url: &str) -> SignInDecision {
        self.0
    }
}

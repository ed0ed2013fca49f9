pub mod filters;
pub mod movie;
pub mod permission;
pub mod user;

use thiserror::Error;

/// A broken internal contract (programming defect), never a client error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal invariant violated: {0}")]
pub struct InvariantViolation(pub String);

impl InvariantViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

use super::states::EnrollmentStatus;
use thiserror::Error;

/// Errors raised by the enrollment transition table
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: EnrollmentStatus, event: String },
}

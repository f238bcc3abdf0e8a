//! # Engine Error Types
//!
//! Structured errors for sequence execution using thiserror instead of
//! `Box<dyn Error>` patterns. Policy outcomes (exit declined, enrollment
//! already finished) are regular return values, not errors; these variants
//! cover storage faults and operator misuse.

use crate::events::PublishError;
use crate::state_machine::TransitionError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Event publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Enrollment {0} not found")]
    EnrollmentNotFound(i64),

    #[error("Sequence {0} not found")]
    SequenceNotFound(i64),

    #[error("Sequence {0} is not active")]
    SequenceInactive(i64),

    #[error("Sequence {sequence_id} has no step at position {step_order}")]
    StepMissing { sequence_id: i64, step_order: i32 },

    #[error("Contact {contact_id} already has an open enrollment in sequence {sequence_id}")]
    AlreadyEnrolled { sequence_id: i64, contact_id: i64 },
}

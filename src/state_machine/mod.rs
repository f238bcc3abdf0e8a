// State machine module for enrollment lifecycle management
//
// The transition table lives in one pure function so every component that
// changes an enrollment's status consults the same authority before
// persisting anything.

pub mod enrollment_state_machine;
pub mod errors;
pub mod events;
pub mod states;

// Re-export main types for convenient access
pub use enrollment_state_machine::EnrollmentStateMachine;
pub use errors::TransitionError;
pub use events::{EngagementEvent, EnrollmentEvent, ExitEvent};
pub use states::EnrollmentStatus;

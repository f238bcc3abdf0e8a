pub mod activity;
pub mod crm;
pub mod enrollment;
pub mod sequence;
pub mod template;

// Re-export core models for easy access
pub use activity::{Activity, NewActivity};
pub use crm::{Client, Contact, Deal, User};
pub use enrollment::{Enrollment, NewEnrollment, NewStepCompletion, StepCompletion};
pub use sequence::{LinkedinAction, SendingPolicy, Sequence, SequenceStep, StepDetails};
pub use template::EmailTemplate;

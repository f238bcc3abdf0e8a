//! # System Constants
//!
//! Core constants that define the operational boundaries of the cadence
//! sequence engine: lifecycle event names, default configuration values,
//! and the string vocabulary shared with the host CRM application.

/// Core system events published during enrollment lifecycle and advancement runs
pub mod events {
    // Enrollment lifecycle events
    pub const ENROLLMENT_CREATED: &str = "enrollment.created";
    pub const ENROLLMENT_ADVANCED: &str = "enrollment.advanced";
    pub const ENROLLMENT_COMPLETED: &str = "enrollment.completed";
    pub const ENROLLMENT_PAUSED: &str = "enrollment.paused";
    pub const ENROLLMENT_RESUMED: &str = "enrollment.resumed";
    pub const ENROLLMENT_EXITED: &str = "enrollment.exited";

    // Step execution events
    pub const ENROLLMENT_STEP_COMPLETED: &str = "enrollment.step_completed";
    pub const ENROLLMENT_STEP_FAILED: &str = "enrollment.step_failed";

    // Engagement events
    pub const ENGAGEMENT_RECORDED: &str = "engagement.recorded";

    // Advancement run events
    pub const ADVANCEMENT_RUN_COMPLETED: &str = "advancement.run_completed";
}

/// System-wide defaults
pub mod system {
    /// Version compatibility marker
    pub const CADENCE_CORE_VERSION: &str = "0.1.0";

    /// Maximum enrollments claimed per advancement run
    pub const DEFAULT_BATCH_SIZE: i64 = 50;

    /// Claim lease duration before an enrollment becomes reclaimable
    pub const DEFAULT_CLAIM_TIMEOUT_SECONDS: i64 = 300;

    /// Fallback sending window applied when a sequence carries an invalid one
    pub const DEFAULT_SENDING_HOURS_START: u32 = 9;
    pub const DEFAULT_SENDING_HOURS_END: u32 = 17;

    /// Currency used for deal value rendering when the deal has none
    pub const DEFAULT_CURRENCY: &str = "USD";

    /// Default event channel capacity
    pub const DEFAULT_EVENT_CAPACITY: usize = 1000;
}

/// Step type discriminants persisted on sequence steps and completion records
pub mod step_types {
    pub const EMAIL: &str = "email";
    pub const TASK: &str = "task";
    pub const LINKEDIN: &str = "linkedin";
}

/// Step execution result labels recorded in the completion log
pub mod step_results {
    pub const SENT: &str = "sent";
    pub const TASK_CREATED: &str = "task_created";
}

/// Activity vocabulary shared with the host CRM activity timeline
pub mod activities {
    pub const TYPE_EMAIL: &str = "email";
    pub const TYPE_TASK: &str = "task";

    /// Staged activities always enter the host timeline as pending
    pub const STATUS_PENDING: &str = "pending";
}

/// Human-readable exit reasons recorded on exited enrollments
pub mod exit_reasons {
    pub const REPLIED: &str = "Contact replied";
    pub const MEETING_BOOKED: &str = "Meeting booked";
    pub const DEAL_WON: &str = "Deal won";
    pub const DEAL_LOST: &str = "Deal lost";
}

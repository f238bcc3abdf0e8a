//! # Enrollment Model
//!
//! An enrollment is one contact's journey through one sequence: a status,
//! a 1-based cursor into the step list, the time the next step becomes due,
//! engagement counters, and an append-only completion log.
//!
//! ## Database Schema
//!
//! Maps to `cadence_enrollments` and `cadence_step_completions`. The
//! completion log carries `UNIQUE(enrollment_id, step_order)` so duplicate
//! execution attempts are detected at the storage layer. Claim columns
//! (`claimed_by`, `claimed_until`) implement the advancement lease.

use crate::state_machine::EnrollmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A contact's enrollment in a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub sequence_id: i64,
    pub contact_id: i64,
    pub deal_id: Option<i64>,
    pub client_id: Option<i64>,
    /// CRM user who enrolled the contact; resolves `{{user.*}}` placeholders
    pub enrolled_by: Option<i64>,
    pub status: EnrollmentStatus,
    /// 1-based index of the next step to execute
    pub current_step: i32,
    /// When the current step becomes due. Null unless the status is active.
    pub next_step_at: Option<DateTime<Utc>>,
    pub emails_sent: i32,
    pub emails_opened: i32,
    pub emails_clicked: i32,
    pub emails_replied: i32,
    pub tasks_created: i32,
    pub exit_reason: Option<String>,
    pub exited_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    /// Runner currently holding the advancement lease, if any
    pub claimed_by: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Whether this enrollment is due for advancement at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active()
            && self
                .next_step_at
                .map(|at| at <= now)
                .unwrap_or(false)
    }

    /// Whether another runner holds a live claim at `now`.
    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_by.is_some()
            && self
                .claimed_until
                .map(|until| until > now)
                .unwrap_or(false)
    }
}

/// Insert shape for a new enrollment. Status starts active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub sequence_id: i64,
    pub contact_id: i64,
    pub deal_id: Option<i64>,
    pub client_id: Option<i64>,
    pub enrolled_by: Option<i64>,
    pub current_step: i32,
    pub next_step_at: Option<DateTime<Utc>>,
}

/// One record of the append-only completion log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StepCompletion {
    pub id: i64,
    pub enrollment_id: i64,
    pub step_order: i32,
    pub step_type: String,
    /// Execution result label, e.g. "sent" or "task_created"
    pub result: String,
    /// Staged activity created by this execution, when one exists
    pub activity_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

/// Insert shape for a completion log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStepCompletion {
    pub enrollment_id: i64,
    pub step_order: i32,
    pub step_type: String,
    pub result: String,
    pub activity_id: Option<i64>,
}

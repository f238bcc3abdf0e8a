//! # Storage Ports
//!
//! Async traits at the persistence seam. The engine only ever talks to these
//! traits; [`PgStore`] implements the sequence-owned tables on PostgreSQL
//! and [`InMemoryStore`] implements everything for tests and embedded use.
//!
//! [`CrmDirectory`] is deliberately separate: contacts, clients, deals, and
//! users belong to the host CRM application, which supplies its own
//! implementation. The engine treats those rows as read-only snapshots.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Activity, Client, Contact, Deal, EmailTemplate, Enrollment, NewActivity, NewEnrollment,
    NewStepCompletion, Sequence, SequenceStep, StepCompletion, User,
};
use crate::state_machine::EngagementEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by storage implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("corrupt {entity} record {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: i64,
        reason: String,
    },
}

/// Read and counter operations on sequences and their steps
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn sequence_by_id(&self, id: i64) -> Result<Option<Sequence>, StoreError>;

    /// All steps of a sequence ordered by `step_order` ascending
    async fn steps_for_sequence(&self, sequence_id: i64)
        -> Result<Vec<SequenceStep>, StoreError>;

    async fn step_at_order(
        &self,
        sequence_id: i64,
        step_order: i32,
    ) -> Result<Option<SequenceStep>, StoreError>;

    /// Atomically adjust the aggregate counters. `active_delta` is clamped
    /// so `active_enrolled` never drops below zero.
    async fn adjust_sequence_counters(
        &self,
        sequence_id: i64,
        active_delta: i32,
        completed_delta: i32,
    ) -> Result<(), StoreError>;
}

/// Enrollment lifecycle persistence, claiming, and the completion log
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, StoreError>;

    async fn insert_enrollment(&self, new: NewEnrollment) -> Result<Enrollment, StoreError>;

    /// The non-terminal enrollment for a contact in a sequence, if one exists.
    /// Used to reject duplicate enrollments.
    async fn open_enrollment_for(
        &self,
        sequence_id: i64,
        contact_id: i64,
    ) -> Result<Option<Enrollment>, StoreError>;

    /// Atomically claim up to `limit` due active enrollments for `runner_id`,
    /// stamping a lease that expires `lease_seconds` after `now`. Enrollments
    /// holding a live lease from another runner are skipped.
    async fn claim_due(
        &self,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_seconds: i64,
        limit: i64,
    ) -> Result<Vec<Enrollment>, StoreError>;

    /// Release a claim held by `runner_id`. Returns false when the claim was
    /// not held by this runner (already released or reclaimed).
    async fn release_claim(&self, enrollment_id: i64, runner_id: &str)
        -> Result<bool, StoreError>;

    /// Move the cursor to `next_step` and schedule it. Clears the claim.
    async fn advance(
        &self,
        enrollment_id: i64,
        next_step: i32,
        next_step_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Terminal completion: status completed, `next_step_at` and claim cleared.
    async fn mark_completed(&self, enrollment_id: i64) -> Result<(), StoreError>;

    /// Status paused, `paused_at` stamped, `next_step_at` and claim cleared.
    async fn mark_paused(
        &self,
        enrollment_id: i64,
        paused_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Status active again with a freshly scheduled `next_step_at`.
    async fn mark_resumed(
        &self,
        enrollment_id: i64,
        next_step_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Terminal exit with reason. `next_step_at` and claim cleared.
    async fn mark_exited(
        &self,
        enrollment_id: i64,
        reason: &str,
        exited_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Whether the completion log already has `(enrollment_id, step_order)`.
    async fn has_completed_step(
        &self,
        enrollment_id: i64,
        step_order: i32,
    ) -> Result<bool, StoreError>;

    /// Append to the completion log and bump the matching send/task counter
    /// in one atomic operation. Returns false when the log already contained
    /// the `(enrollment_id, step_order)` pair; nothing changes in that case.
    async fn complete_step(&self, completion: NewStepCompletion) -> Result<bool, StoreError>;

    /// Increment an engagement counter regardless of enrollment status.
    async fn increment_engagement(
        &self,
        enrollment_id: i64,
        event: EngagementEvent,
    ) -> Result<(), StoreError>;

    /// Completion log entries ordered by `step_order` ascending
    async fn completions_for(&self, enrollment_id: i64)
        -> Result<Vec<StepCompletion>, StoreError>;
}

/// Read-only access to host CRM entities
#[async_trait]
pub trait CrmDirectory: Send + Sync {
    async fn contact_by_id(&self, id: i64) -> Result<Option<Contact>, StoreError>;
    async fn client_by_id(&self, id: i64) -> Result<Option<Client>, StoreError>;
    async fn deal_by_id(&self, id: i64) -> Result<Option<Deal>, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
}

/// Email template lookup and usage tracking
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn template_by_id(&self, id: i64) -> Result<Option<EmailTemplate>, StoreError>;

    /// Bump `usage_count` and stamp `last_used_at`. Callers treat failures
    /// as non-fatal: a lost usage tick never fails a step.
    async fn record_usage(&self, id: i64, used_at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Staging sink for activities the host CRM will deliver
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Stage a pending activity and return its id.
    async fn create_activity(&self, activity: NewActivity) -> Result<i64, StoreError>;

    /// Staged activities for an enrollment, most recent first. Primarily for
    /// tests and host-side inspection.
    async fn activities_for_enrollment(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<Activity>, StoreError>;
}

//! # PostgreSQL Store
//!
//! `sqlx` implementation of the sequence, enrollment, template, and activity
//! ports against the `cadence_*` schema (see `migrations/`). The CRM directory
//! port is not implemented here: contacts, clients, deals, and users belong to
//! the host application, which supplies its own adapter.
//!
//! ## Claiming
//!
//! Due-enrollment claiming uses `FOR UPDATE SKIP LOCKED` inside an `UPDATE ...
//! WHERE id IN (SELECT ...)` so concurrent runners never hand the same
//! enrollment to two executors. A claim is a lease: `claimed_until` expires it,
//! so a crashed runner's work becomes claimable again without intervention.

use super::{ActivitySink, EnrollmentStore, SequenceStore, StoreError, TemplateStore};
use crate::models::{
    Activity, EmailTemplate, Enrollment, NewActivity, NewEnrollment, NewStepCompletion, Sequence,
    SequenceStep, StepCompletion,
};
use crate::state_machine::{EngagementEvent, EnrollmentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, instrument, warn};

const ENROLLMENT_COLUMNS: &str = "id, sequence_id, contact_id, deal_id, client_id, enrolled_by, \
     status, current_step, next_step_at, emails_sent, emails_opened, emails_clicked, \
     emails_replied, tasks_created, exit_reason, exited_at, paused_at, claimed_by, \
     claimed_until, enrolled_at, updated_at";

/// PostgreSQL-backed store. Cheap to clone; wraps a shared pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Raw enrollment row. `status` stays a string until checked against the
/// state machine's vocabulary.
#[derive(Debug, FromRow)]
struct EnrollmentRow {
    id: i64,
    sequence_id: i64,
    contact_id: i64,
    deal_id: Option<i64>,
    client_id: Option<i64>,
    enrolled_by: Option<i64>,
    status: String,
    current_step: i32,
    next_step_at: Option<DateTime<Utc>>,
    emails_sent: i32,
    emails_opened: i32,
    emails_clicked: i32,
    emails_replied: i32,
    tasks_created: i32,
    exit_reason: Option<String>,
    exited_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    claimed_by: Option<String>,
    claimed_until: Option<DateTime<Utc>>,
    enrolled_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = StoreError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let status =
            EnrollmentStatus::from_str(&row.status).map_err(|reason| StoreError::Corrupt {
                entity: "enrollment",
                id: row.id,
                reason,
            })?;

        Ok(Enrollment {
            id: row.id,
            sequence_id: row.sequence_id,
            contact_id: row.contact_id,
            deal_id: row.deal_id,
            client_id: row.client_id,
            enrolled_by: row.enrolled_by,
            status,
            current_step: row.current_step,
            next_step_at: row.next_step_at,
            emails_sent: row.emails_sent,
            emails_opened: row.emails_opened,
            emails_clicked: row.emails_clicked,
            emails_replied: row.emails_replied,
            tasks_created: row.tasks_created,
            exit_reason: row.exit_reason,
            exited_at: row.exited_at,
            paused_at: row.paused_at,
            claimed_by: row.claimed_by,
            claimed_until: row.claimed_until,
            enrolled_at: row.enrolled_at,
            updated_at: row.updated_at,
        })
    }
}

/// Enrollment counter column bumped when a step of `step_type` completes.
/// Unknown types complete without touching a counter.
fn completion_counter_column(step_type: &str) -> Option<&'static str> {
    match step_type {
        crate::constants::step_types::EMAIL => Some("emails_sent"),
        crate::constants::step_types::TASK | crate::constants::step_types::LINKEDIN => {
            Some("tasks_created")
        }
        _ => None,
    }
}

fn engagement_column(event: EngagementEvent) -> &'static str {
    match event {
        EngagementEvent::Opened => "emails_opened",
        EngagementEvent::Clicked => "emails_clicked",
        EngagementEvent::Replied => "emails_replied",
    }
}

#[async_trait]
impl SequenceStore for PgStore {
    async fn sequence_by_id(&self, id: i64) -> Result<Option<Sequence>, StoreError> {
        let sequence = sqlx::query_as::<_, Sequence>(
            r#"
            SELECT id, name, description, active,
                   exit_on_reply, exit_on_meeting_booked, exit_on_deal_won, exit_on_deal_lost,
                   sending_hours_start, sending_hours_end, send_on_weekends,
                   active_enrolled, completed_count, created_by, created_at, updated_at
            FROM cadence_sequences
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sequence)
    }

    async fn steps_for_sequence(
        &self,
        sequence_id: i64,
    ) -> Result<Vec<SequenceStep>, StoreError> {
        let steps = sqlx::query_as::<_, SequenceStep>(
            r#"
            SELECT id, sequence_id, step_order, step_type, payload,
                   delay_days, delay_hours, created_at, updated_at
            FROM cadence_sequence_steps
            WHERE sequence_id = $1
            ORDER BY step_order ASC
            "#,
        )
        .bind(sequence_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(steps)
    }

    async fn step_at_order(
        &self,
        sequence_id: i64,
        step_order: i32,
    ) -> Result<Option<SequenceStep>, StoreError> {
        let step = sqlx::query_as::<_, SequenceStep>(
            r#"
            SELECT id, sequence_id, step_order, step_type, payload,
                   delay_days, delay_hours, created_at, updated_at
            FROM cadence_sequence_steps
            WHERE sequence_id = $1 AND step_order = $2
            "#,
        )
        .bind(sequence_id)
        .bind(step_order)
        .fetch_optional(&self.pool)
        .await?;

        Ok(step)
    }

    async fn adjust_sequence_counters(
        &self,
        sequence_id: i64,
        active_delta: i32,
        completed_delta: i32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_sequences
            SET active_enrolled = GREATEST(active_enrolled + $2, 0),
                completed_count = GREATEST(completed_count + $3, 0),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sequence_id)
        .bind(active_delta)
        .bind(completed_delta)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "sequence",
                id: sequence_id,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, StoreError> {
        let query =
            format!("SELECT {ENROLLMENT_COLUMNS} FROM cadence_enrollments WHERE id = $1");

        let row = sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Enrollment::try_from).transpose()
    }

    async fn insert_enrollment(&self, new: NewEnrollment) -> Result<Enrollment, StoreError> {
        let query = format!(
            r#"
            INSERT INTO cadence_enrollments
                (sequence_id, contact_id, deal_id, client_id, enrolled_by,
                 status, current_step, next_step_at)
            VALUES ($1, $2, $3, $4, $5, 'active', $6, $7)
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(new.sequence_id)
            .bind(new.contact_id)
            .bind(new.deal_id)
            .bind(new.client_id)
            .bind(new.enrolled_by)
            .bind(new.current_step)
            .bind(new.next_step_at)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn open_enrollment_for(
        &self,
        sequence_id: i64,
        contact_id: i64,
    ) -> Result<Option<Enrollment>, StoreError> {
        let query = format!(
            r#"
            SELECT {ENROLLMENT_COLUMNS}
            FROM cadence_enrollments
            WHERE sequence_id = $1
              AND contact_id = $2
              AND status IN ('active', 'paused')
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(sequence_id)
            .bind(contact_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Enrollment::try_from).transpose()
    }

    #[instrument(skip(self), fields(runner_id = %runner_id))]
    async fn claim_due(
        &self,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_seconds: i64,
        limit: i64,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let claimed_until = now + Duration::seconds(lease_seconds);

        let query = format!(
            r#"
            UPDATE cadence_enrollments
            SET claimed_by = $1, claimed_until = $2, updated_at = NOW()
            WHERE id IN (
                SELECT id
                FROM cadence_enrollments
                WHERE status = 'active'
                  AND next_step_at IS NOT NULL
                  AND next_step_at <= $3
                  AND (claimed_until IS NULL OR claimed_until <= $3)
                ORDER BY next_step_at ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        );

        let rows = sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(runner_id)
            .bind(claimed_until)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut claimed = rows
            .into_iter()
            .map(Enrollment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        // RETURNING does not preserve the subquery order
        claimed.sort_by_key(|e| e.next_step_at);

        debug!(claimed_count = claimed.len(), "Claimed due enrollments");

        Ok(claimed)
    }

    #[instrument(skip(self), fields(runner_id = %runner_id))]
    async fn release_claim(
        &self,
        enrollment_id: i64,
        runner_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET claimed_by = NULL, claimed_until = NULL, updated_at = NOW()
            WHERE id = $1 AND claimed_by = $2
            "#,
        )
        .bind(enrollment_id)
        .bind(runner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn advance(
        &self,
        enrollment_id: i64,
        next_step: i32,
        next_step_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET current_step = $2, next_step_at = $3,
                claimed_by = NULL, claimed_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(next_step)
        .bind(next_step_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn mark_completed(&self, enrollment_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET status = 'completed', next_step_at = NULL,
                claimed_by = NULL, claimed_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn mark_paused(
        &self,
        enrollment_id: i64,
        paused_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET status = 'paused', paused_at = $2, next_step_at = NULL,
                claimed_by = NULL, claimed_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(paused_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn mark_resumed(
        &self,
        enrollment_id: i64,
        next_step_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET status = 'active', paused_at = NULL, next_step_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(next_step_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn mark_exited(
        &self,
        enrollment_id: i64,
        reason: &str,
        exited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_enrollments
            SET status = 'exited', exit_reason = $2, exited_at = $3, next_step_at = NULL,
                claimed_by = NULL, claimed_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(reason)
        .bind(exited_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn has_completed_step(
        &self,
        enrollment_id: i64,
        step_order: i32,
    ) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM cadence_step_completions
                WHERE enrollment_id = $1 AND step_order = $2
            )
            "#,
        )
        .bind(enrollment_id)
        .bind(step_order)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn complete_step(&self, completion: NewStepCompletion) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO cadence_step_completions
                (enrollment_id, step_order, step_type, result, activity_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (enrollment_id, step_order) DO NOTHING
            "#,
        )
        .bind(completion.enrollment_id)
        .bind(completion.step_order)
        .bind(&completion.step_type)
        .bind(&completion.result)
        .bind(completion.activity_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            warn!(
                enrollment_id = completion.enrollment_id,
                step_order = completion.step_order,
                "Completion already recorded, suppressing duplicate"
            );
            return Ok(false);
        }

        if let Some(column) = completion_counter_column(&completion.step_type) {
            let query = format!(
                "UPDATE cadence_enrollments SET {column} = {column} + 1, updated_at = NOW() \
                 WHERE id = $1"
            );
            sqlx::query(&query)
                .bind(completion.enrollment_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn increment_engagement(
        &self,
        enrollment_id: i64,
        event: EngagementEvent,
    ) -> Result<(), StoreError> {
        let column = engagement_column(event);
        let query = format!(
            "UPDATE cadence_enrollments SET {column} = {column} + 1, updated_at = NOW() \
             WHERE id = $1"
        );

        let result = sqlx::query(&query)
            .bind(enrollment_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment_id,
            });
        }

        Ok(())
    }

    async fn completions_for(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<StepCompletion>, StoreError> {
        let completions = sqlx::query_as::<_, StepCompletion>(
            r#"
            SELECT id, enrollment_id, step_order, step_type, result, activity_id, completed_at
            FROM cadence_step_completions
            WHERE enrollment_id = $1
            ORDER BY step_order ASC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(completions)
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn template_by_id(&self, id: i64) -> Result<Option<EmailTemplate>, StoreError> {
        let template = sqlx::query_as::<_, EmailTemplate>(
            r#"
            SELECT id, name, subject, body, usage_count, last_used_at, created_at, updated_at
            FROM cadence_email_templates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(template)
    }

    async fn record_usage(&self, id: i64, used_at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cadence_email_templates
            SET usage_count = usage_count + 1, last_used_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(used_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "email_template",
                id,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ActivitySink for PgStore {
    async fn create_activity(&self, activity: NewActivity) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO cadence_activities
                (activity_type, title, description, contact_id, client_id, deal_id,
                 owner_id, status, due_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&activity.activity_type)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(activity.contact_id)
        .bind(activity.client_id)
        .bind(activity.deal_id)
        .bind(activity.owner_id)
        .bind(&activity.status)
        .bind(activity.due_at)
        .bind(&activity.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn activities_for_enrollment(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, title, description, contact_id, client_id, deal_id,
                   owner_id, status, due_at, metadata, created_at
            FROM cadence_activities
            WHERE (metadata ->> 'enrollment_id')::BIGINT = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }
}

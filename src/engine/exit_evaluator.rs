//! # Exit-Condition Evaluator
//!
//! Applies a sequence's exit policy when engagement or deal events arrive.
//! An exit that the policy declines is a normal outcome (`Ok(false)`), not an
//! error: sequences legitimately ignore events their flags do not cover.
//!
//! Reply counting lives here too: `check_exit` with
//! [`ExitEvent::EmailReplied`] bumps `emails_replied` exactly once before the
//! policy gate, whether or not an exit follows. Callers that have already
//! counted the reply (the engagement tracker) go through
//! [`ExitConditionEvaluator::evaluate_policy`] instead, so no entry path can
//! double-count.

use crate::constants::events;
use crate::engine::errors::EngineError;
use crate::events::EventPublisher;
use crate::models::Enrollment;
use crate::state_machine::{
    EngagementEvent, EnrollmentEvent, EnrollmentStateMachine, ExitEvent,
};
use crate::store::{EnrollmentStore, SequenceStore};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct ExitConditionEvaluator {
    enrollments: Arc<dyn EnrollmentStore>,
    sequences: Arc<dyn SequenceStore>,
    publisher: EventPublisher,
}

impl ExitConditionEvaluator {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        sequences: Arc<dyn SequenceStore>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            enrollments,
            sequences,
            publisher,
        }
    }

    /// Evaluate an exit event against an enrollment.
    ///
    /// Returns `Ok(true)` when the enrollment exited, `Ok(false)` when the
    /// event did not apply (enrollment missing or not active, or the
    /// sequence's policy does not cover the event).
    #[instrument(skip(self), fields(event = %event.event_type()))]
    pub async fn check_exit(
        &self,
        enrollment_id: i64,
        event: ExitEvent,
    ) -> Result<bool, EngineError> {
        let Some(enrollment) = self.enrollments.enrollment_by_id(enrollment_id).await? else {
            debug!(enrollment_id, "Exit event for unknown enrollment, ignoring");
            return Ok(false);
        };

        // A reply is engagement regardless of what the policy decides, and
        // regardless of enrollment status: late replies still count.
        if event == ExitEvent::EmailReplied {
            self.enrollments
                .increment_engagement(enrollment_id, EngagementEvent::Replied)
                .await?;
        }

        self.evaluate_policy(&enrollment, event).await
    }

    /// The policy gate without the reply counter bump.
    pub(crate) async fn evaluate_policy(
        &self,
        enrollment: &Enrollment,
        event: ExitEvent,
    ) -> Result<bool, EngineError> {
        if !enrollment.status.is_active() {
            return Ok(false);
        }

        let Some(sequence) = self
            .sequences
            .sequence_by_id(enrollment.sequence_id)
            .await?
        else {
            return Ok(false);
        };

        if !sequence.exits_on(&event) {
            return Ok(false);
        }

        let reason = event.default_reason();
        EnrollmentStateMachine::next_status(
            enrollment.status,
            &EnrollmentEvent::exit_with_reason(reason),
        )?;

        self.enrollments
            .mark_exited(enrollment.id, reason, Utc::now())
            .await?;
        self.sequences
            .adjust_sequence_counters(enrollment.sequence_id, -1, 0)
            .await?;

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_EXITED,
                enrollment.id,
                enrollment.sequence_id,
                json!({
                    "exit_reason": reason,
                    "trigger": event.event_type(),
                }),
            )
            .await?;

        info!(
            enrollment_id = enrollment.id,
            sequence_id = enrollment.sequence_id,
            exit_reason = reason,
            "Enrollment exited by policy"
        );

        Ok(true)
    }
}

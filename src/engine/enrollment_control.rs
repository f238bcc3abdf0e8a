//! # Enrollment Control
//!
//! Operator-facing lifecycle actions: enroll a contact, pause, resume, and
//! manual exit. Every action validates its transition through the state
//! machine first, so misuse (resuming an exited enrollment, pausing twice)
//! surfaces as [`EngineError::InvalidTransition`] rather than silent drift.

use crate::constants::events;
use crate::engine::errors::EngineError;
use crate::engine::step_scheduler::StepScheduler;
use crate::events::EventPublisher;
use crate::models::{Enrollment, NewEnrollment};
use crate::state_machine::{EnrollmentEvent, EnrollmentStateMachine};
use crate::store::{EnrollmentStore, SequenceStore, StoreError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Request to enroll a contact into a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRequest {
    pub sequence_id: i64,
    pub contact_id: i64,
    pub deal_id: Option<i64>,
    pub client_id: Option<i64>,
    pub enrolled_by: Option<i64>,
}

pub struct EnrollmentControl {
    enrollments: Arc<dyn EnrollmentStore>,
    sequences: Arc<dyn SequenceStore>,
    publisher: EventPublisher,
}

impl EnrollmentControl {
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

    /// Enroll a contact. The first step is scheduled from now through the
    /// sequence's sending window.
    ///
    /// Rejected when the sequence is missing or inactive, has no first step,
    /// or the contact already has an open (active or paused) enrollment in
    /// it.
    #[instrument(skip(self, request), fields(sequence_id = request.sequence_id, contact_id = request.contact_id))]
    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, EngineError> {
        let sequence = self
            .sequences
            .sequence_by_id(request.sequence_id)
            .await?
            .ok_or(EngineError::SequenceNotFound(request.sequence_id))?;
        if !sequence.active {
            return Err(EngineError::SequenceInactive(sequence.id));
        }

        let first_step = self
            .sequences
            .step_at_order(sequence.id, 1)
            .await?
            .ok_or(EngineError::StepMissing {
                sequence_id: sequence.id,
                step_order: 1,
            })?;

        if let Some(existing) = self
            .enrollments
            .open_enrollment_for(sequence.id, request.contact_id)
            .await?
        {
            warn!(
                enrollment_id = existing.id,
                "Contact already has an open enrollment"
            );
            return Err(EngineError::AlreadyEnrolled {
                sequence_id: sequence.id,
                contact_id: request.contact_id,
            });
        }

        let now = Utc::now();
        let next_step_at = StepScheduler::next_time(
            &sequence.sending_policy(),
            first_step.delay_days,
            first_step.delay_hours,
            now,
        );

        let enrollment = self
            .enrollments
            .insert_enrollment(NewEnrollment {
                sequence_id: sequence.id,
                contact_id: request.contact_id,
                deal_id: request.deal_id,
                client_id: request.client_id,
                enrolled_by: request.enrolled_by,
                current_step: 1,
                next_step_at: Some(next_step_at),
            })
            .await?;

        self.sequences
            .adjust_sequence_counters(sequence.id, 1, 0)
            .await?;

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_CREATED,
                enrollment.id,
                sequence.id,
                json!({
                    "contact_id": request.contact_id,
                    "next_step_at": next_step_at,
                }),
            )
            .await?;

        info!(
            enrollment_id = enrollment.id,
            next_step_at = %next_step_at,
            "Contact enrolled"
        );

        Ok(enrollment)
    }

    /// Pause an active enrollment. Scheduling stops until resumed.
    #[instrument(skip(self))]
    pub async fn pause(&self, enrollment_id: i64) -> Result<(), EngineError> {
        let enrollment = self.fetch(enrollment_id).await?;
        EnrollmentStateMachine::next_status(enrollment.status, &EnrollmentEvent::Pause)?;

        self.enrollments
            .mark_paused(enrollment_id, Utc::now())
            .await?;
        self.adjust_counters_if_present(enrollment.sequence_id, -1, 0)
            .await?;

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_PAUSED,
                enrollment_id,
                enrollment.sequence_id,
                json!({}),
            )
            .await?;

        info!(enrollment_id, "Enrollment paused");
        Ok(())
    }

    /// Resume a paused enrollment. The current step is rescheduled from now;
    /// the sequence must still be active and the step must still exist.
    #[instrument(skip(self))]
    pub async fn resume(&self, enrollment_id: i64) -> Result<(), EngineError> {
        let enrollment = self.fetch(enrollment_id).await?;
        EnrollmentStateMachine::next_status(enrollment.status, &EnrollmentEvent::Resume)?;

        let sequence = self
            .sequences
            .sequence_by_id(enrollment.sequence_id)
            .await?
            .ok_or(EngineError::SequenceNotFound(enrollment.sequence_id))?;
        if !sequence.active {
            return Err(EngineError::SequenceInactive(sequence.id));
        }

        let step = self
            .sequences
            .step_at_order(sequence.id, enrollment.current_step)
            .await?
            .ok_or(EngineError::StepMissing {
                sequence_id: sequence.id,
                step_order: enrollment.current_step,
            })?;

        let next_step_at = StepScheduler::next_time(
            &sequence.sending_policy(),
            step.delay_days,
            step.delay_hours,
            Utc::now(),
        );

        self.enrollments
            .mark_resumed(enrollment_id, Some(next_step_at))
            .await?;
        self.sequences
            .adjust_sequence_counters(sequence.id, 1, 0)
            .await?;

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_RESUMED,
                enrollment_id,
                sequence.id,
                json!({ "next_step_at": next_step_at }),
            )
            .await?;

        info!(enrollment_id, next_step_at = %next_step_at, "Enrollment resumed");
        Ok(())
    }

    /// Exit an enrollment with an operator-supplied reason. Valid from both
    /// active and paused; the active counter only moves when leaving active.
    #[instrument(skip(self, reason))]
    pub async fn exit(&self, enrollment_id: i64, reason: &str) -> Result<(), EngineError> {
        let enrollment = self.fetch(enrollment_id).await?;
        let was_active = enrollment.status.is_active();
        EnrollmentStateMachine::next_status(
            enrollment.status,
            &EnrollmentEvent::exit_with_reason(reason),
        )?;

        self.enrollments
            .mark_exited(enrollment_id, reason, Utc::now())
            .await?;
        if was_active {
            self.adjust_counters_if_present(enrollment.sequence_id, -1, 0)
                .await?;
        }

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_EXITED,
                enrollment_id,
                enrollment.sequence_id,
                json!({
                    "exit_reason": reason,
                    "trigger": "manual",
                }),
            )
            .await?;

        info!(enrollment_id, exit_reason = reason, "Enrollment exited manually");
        Ok(())
    }

    async fn fetch(&self, enrollment_id: i64) -> Result<Enrollment, EngineError> {
        self.enrollments
            .enrollment_by_id(enrollment_id)
            .await?
            .ok_or(EngineError::EnrollmentNotFound(enrollment_id))
    }

    /// Counter adjustment that tolerates a deleted sequence: the enrollment
    /// action already happened, so a missing parent only costs the stat.
    async fn adjust_counters_if_present(
        &self,
        sequence_id: i64,
        active_delta: i32,
        completed_delta: i32,
    ) -> Result<(), EngineError> {
        match self
            .sequences
            .adjust_sequence_counters(sequence_id, active_delta, completed_delta)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                warn!(sequence_id, "Sequence missing, counters not adjusted");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

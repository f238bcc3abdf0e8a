//! # Sequence Coordinator
//!
//! The advancement loop. Each run claims a batch of due enrollments under a
//! lease, executes the current step of each, and either schedules the next
//! step, completes the enrollment, or pauses it when its sequence has gone
//! away. One bad enrollment never poisons the batch: every claimed item is
//! processed under per-item error isolation and failures release the claim
//! so the next run retries naturally.
//!
//! Hosts drive this from a periodic tick (cron, timer loop). `run_once` uses
//! the wall clock; `run_at` takes the clock as a parameter and is the entry
//! point the test suite uses.

use crate::config::EngineConfig;
use crate::constants::{events, system};
use crate::engine::errors::EngineError;
use crate::engine::step_executor::StepExecutor;
use crate::engine::step_scheduler::StepScheduler;
use crate::engine::types::{
    AdvancementReport, EnrollmentDisposition, EnrollmentRunDetail, StepOutcome,
};
use crate::events::EventPublisher;
use crate::models::{Enrollment, Sequence};
use crate::store::{EnrollmentStore, SequenceStore, StoreError};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Coordinator tuning. `runner_id` identifies this process in claims so a
/// fleet of runners can share one database.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub runner_id: String,
    pub batch_size: i64,
    pub claim_timeout_seconds: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            runner_id: format!("runner-{}", Uuid::new_v4()),
            batch_size: system::DEFAULT_BATCH_SIZE,
            claim_timeout_seconds: system::DEFAULT_CLAIM_TIMEOUT_SECONDS,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            claim_timeout_seconds: config.claim_timeout_seconds,
            ..Self::default()
        }
    }
}

pub struct SequenceCoordinator {
    enrollments: Arc<dyn EnrollmentStore>,
    sequences: Arc<dyn SequenceStore>,
    executor: Arc<StepExecutor>,
    publisher: EventPublisher,
    config: CoordinatorConfig,
}

impl SequenceCoordinator {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        sequences: Arc<dyn SequenceStore>,
        executor: Arc<StepExecutor>,
        publisher: EventPublisher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            enrollments,
            sequences,
            executor,
            publisher,
            config,
        }
    }

    pub fn runner_id(&self) -> &str {
        &self.config.runner_id
    }

    /// Run one advancement pass against the wall clock.
    pub async fn run_once(&self) -> Result<AdvancementReport, EngineError> {
        self.run_at(Utc::now()).await
    }

    /// Run one advancement pass treating `now` as the current time.
    #[instrument(skip(self), fields(runner_id = %self.config.runner_id))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<AdvancementReport, EngineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let claimed = self
            .enrollments
            .claim_due(
                &self.config.runner_id,
                now,
                self.config.claim_timeout_seconds,
                self.config.batch_size,
            )
            .await?;

        if claimed.is_empty() {
            debug!(run_id = %run_id, "No due enrollments");
        } else {
            info!(run_id = %run_id, claimed_count = claimed.len(), "Advancing claimed enrollments");
        }

        let mut details = Vec::with_capacity(claimed.len());
        for enrollment in &claimed {
            let detail = match self.advance_enrollment(enrollment, now).await {
                Ok(detail) => detail,
                Err(err) => {
                    error!(
                        enrollment_id = enrollment.id,
                        error = %err,
                        "Enrollment advancement failed, releasing claim"
                    );
                    self.release_quietly(enrollment.id).await;
                    EnrollmentRunDetail {
                        enrollment_id: enrollment.id,
                        contact_id: enrollment.contact_id,
                        step_order: enrollment.current_step,
                        disposition: EnrollmentDisposition::Error,
                        message: Some(err.to_string()),
                    }
                }
            };
            details.push(detail);
        }

        let errored = details
            .iter()
            .filter(|d| d.disposition == EnrollmentDisposition::Error)
            .count();
        let report = AdvancementReport {
            run_id,
            runner_id: self.config.runner_id.clone(),
            started_at,
            finished_at: Utc::now(),
            claimed: claimed.len(),
            processed: details.len() - errored,
            errored,
            details,
        };

        self.publisher
            .publish(
                events::ADVANCEMENT_RUN_COMPLETED,
                json!({
                    "run_id": report.run_id,
                    "runner_id": report.runner_id,
                    "claimed": report.claimed,
                    "processed": report.processed,
                    "errored": report.errored,
                }),
            )
            .await?;

        info!(summary = %report.summary(), "Advancement run finished");
        Ok(report)
    }

    async fn advance_enrollment(
        &self,
        enrollment: &Enrollment,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRunDetail, EngineError> {
        let sequence = self
            .sequences
            .sequence_by_id(enrollment.sequence_id)
            .await?;

        let sequence = match sequence {
            Some(sequence) if sequence.active => sequence,
            other => return self.pause_orphaned(enrollment, other.is_some()).await,
        };

        let step = self
            .sequences
            .step_at_order(sequence.id, enrollment.current_step)
            .await?;
        let Some(step) = step else {
            // current_step points past the defined steps; nothing left to run
            return self
                .complete(
                    enrollment,
                    &sequence,
                    Some(format!(
                        "no step at position {}",
                        enrollment.current_step
                    )),
                )
                .await;
        };

        let outcome = self
            .executor
            .execute(enrollment, &sequence, &step, now)
            .await?;

        if let StepOutcome::Failed { message } = outcome {
            warn!(
                enrollment_id = enrollment.id,
                step_order = step.step_order,
                message = %message,
                "Step failed, leaving enrollment for retry"
            );
            self.enrollments
                .release_claim(enrollment.id, &self.config.runner_id)
                .await?;
            self.publisher
                .publish_enrollment(
                    events::ENROLLMENT_STEP_FAILED,
                    enrollment.id,
                    sequence.id,
                    json!({
                        "step_order": step.step_order,
                        "message": message,
                    }),
                )
                .await?;
            return Ok(self.detail(enrollment, EnrollmentDisposition::Error, Some(message)));
        }

        let note = match outcome {
            StepOutcome::Executed { message, .. } => message,
            _ => None,
        };

        let next_order = enrollment.current_step + 1;
        match self.sequences.step_at_order(sequence.id, next_order).await? {
            Some(next_step) => {
                let next_step_at = StepScheduler::next_time(
                    &sequence.sending_policy(),
                    next_step.delay_days,
                    next_step.delay_hours,
                    now,
                );
                self.enrollments
                    .advance(enrollment.id, next_order, next_step_at)
                    .await?;
                self.publisher
                    .publish_enrollment(
                        events::ENROLLMENT_ADVANCED,
                        enrollment.id,
                        sequence.id,
                        json!({
                            "current_step": next_order,
                            "next_step_at": next_step_at,
                        }),
                    )
                    .await?;
                debug!(
                    enrollment_id = enrollment.id,
                    next_step = next_order,
                    next_step_at = %next_step_at,
                    "Enrollment advanced"
                );
                Ok(self.detail(enrollment, EnrollmentDisposition::Advanced, note))
            }
            None => self.complete(enrollment, &sequence, None).await,
        }
    }

    /// Pause an enrollment whose sequence is gone or deactivated. The counter
    /// only moves when the sequence row still exists.
    async fn pause_orphaned(
        &self,
        enrollment: &Enrollment,
        sequence_exists: bool,
    ) -> Result<EnrollmentRunDetail, EngineError> {
        let cause = if sequence_exists {
            "sequence_inactive"
        } else {
            "sequence_missing"
        };
        warn!(
            enrollment_id = enrollment.id,
            sequence_id = enrollment.sequence_id,
            cause,
            "Pausing enrollment"
        );

        self.enrollments
            .mark_paused(enrollment.id, Utc::now())
            .await?;
        if sequence_exists {
            self.adjust_counters_if_present(enrollment.sequence_id, -1, 0)
                .await?;
        }

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_PAUSED,
                enrollment.id,
                enrollment.sequence_id,
                json!({ "cause": cause }),
            )
            .await?;

        Ok(self.detail(
            enrollment,
            EnrollmentDisposition::Paused,
            Some(format!("sequence {} {}", enrollment.sequence_id, cause)),
        ))
    }

    async fn complete(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        message: Option<String>,
    ) -> Result<EnrollmentRunDetail, EngineError> {
        self.enrollments.mark_completed(enrollment.id).await?;
        self.adjust_counters_if_present(sequence.id, -1, 1).await?;

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_COMPLETED,
                enrollment.id,
                sequence.id,
                json!({ "final_step": enrollment.current_step }),
            )
            .await?;

        info!(enrollment_id = enrollment.id, "Enrollment completed");
        Ok(self.detail(enrollment, EnrollmentDisposition::Completed, message))
    }

    fn detail(
        &self,
        enrollment: &Enrollment,
        disposition: EnrollmentDisposition,
        message: Option<String>,
    ) -> EnrollmentRunDetail {
        EnrollmentRunDetail {
            enrollment_id: enrollment.id,
            contact_id: enrollment.contact_id,
            step_order: enrollment.current_step,
            disposition,
            message,
        }
    }

    async fn release_quietly(&self, enrollment_id: i64) {
        if let Err(err) = self
            .enrollments
            .release_claim(enrollment_id, &self.config.runner_id)
            .await
        {
            // The lease expiry will recover the claim either way.
            error!(enrollment_id, error = %err, "Failed to release claim");
        }
    }

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

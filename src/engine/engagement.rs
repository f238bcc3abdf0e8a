//! # Engagement Metrics Updater
//!
//! Applies open, click, and reply signals from the host's email pipeline to
//! enrollment counters. Counting is unconditional: a contact opening an email
//! a week after their enrollment completed is still an open worth recording.
//!
//! A reply is the one signal that can also end the enrollment. The tracker
//! counts it here, then hands the already-counted enrollment to the exit
//! evaluator's policy gate, so a single reply can never increment
//! `emails_replied` twice no matter which path delivered it.

use crate::constants::events;
use crate::engine::errors::EngineError;
use crate::engine::exit_evaluator::ExitConditionEvaluator;
use crate::events::EventPublisher;
use crate::state_machine::EngagementEvent;
use crate::store::EnrollmentStore;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct EngagementTracker {
    enrollments: Arc<dyn EnrollmentStore>,
    evaluator: Arc<ExitConditionEvaluator>,
    publisher: EventPublisher,
}

impl EngagementTracker {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        evaluator: Arc<ExitConditionEvaluator>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            enrollments,
            evaluator,
            publisher,
        }
    }

    /// Record an engagement signal. Returns whether the signal caused the
    /// enrollment to exit (possible only for replies).
    #[instrument(skip(self), fields(engagement = %event.event_type()))]
    pub async fn record(
        &self,
        enrollment_id: i64,
        event: EngagementEvent,
    ) -> Result<bool, EngineError> {
        let Some(enrollment) = self.enrollments.enrollment_by_id(enrollment_id).await? else {
            debug!(enrollment_id, "Engagement for unknown enrollment, ignoring");
            return Ok(false);
        };

        self.enrollments
            .increment_engagement(enrollment_id, event)
            .await?;

        self.publisher
            .publish_enrollment(
                events::ENGAGEMENT_RECORDED,
                enrollment.id,
                enrollment.sequence_id,
                json!({ "engagement": event.event_type() }),
            )
            .await?;

        // The reply counter is already bumped; the policy gate must not bump
        // it again.
        match event.as_exit_event() {
            Some(exit_event) => self.evaluator.evaluate_policy(&enrollment, exit_event).await,
            None => Ok(false),
        }
    }
}

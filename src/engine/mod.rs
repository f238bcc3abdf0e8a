//! # Sequence Engine
//!
//! Execution core for CRM outreach sequences: the host application defines
//! sequences and their steps, and this engine moves enrollments through them.
//!
//! ## Architecture
//!
//! The engine follows a **staged side-effect architecture**:
//! - **Rust provides the execution core**: Scheduling, claiming, step
//!   execution, and exit policy evaluation
//! - **The host CRM handles delivery**: Staged `pending` activities are the
//!   hand-off; the engine never talks to an email or LinkedIn provider
//! - **The completion log provides idempotency**: An append-only audit trail
//!   with one row per (enrollment, step) is the source of truth for what has
//!   already run
//!
//! ## Core Components
//!
//! - **SequenceCoordinator**: Advancement loop that claims due enrollments
//!   and drives them forward with per-item error isolation
//! - **StepExecutor**: Executes one step (email, task, LinkedIn) and stages
//!   its activity
//! - **StepScheduler**: Delay arithmetic, sending-window clamping, weekend
//!   shifts
//! - **TemplateResolver**: Fixed-table `{{...}}` placeholder substitution
//! - **ExitConditionEvaluator**: Applies a sequence's exit policy to reply,
//!   meeting, and deal events
//! - **EngagementTracker**: Counts opens, clicks, and replies; replies feed
//!   the exit policy
//! - **EnrollmentControl**: Operator actions (enroll, pause, resume, manual
//!   exit) validated through the enrollment state machine
//!
//! [`SequenceEngine`] wires all of the above over the storage ports and a
//! shared event publisher.

pub mod coordinator;
pub mod engagement;
pub mod enrollment_control;
pub mod errors;
pub mod exit_evaluator;
pub mod step_executor;
pub mod step_scheduler;
pub mod template_resolver;
pub mod types;

pub use coordinator::{CoordinatorConfig, SequenceCoordinator};
pub use engagement::EngagementTracker;
pub use enrollment_control::{EnrollmentControl, EnrollmentRequest};
pub use errors::EngineError;
pub use exit_evaluator::ExitConditionEvaluator;
pub use step_executor::StepExecutor;
pub use step_scheduler::StepScheduler;
pub use template_resolver::{RenderContext, TemplateResolver};
pub use types::{AdvancementReport, EnrollmentDisposition, EnrollmentRunDetail, StepOutcome};

use crate::config::EngineConfig;
use crate::events::EventPublisher;
use crate::models::Enrollment;
use crate::state_machine::{EngagementEvent, ExitEvent};
use crate::store::{ActivitySink, CrmDirectory, EnrollmentStore, SequenceStore, TemplateStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Facade over the full engine: one construction point, delegating methods
/// for every operation the host calls.
pub struct SequenceEngine {
    control: EnrollmentControl,
    coordinator: SequenceCoordinator,
    evaluator: Arc<ExitConditionEvaluator>,
    tracker: EngagementTracker,
    publisher: EventPublisher,
}

impl SequenceEngine {
    pub fn new(
        sequences: Arc<dyn SequenceStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        crm: Arc<dyn CrmDirectory>,
        templates: Arc<dyn TemplateStore>,
        activities: Arc<dyn ActivitySink>,
        config: &EngineConfig,
    ) -> Self {
        let coordinator_config = CoordinatorConfig::from_config(config);
        Self::with_coordinator_config(
            sequences,
            enrollments,
            crm,
            templates,
            activities,
            config,
            coordinator_config,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_coordinator_config(
        sequences: Arc<dyn SequenceStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        crm: Arc<dyn CrmDirectory>,
        templates: Arc<dyn TemplateStore>,
        activities: Arc<dyn ActivitySink>,
        config: &EngineConfig,
        coordinator_config: CoordinatorConfig,
    ) -> Self {
        let publisher = EventPublisher::new(config.event_capacity);
        let resolver = TemplateResolver::new(config.default_currency.clone());

        let executor = Arc::new(StepExecutor::new(
            enrollments.clone(),
            crm,
            templates,
            activities,
            resolver,
            publisher.clone(),
        ));
        let evaluator = Arc::new(ExitConditionEvaluator::new(
            enrollments.clone(),
            sequences.clone(),
            publisher.clone(),
        ));
        let tracker = EngagementTracker::new(
            enrollments.clone(),
            evaluator.clone(),
            publisher.clone(),
        );
        let control =
            EnrollmentControl::new(enrollments.clone(), sequences.clone(), publisher.clone());
        let coordinator = SequenceCoordinator::new(
            enrollments,
            sequences,
            executor,
            publisher.clone(),
            coordinator_config,
        );

        Self {
            control,
            coordinator,
            evaluator,
            tracker,
            publisher,
        }
    }

    /// Event stream shared by every component. Subscribe before triggering
    /// work to observe its events.
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn runner_id(&self) -> &str {
        self.coordinator.runner_id()
    }

    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, EngineError> {
        self.control.enroll(request).await
    }

    pub async fn pause(&self, enrollment_id: i64) -> Result<(), EngineError> {
        self.control.pause(enrollment_id).await
    }

    pub async fn resume(&self, enrollment_id: i64) -> Result<(), EngineError> {
        self.control.resume(enrollment_id).await
    }

    pub async fn exit(&self, enrollment_id: i64, reason: &str) -> Result<(), EngineError> {
        self.control.exit(enrollment_id, reason).await
    }

    /// One advancement pass against the wall clock.
    pub async fn run_once(&self) -> Result<AdvancementReport, EngineError> {
        self.coordinator.run_once().await
    }

    /// One advancement pass treating `now` as the current time.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<AdvancementReport, EngineError> {
        self.coordinator.run_at(now).await
    }

    /// Apply an exit event (reply, meeting, deal outcome). Returns whether
    /// the enrollment exited.
    pub async fn check_exit(
        &self,
        enrollment_id: i64,
        event: ExitEvent,
    ) -> Result<bool, EngineError> {
        self.evaluator.check_exit(enrollment_id, event).await
    }

    /// Record an engagement signal. Returns whether it triggered an exit.
    pub async fn record_engagement(
        &self,
        enrollment_id: i64,
        event: EngagementEvent,
    ) -> Result<bool, EngineError> {
        self.tracker.record(enrollment_id, event).await
    }
}

//! # Step Executor
//!
//! Runs one sequence step for one enrollment: resolves copy, stages the
//! side-effecting activity for the host CRM, and records the completion in
//! the append-only audit log. The executor never sends anything itself; a
//! staged `pending` activity is the hand-off point to the host's delivery
//! pipeline.
//!
//! ## Idempotency
//!
//! The completion log is the source of truth for "has this step already
//! run". A pre-check short-circuits to [`StepOutcome::AlreadyCompleted`]
//! before any side effect; the log's uniqueness on (enrollment, step_order)
//! closes the race two concurrent executors could still hit between check
//! and insert. Losing that race is reported as success with a note, since
//! exactly one execution was recorded either way.

use crate::constants::{events, step_results};
use crate::engine::errors::EngineError;
use crate::engine::template_resolver::{RenderContext, TemplateResolver};
use crate::engine::types::StepOutcome;
use crate::events::EventPublisher;
use crate::models::{
    Contact, Enrollment, LinkedinAction, NewActivity, NewStepCompletion, Sequence, SequenceStep,
    StepDetails,
};
use crate::store::{ActivitySink, CrmDirectory, EnrollmentStore, TemplateStore};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A step staged for completion: the activity to create, the result label to
/// audit, and the template whose usage should be recorded afterwards.
struct StagedStep {
    activity: NewActivity,
    result: &'static str,
    used_template: Option<i64>,
}

pub struct StepExecutor {
    enrollments: Arc<dyn EnrollmentStore>,
    crm: Arc<dyn CrmDirectory>,
    templates: Arc<dyn TemplateStore>,
    activities: Arc<dyn ActivitySink>,
    resolver: TemplateResolver,
    publisher: EventPublisher,
}

impl StepExecutor {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        crm: Arc<dyn CrmDirectory>,
        templates: Arc<dyn TemplateStore>,
        activities: Arc<dyn ActivitySink>,
        resolver: TemplateResolver,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            enrollments,
            crm,
            templates,
            activities,
            resolver,
            publisher,
        }
    }

    /// Execute `step` for `enrollment`.
    ///
    /// `Failed` outcomes (missing contact, unparseable payload) leave the
    /// enrollment untouched so the next advancement run retries naturally.
    /// `Err` means a store or publisher fault and carries no partial state:
    /// the caller isolates it per enrollment.
    #[instrument(skip_all, fields(enrollment_id = enrollment.id, step_order = step.step_order, step_type = %step.step_type))]
    pub async fn execute(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        step: &SequenceStep,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, EngineError> {
        if self
            .enrollments
            .has_completed_step(enrollment.id, step.step_order)
            .await?
        {
            debug!("Step already completed, skipping");
            return Ok(StepOutcome::AlreadyCompleted);
        }

        let details = match step.details() {
            Ok(details) => details,
            Err(err) => {
                return Ok(StepOutcome::Failed {
                    message: err.to_string(),
                })
            }
        };

        let Some(contact) = self.crm.contact_by_id(enrollment.contact_id).await? else {
            return Ok(StepOutcome::Failed {
                message: format!("Contact {} not found", enrollment.contact_id),
            });
        };

        let client = match enrollment.client_id.or(contact.client_id) {
            Some(id) => self.crm.client_by_id(id).await?,
            None => None,
        };
        let deal = match enrollment.deal_id {
            Some(id) => self.crm.deal_by_id(id).await?,
            None => None,
        };
        let user = match enrollment.enrolled_by {
            Some(id) => self.crm.user_by_id(id).await?,
            None => None,
        };

        let ctx = RenderContext::at(now)
            .with_contact(Some(&contact))
            .with_client(client.as_ref())
            .with_deal(deal.as_ref())
            .with_user(user.as_ref());

        let staged = match details {
            StepDetails::Email {
                subject,
                body,
                template_id,
            } => {
                self.stage_email(enrollment, sequence, step, subject, body, template_id, &ctx)
                    .await?
            }
            StepDetails::Task { title, description } => {
                self.stage_task(enrollment, sequence, step, title, description, &ctx, now)
            }
            StepDetails::Linkedin { action, message } => self.stage_linkedin(
                enrollment, sequence, step, &contact, action, message, &ctx, now,
            ),
        };

        let result = staged.result;
        let used_template = staged.used_template;
        let activity_id = self.activities.create_activity(staged.activity).await?;

        let recorded = self
            .enrollments
            .complete_step(NewStepCompletion {
                enrollment_id: enrollment.id,
                step_order: step.step_order,
                step_type: step.step_type.clone(),
                result: result.to_string(),
                activity_id: Some(activity_id),
            })
            .await?;

        // Usage stats are best-effort; a failure here must not fail the step.
        if let Some(template_id) = used_template {
            if let Err(err) = self.templates.record_usage(template_id, now).await {
                warn!(template_id, error = %err, "Failed to record template usage");
            }
        }

        self.publisher
            .publish_enrollment(
                events::ENROLLMENT_STEP_COMPLETED,
                enrollment.id,
                sequence.id,
                json!({
                    "step_order": step.step_order,
                    "step_type": step.step_type,
                    "result": result,
                    "activity_id": activity_id,
                }),
            )
            .await?;

        let message = if recorded {
            None
        } else {
            Some("duplicate completion suppressed".to_string())
        };

        Ok(StepOutcome::Executed {
            result: result.to_string(),
            activity_id: Some(activity_id),
            message,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_email(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        step: &SequenceStep,
        inline_subject: String,
        inline_body: String,
        template_id: Option<i64>,
        ctx: &RenderContext<'_>,
    ) -> Result<StagedStep, EngineError> {
        let mut used_template = None;
        let (subject, body) = match template_id {
            Some(id) => match self.templates.template_by_id(id).await? {
                Some(template) => {
                    used_template = Some(id);
                    (template.subject, template.body)
                }
                None => {
                    warn!(
                        template_id = id,
                        "Email template missing, falling back to inline step copy"
                    );
                    (inline_subject, inline_body)
                }
            },
            None => (inline_subject, inline_body),
        };

        let mut metadata = provenance(enrollment, sequence, step);
        if let Some(id) = used_template {
            metadata["template_id"] = json!(id);
        }

        let activity = NewActivity::email(
            self.resolver.resolve(&subject, ctx),
            self.resolver.resolve(&body, ctx),
        )
        .for_contact(enrollment.contact_id)
        .for_client(enrollment.client_id)
        .for_deal(enrollment.deal_id)
        .owned_by(enrollment.enrolled_by)
        .with_metadata(metadata);

        Ok(StagedStep {
            activity,
            result: step_results::SENT,
            used_template,
        })
    }

    fn stage_task(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        step: &SequenceStep,
        title: String,
        description: Option<String>,
        ctx: &RenderContext<'_>,
        now: DateTime<Utc>,
    ) -> StagedStep {
        let activity = NewActivity::task(
            self.resolver.resolve(&title, ctx),
            description.map(|text| self.resolver.resolve(&text, ctx)),
            now,
        )
        .for_contact(enrollment.contact_id)
        .for_client(enrollment.client_id)
        .for_deal(enrollment.deal_id)
        .owned_by(enrollment.enrolled_by)
        .with_metadata(provenance(enrollment, sequence, step));

        StagedStep {
            activity,
            result: step_results::TASK_CREATED,
            used_template: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stage_linkedin(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        step: &SequenceStep,
        contact: &Contact,
        action: LinkedinAction,
        message: Option<String>,
        ctx: &RenderContext<'_>,
        now: DateTime<Utc>,
    ) -> StagedStep {
        let mut metadata = provenance(enrollment, sequence, step);
        metadata["linkedin_action"] = json!(action.as_str());

        let title = format!("{}: {}", action.task_label(), contact.full_name());
        let activity = NewActivity::task(
            title,
            message.map(|text| self.resolver.resolve(&text, ctx)),
            now,
        )
        .for_contact(enrollment.contact_id)
        .for_client(enrollment.client_id)
        .for_deal(enrollment.deal_id)
        .owned_by(enrollment.enrolled_by)
        .with_metadata(metadata);

        StagedStep {
            activity,
            result: step_results::TASK_CREATED,
            used_template: None,
        }
    }
}

fn provenance(enrollment: &Enrollment, sequence: &Sequence, step: &SequenceStep) -> serde_json::Value {
    json!({
        "auto_generated": true,
        "enrollment_id": enrollment.id,
        "sequence_id": sequence.id,
        "sequence_name": sequence.name,
        "step_order": step.step_order,
    })
}

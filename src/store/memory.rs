//! # In-Memory Store
//!
//! A complete implementation of every storage port over concurrent maps.
//! Backs the engine's test suite and embedded single-process use. Claim and
//! duplicate-suppression semantics match the PostgreSQL implementation so
//! coordinator behavior can be exercised without a database.

use super::{
    ActivitySink, CrmDirectory, EnrollmentStore, SequenceStore, StoreError, TemplateStore,
};
use crate::models::{
    Activity, Client, Contact, Deal, EmailTemplate, Enrollment, NewActivity, NewEnrollment,
    NewStepCompletion, Sequence, SequenceStep, StepCompletion, User,
};
use crate::state_machine::{EngagementEvent, EnrollmentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Shared-nothing test and embedded store. Cheap to clone via `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sequences: DashMap<i64, Sequence>,
    steps: DashMap<i64, SequenceStep>,
    enrollments: DashMap<i64, Enrollment>,
    // Keyed by (enrollment_id, step_order): the map key is the uniqueness
    // constraint of the completion log.
    completions: DashMap<(i64, i32), StepCompletion>,
    activities: DashMap<i64, Activity>,
    templates: DashMap<i64, EmailTemplate>,
    contacts: DashMap<i64, Contact>,
    clients: DashMap<i64, Client>,
    deals: DashMap<i64, Deal>,
    users: DashMap<i64, User>,
    next_id: Mutex<i64>,
    // Serializes claim batches; DashMap iteration alone is not atomic.
    claim_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Self::default()
        }
    }

    /// Allocate a fresh id for seeded rows.
    pub fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock();
        let id = *next;
        *next += 1;
        id
    }

    pub fn put_sequence(&self, sequence: Sequence) {
        self.sequences.insert(sequence.id, sequence);
    }

    pub fn put_step(&self, step: SequenceStep) {
        self.steps.insert(step.id, step);
    }

    pub fn put_contact(&self, contact: Contact) {
        self.contacts.insert(contact.id, contact);
    }

    pub fn remove_contact(&self, id: i64) {
        self.contacts.remove(&id);
    }

    pub fn put_client(&self, client: Client) {
        self.clients.insert(client.id, client);
    }

    pub fn put_deal(&self, deal: Deal) {
        self.deals.insert(deal.id, deal);
    }

    pub fn put_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn put_template(&self, template: EmailTemplate) {
        self.templates.insert(template.id, template);
    }

    pub fn template_snapshot(&self, id: i64) -> Option<EmailTemplate> {
        self.templates.get(&id).map(|t| t.clone())
    }

    pub fn sequence_snapshot(&self, id: i64) -> Option<Sequence> {
        self.sequences.get(&id).map(|s| s.clone())
    }

    pub fn enrollment_snapshot(&self, id: i64) -> Option<Enrollment> {
        self.enrollments.get(&id).map(|e| e.clone())
    }

    fn with_enrollment<F>(&self, id: i64, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Enrollment),
    {
        match self.enrollments.get_mut(&id) {
            Some(mut enrollment) => {
                apply(&mut enrollment);
                enrollment.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "enrollment",
                id,
            }),
        }
    }
}

#[async_trait]
impl SequenceStore for InMemoryStore {
    async fn sequence_by_id(&self, id: i64) -> Result<Option<Sequence>, StoreError> {
        Ok(self.sequences.get(&id).map(|s| s.clone()))
    }

    async fn steps_for_sequence(
        &self,
        sequence_id: i64,
    ) -> Result<Vec<SequenceStep>, StoreError> {
        let mut steps: Vec<SequenceStep> = self
            .steps
            .iter()
            .filter(|s| s.sequence_id == sequence_id)
            .map(|s| s.clone())
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn step_at_order(
        &self,
        sequence_id: i64,
        step_order: i32,
    ) -> Result<Option<SequenceStep>, StoreError> {
        Ok(self
            .steps
            .iter()
            .find(|s| s.sequence_id == sequence_id && s.step_order == step_order)
            .map(|s| s.clone()))
    }

    async fn adjust_sequence_counters(
        &self,
        sequence_id: i64,
        active_delta: i32,
        completed_delta: i32,
    ) -> Result<(), StoreError> {
        match self.sequences.get_mut(&sequence_id) {
            Some(mut sequence) => {
                sequence.active_enrolled = (sequence.active_enrolled + active_delta).max(0);
                sequence.completed_count = (sequence.completed_count + completed_delta).max(0);
                sequence.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "sequence",
                id: sequence_id,
            }),
        }
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.enrollments.get(&id).map(|e| e.clone()))
    }

    async fn insert_enrollment(&self, new: NewEnrollment) -> Result<Enrollment, StoreError> {
        let now = Utc::now();
        let enrollment = Enrollment {
            id: self.allocate_id(),
            sequence_id: new.sequence_id,
            contact_id: new.contact_id,
            deal_id: new.deal_id,
            client_id: new.client_id,
            enrolled_by: new.enrolled_by,
            status: EnrollmentStatus::Active,
            current_step: new.current_step,
            next_step_at: new.next_step_at,
            emails_sent: 0,
            emails_opened: 0,
            emails_clicked: 0,
            emails_replied: 0,
            tasks_created: 0,
            exit_reason: None,
            exited_at: None,
            paused_at: None,
            claimed_by: None,
            claimed_until: None,
            enrolled_at: now,
            updated_at: now,
        };
        self.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn open_enrollment_for(
        &self,
        sequence_id: i64,
        contact_id: i64,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .enrollments
            .iter()
            .find(|e| {
                e.sequence_id == sequence_id
                    && e.contact_id == contact_id
                    && !e.status.is_terminal()
            })
            .map(|e| e.clone()))
    }

    async fn claim_due(
        &self,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_seconds: i64,
        limit: i64,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let _guard = self.claim_lock.lock();

        let mut due: Vec<(i64, Option<DateTime<Utc>>)> = self
            .enrollments
            .iter()
            .filter(|e| e.is_due(now) && !e.is_claimed(now))
            .map(|e| (e.id, e.next_step_at))
            .collect();

        // Oldest due first, stable across runs
        due.sort_by_key(|(_, at)| at.unwrap_or(now));
        due.truncate(limit.max(0) as usize);

        let until = now + Duration::seconds(lease_seconds);
        let mut claimed = Vec::with_capacity(due.len());
        for (id, _) in due {
            if let Some(mut enrollment) = self.enrollments.get_mut(&id) {
                enrollment.claimed_by = Some(runner_id.to_string());
                enrollment.claimed_until = Some(until);
                enrollment.updated_at = Utc::now();
                claimed.push(enrollment.clone());
            }
        }

        Ok(claimed)
    }

    async fn release_claim(
        &self,
        enrollment_id: i64,
        runner_id: &str,
    ) -> Result<bool, StoreError> {
        match self.enrollments.get_mut(&enrollment_id) {
            Some(mut enrollment) => {
                if enrollment.claimed_by.as_deref() == Some(runner_id) {
                    enrollment.claimed_by = None;
                    enrollment.claimed_until = None;
                    enrollment.updated_at = Utc::now();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }

    async fn advance(
        &self,
        enrollment_id: i64,
        next_step: i32,
        next_step_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| {
            e.current_step = next_step;
            e.next_step_at = Some(next_step_at);
            e.claimed_by = None;
            e.claimed_until = None;
        })
    }

    async fn mark_completed(&self, enrollment_id: i64) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| {
            e.status = EnrollmentStatus::Completed;
            e.next_step_at = None;
            e.claimed_by = None;
            e.claimed_until = None;
        })
    }

    async fn mark_paused(
        &self,
        enrollment_id: i64,
        paused_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| {
            e.status = EnrollmentStatus::Paused;
            e.paused_at = Some(paused_at);
            e.next_step_at = None;
            e.claimed_by = None;
            e.claimed_until = None;
        })
    }

    async fn mark_resumed(
        &self,
        enrollment_id: i64,
        next_step_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| {
            e.status = EnrollmentStatus::Active;
            e.paused_at = None;
            e.next_step_at = next_step_at;
        })
    }

    async fn mark_exited(
        &self,
        enrollment_id: i64,
        reason: &str,
        exited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| {
            e.status = EnrollmentStatus::Exited;
            e.exit_reason = Some(reason.to_string());
            e.exited_at = Some(exited_at);
            e.next_step_at = None;
            e.claimed_by = None;
            e.claimed_until = None;
        })
    }

    async fn has_completed_step(
        &self,
        enrollment_id: i64,
        step_order: i32,
    ) -> Result<bool, StoreError> {
        Ok(self.completions.contains_key(&(enrollment_id, step_order)))
    }

    async fn complete_step(&self, completion: NewStepCompletion) -> Result<bool, StoreError> {
        let key = (completion.enrollment_id, completion.step_order);
        if self.completions.contains_key(&key) {
            return Ok(false);
        }

        let record = StepCompletion {
            id: self.allocate_id(),
            enrollment_id: completion.enrollment_id,
            step_order: completion.step_order,
            step_type: completion.step_type.clone(),
            result: completion.result.clone(),
            activity_id: completion.activity_id,
            completed_at: Utc::now(),
        };
        self.completions.insert(key, record);

        self.with_enrollment(completion.enrollment_id, |e| {
            match completion.step_type.as_str() {
                crate::constants::step_types::EMAIL => e.emails_sent += 1,
                crate::constants::step_types::TASK | crate::constants::step_types::LINKEDIN => {
                    e.tasks_created += 1
                }
                _ => {}
            }
        })?;

        Ok(true)
    }

    async fn increment_engagement(
        &self,
        enrollment_id: i64,
        event: EngagementEvent,
    ) -> Result<(), StoreError> {
        self.with_enrollment(enrollment_id, |e| match event {
            EngagementEvent::Opened => e.emails_opened += 1,
            EngagementEvent::Clicked => e.emails_clicked += 1,
            EngagementEvent::Replied => e.emails_replied += 1,
        })
    }

    async fn completions_for(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<StepCompletion>, StoreError> {
        let mut entries: Vec<StepCompletion> = self
            .completions
            .iter()
            .filter(|c| c.enrollment_id == enrollment_id)
            .map(|c| c.clone())
            .collect();
        entries.sort_by_key(|c| c.step_order);
        Ok(entries)
    }
}

#[async_trait]
impl CrmDirectory for InMemoryStore {
    async fn contact_by_id(&self, id: i64) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.get(&id).map(|c| c.clone()))
    }

    async fn client_by_id(&self, id: i64) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(&id).map(|c| c.clone()))
    }

    async fn deal_by_id(&self, id: i64) -> Result<Option<Deal>, StoreError> {
        Ok(self.deals.get(&id).map(|d| d.clone()))
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn template_by_id(&self, id: i64) -> Result<Option<EmailTemplate>, StoreError> {
        Ok(self.templates.get(&id).map(|t| t.clone()))
    }

    async fn record_usage(&self, id: i64, used_at: DateTime<Utc>) -> Result<(), StoreError> {
        match self.templates.get_mut(&id) {
            Some(mut template) => {
                template.usage_count += 1;
                template.last_used_at = Some(used_at);
                template.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "email_template",
                id,
            }),
        }
    }
}

#[async_trait]
impl ActivitySink for InMemoryStore {
    async fn create_activity(&self, activity: NewActivity) -> Result<i64, StoreError> {
        let id = self.allocate_id();
        let record = Activity {
            id,
            activity_type: activity.activity_type,
            title: activity.title,
            description: activity.description,
            contact_id: activity.contact_id,
            client_id: activity.client_id,
            deal_id: activity.deal_id,
            owner_id: activity.owner_id,
            status: activity.status,
            due_at: activity.due_at,
            metadata: activity.metadata,
            created_at: Utc::now(),
        };
        self.activities.insert(id, record);
        Ok(id)
    }

    async fn activities_for_enrollment(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut entries: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| a.metadata["enrollment_id"] == serde_json::json!(enrollment_id))
            .map(|a| a.clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

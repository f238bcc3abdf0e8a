//! Test data builders for sequences, CRM fixtures, and the engine harness.
//!
//! Every integration test assembles exactly the rows it needs against an
//! [`InMemoryStore`] and drives the engine through its public facade. The
//! store implements all five storage ports, so one `Arc` backs the whole
//! engine and tests can inspect state through its snapshot helpers.

#![allow(dead_code)]

use cadence_core::engine::{CoordinatorConfig, EnrollmentRequest};
use cadence_core::models::{
    Client, Contact, Deal, EmailTemplate, Enrollment, NewEnrollment, Sequence, SequenceStep, User,
};
use cadence_core::store::{EnrollmentStore, InMemoryStore};
use cadence_core::{EngineConfig, SequenceEngine};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

pub const TEST_RUNNER_ID: &str = "runner-test";

/// In-memory engine plus direct store access for seeding and assertions.
pub struct EngineHarness {
    pub store: Arc<InMemoryStore>,
    pub engine: SequenceEngine,
}

impl EngineHarness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let config = EngineConfig::for_testing();
        let coordinator = CoordinatorConfig {
            runner_id: TEST_RUNNER_ID.to_string(),
            batch_size: config.batch_size,
            claim_timeout_seconds: config.claim_timeout_seconds,
        };
        let engine = SequenceEngine::with_coordinator_config(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            &config,
            coordinator,
        );
        Self { store, engine }
    }

    /// Insert an active enrollment already positioned at `current_step` and
    /// due at `due_at`, bypassing enrollment-time scheduling. Used by tests
    /// that need a deterministic clock.
    pub async fn seed_due_enrollment(
        &self,
        sequence_id: i64,
        contact_id: i64,
        current_step: i32,
        due_at: DateTime<Utc>,
    ) -> Enrollment {
        self.store
            .insert_enrollment(NewEnrollment {
                sequence_id,
                contact_id,
                deal_id: None,
                client_id: None,
                enrolled_by: None,
                current_step,
                next_step_at: Some(due_at),
            })
            .await
            .expect("insert enrollment")
    }
}

/// Minimal enrollment request with no deal, client, or enrolling user.
pub fn request(sequence_id: i64, contact_id: i64) -> EnrollmentRequest {
    EnrollmentRequest {
        sequence_id,
        contact_id,
        deal_id: None,
        client_id: None,
        enrolled_by: None,
    }
}

struct StepSpec {
    step_type: &'static str,
    payload: serde_json::Value,
    delay_days: i32,
    delay_hours: i32,
}

/// Builder for a sequence and its ordered steps.
///
/// Defaults mirror the schema defaults: active, exits on reply, meeting, and
/// deal-won, 9-17 sending window, no weekend sends.
pub struct SequenceBuilder {
    name: String,
    active: bool,
    exit_on_reply: bool,
    exit_on_meeting_booked: bool,
    exit_on_deal_won: bool,
    exit_on_deal_lost: bool,
    sending_hours_start: i32,
    sending_hours_end: i32,
    send_on_weekends: bool,
    steps: Vec<StepSpec>,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self {
            name: "Outbound Push".to_string(),
            active: true,
            exit_on_reply: true,
            exit_on_meeting_booked: true,
            exit_on_deal_won: true,
            exit_on_deal_lost: false,
            sending_hours_start: 9,
            sending_hours_end: 17,
            send_on_weekends: false,
            steps: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn sending_hours(mut self, start: i32, end: i32) -> Self {
        self.sending_hours_start = start;
        self.sending_hours_end = end;
        self
    }

    pub fn send_on_weekends(mut self) -> Self {
        self.send_on_weekends = true;
        self
    }

    pub fn exit_flags(mut self, reply: bool, meeting: bool, won: bool, lost: bool) -> Self {
        self.exit_on_reply = reply;
        self.exit_on_meeting_booked = meeting;
        self.exit_on_deal_won = won;
        self.exit_on_deal_lost = lost;
        self
    }

    pub fn email_step(self, subject: &str, body: &str, delay_days: i32, delay_hours: i32) -> Self {
        self.raw_step(
            "email",
            json!({"subject": subject, "body": body}),
            delay_days,
            delay_hours,
        )
    }

    pub fn templated_email_step(
        self,
        template_id: i64,
        delay_days: i32,
        delay_hours: i32,
    ) -> Self {
        self.raw_step(
            "email",
            json!({
                "subject": "Fallback subject",
                "body": "Fallback body",
                "template_id": template_id,
            }),
            delay_days,
            delay_hours,
        )
    }

    pub fn task_step(self, title: &str, delay_days: i32, delay_hours: i32) -> Self {
        self.raw_step(
            "task",
            json!({"title": title, "description": "Check in with {{contact.firstName}}"}),
            delay_days,
            delay_hours,
        )
    }

    pub fn linkedin_step(self, action: &str, delay_days: i32, delay_hours: i32) -> Self {
        self.raw_step(
            "linkedin",
            json!({"action": action, "message": "Hi {{contact.firstName}}"}),
            delay_days,
            delay_hours,
        )
    }

    pub fn raw_step(
        mut self,
        step_type: &'static str,
        payload: serde_json::Value,
        delay_days: i32,
        delay_hours: i32,
    ) -> Self {
        self.steps.push(StepSpec {
            step_type,
            payload,
            delay_days,
            delay_hours,
        });
        self
    }

    /// Insert the sequence and its steps, returning the stored sequence.
    pub fn build(self, store: &InMemoryStore) -> Sequence {
        let now = Utc::now();
        let sequence = Sequence {
            id: store.allocate_id(),
            name: self.name,
            description: None,
            active: self.active,
            exit_on_reply: self.exit_on_reply,
            exit_on_meeting_booked: self.exit_on_meeting_booked,
            exit_on_deal_won: self.exit_on_deal_won,
            exit_on_deal_lost: self.exit_on_deal_lost,
            sending_hours_start: self.sending_hours_start,
            sending_hours_end: self.sending_hours_end,
            send_on_weekends: self.send_on_weekends,
            active_enrolled: 0,
            completed_count: 0,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        store.put_sequence(sequence.clone());

        for (index, spec) in self.steps.into_iter().enumerate() {
            store.put_step(SequenceStep {
                id: store.allocate_id(),
                sequence_id: sequence.id,
                step_order: index as i32 + 1,
                step_type: spec.step_type.to_string(),
                payload: spec.payload,
                delay_days: spec.delay_days,
                delay_hours: spec.delay_hours,
                created_at: now,
                updated_at: now,
            });
        }

        sequence
    }
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn seed_contact(store: &InMemoryStore, first: &str, last: &str) -> Contact {
    let contact = Contact {
        id: store.allocate_id(),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        email: Some(format!(
            "{}.{}@example.com",
            first.to_lowercase(),
            last.to_lowercase()
        )),
        phone: None,
        position: Some("Head of Operations".to_string()),
        client_id: None,
    };
    store.put_contact(contact.clone());
    contact
}

pub fn seed_contact_for_client(
    store: &InMemoryStore,
    first: &str,
    last: &str,
    client_id: i64,
) -> Contact {
    let mut contact = seed_contact(store, first, last);
    contact.client_id = Some(client_id);
    store.put_contact(contact.clone());
    contact
}

pub fn seed_client(store: &InMemoryStore, name: &str, industry: &str) -> Client {
    let client = Client {
        id: store.allocate_id(),
        name: name.to_string(),
        industry: Some(industry.to_string()),
    };
    store.put_client(client.clone());
    client
}

pub fn seed_deal(store: &InMemoryStore, name: &str, value: f64, currency: &str) -> Deal {
    let deal = Deal {
        id: store.allocate_id(),
        name: name.to_string(),
        value: Some(value),
        currency: Some(currency.to_string()),
        stage: Some("negotiation".to_string()),
    };
    store.put_deal(deal.clone());
    deal
}

pub fn seed_user(store: &InMemoryStore, name: &str, email: &str) -> User {
    let user = User {
        id: store.allocate_id(),
        name: name.to_string(),
        email: Some(email.to_string()),
    };
    store.put_user(user.clone());
    user
}

pub fn seed_template(
    store: &InMemoryStore,
    name: &str,
    subject: &str,
    body: &str,
) -> EmailTemplate {
    let now = Utc::now();
    let template = EmailTemplate {
        id: store.allocate_id(),
        name: name.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        usage_count: 0,
        last_used_at: None,
        created_at: now,
        updated_at: now,
    };
    store.put_template(template.clone());
    template
}

/// UTC timestamp helper for readable fixed-clock tests.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid test timestamp")
}

//! # Sequence Model
//!
//! A sequence is an ordered outreach playbook: steps with delays, a sending
//! window, exit policy flags, and aggregate enrollment counters.
//!
//! ## Database Schema
//!
//! Maps to `cadence_sequences` and `cadence_sequence_steps`. Step payloads
//! are stored as JSONB and parsed into [`StepDetails`] at execution time so
//! unknown or malformed payloads surface as step failures instead of
//! deserialization panics.

use crate::constants::{step_types, system};
use crate::state_machine::ExitEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// An outreach sequence definition with exit policy and sending window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Sequence {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Inactive sequences pause their enrollments at the next advancement run
    pub active: bool,
    pub exit_on_reply: bool,
    pub exit_on_meeting_booked: bool,
    pub exit_on_deal_won: bool,
    pub exit_on_deal_lost: bool,
    pub sending_hours_start: i32,
    pub sending_hours_end: i32,
    pub send_on_weekends: bool,
    /// Count of enrollments currently in the active status
    pub active_enrolled: i32,
    /// Count of enrollments that ran every step to completion
    pub completed_count: i32,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sequence {
    /// Sanitized sending policy for scheduling decisions.
    pub fn sending_policy(&self) -> SendingPolicy {
        SendingPolicy::sanitized(
            self.sending_hours_start,
            self.sending_hours_end,
            self.send_on_weekends,
        )
    }

    /// Whether this sequence's exit policy fires for the given event.
    pub fn exits_on(&self, event: &ExitEvent) -> bool {
        match event {
            ExitEvent::EmailReplied => self.exit_on_reply,
            ExitEvent::MeetingScheduled => self.exit_on_meeting_booked,
            ExitEvent::DealWon => self.exit_on_deal_won,
            ExitEvent::DealLost => self.exit_on_deal_lost,
        }
    }
}

/// Sending window and weekend policy, sanitized to valid hours.
///
/// The window is half-open: a send may happen at any hour `h` with
/// `start <= h < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendingPolicy {
    pub start_hour: u32,
    pub end_hour: u32,
    pub send_on_weekends: bool,
}

impl SendingPolicy {
    /// Build a policy from stored hours, falling back to the system default
    /// window when the stored values are out of range or inverted.
    pub fn sanitized(start: i32, end: i32, send_on_weekends: bool) -> Self {
        let valid = (0..=23).contains(&start) && (0..=23).contains(&end) && start < end;
        if valid {
            Self {
                start_hour: start as u32,
                end_hour: end as u32,
                send_on_weekends,
            }
        } else {
            tracing::warn!(
                start = start,
                end = end,
                "invalid sending window, falling back to default"
            );
            Self {
                start_hour: system::DEFAULT_SENDING_HOURS_START,
                end_hour: system::DEFAULT_SENDING_HOURS_END,
                send_on_weekends,
            }
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

impl Default for SendingPolicy {
    fn default() -> Self {
        Self {
            start_hour: system::DEFAULT_SENDING_HOURS_START,
            end_hour: system::DEFAULT_SENDING_HOURS_END,
            send_on_weekends: false,
        }
    }
}

/// One step of a sequence. `step_order` is 1-based and unique per sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SequenceStep {
    pub id: i64,
    pub sequence_id: i64,
    pub step_order: i32,
    /// Discriminant for `payload`: "email", "task", or "linkedin"
    pub step_type: String,
    pub payload: serde_json::Value,
    pub delay_days: i32,
    pub delay_hours: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SequenceStep {
    /// Parse the JSONB payload into typed step details.
    pub fn details(&self) -> Result<StepDetails, StepPayloadError> {
        match self.step_type.as_str() {
            step_types::EMAIL => {
                let payload: EmailPayload = self.parse_payload()?;
                Ok(StepDetails::Email {
                    subject: payload.subject,
                    body: payload.body,
                    template_id: payload.template_id,
                })
            }
            step_types::TASK => {
                let payload: TaskPayload = self.parse_payload()?;
                Ok(StepDetails::Task {
                    title: payload.title,
                    description: payload.description,
                })
            }
            step_types::LINKEDIN => {
                let payload: LinkedinPayload = self.parse_payload()?;
                Ok(StepDetails::Linkedin {
                    action: payload.action,
                    message: payload.message,
                })
            }
            other => Err(StepPayloadError::UnknownType(other.to_string())),
        }
    }

    fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, StepPayloadError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| {
            StepPayloadError::InvalidPayload {
                step_type: self.step_type.clone(),
                source,
            }
        })
    }
}

/// Typed view of a step payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDetails {
    Email {
        subject: String,
        body: String,
        /// When set, the template's subject and body override the inline ones
        template_id: Option<i64>,
    },
    Task {
        title: String,
        description: Option<String>,
    },
    Linkedin {
        action: LinkedinAction,
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    template_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TaskPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkedinPayload {
    action: LinkedinAction,
    #[serde(default)]
    message: Option<String>,
}

/// LinkedIn outreach actions staged as manual tasks for the sequence owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedinAction {
    Connect,
    Message,
    ViewProfile,
}

impl LinkedinAction {
    /// Imperative task title fragment shown to the sequence owner.
    pub fn task_label(&self) -> &'static str {
        match self {
            Self::Connect => "Send LinkedIn connection request",
            Self::Message => "Send LinkedIn message",
            Self::ViewProfile => "View LinkedIn profile",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Message => "message",
            Self::ViewProfile => "view_profile",
        }
    }
}

impl fmt::Display for LinkedinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step payload parse failures. These become failed step outcomes rather
/// than advancing the enrollment past a misconfigured step.
#[derive(Debug, thiserror::Error)]
pub enum StepPayloadError {
    #[error("unknown step type: {0}")]
    UnknownType(String),
    #[error("invalid {step_type} payload: {source}")]
    InvalidPayload {
        step_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(step_type: &str, payload: serde_json::Value) -> SequenceStep {
        SequenceStep {
            id: 1,
            sequence_id: 1,
            step_order: 1,
            step_type: step_type.to_string(),
            payload,
            delay_days: 0,
            delay_hours: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_email_payload_parsing() {
        let step = step(
            "email",
            json!({"subject": "Hi {{contact.firstName}}", "body": "Intro", "template_id": 7}),
        );
        match step.details().unwrap() {
            StepDetails::Email {
                subject,
                body,
                template_id,
            } => {
                assert_eq!(subject, "Hi {{contact.firstName}}");
                assert_eq!(body, "Intro");
                assert_eq!(template_id, Some(7));
            }
            other => panic!("expected email details, got {other:?}"),
        }
    }

    #[test]
    fn test_email_payload_defaults_missing_fields() {
        let step = step("email", json!({}));
        match step.details().unwrap() {
            StepDetails::Email {
                subject,
                body,
                template_id,
            } => {
                assert_eq!(subject, "");
                assert_eq!(body, "");
                assert_eq!(template_id, None);
            }
            other => panic!("expected email details, got {other:?}"),
        }
    }

    #[test]
    fn test_linkedin_payload_parsing() {
        let step = step(
            "linkedin",
            json!({"action": "connect", "message": "Let's connect"}),
        );
        match step.details().unwrap() {
            StepDetails::Linkedin { action, message } => {
                assert_eq!(action, LinkedinAction::Connect);
                assert_eq!(message.as_deref(), Some("Let's connect"));
            }
            other => panic!("expected linkedin details, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_step_type_is_rejected() {
        let step = step("call", json!({}));
        assert!(matches!(
            step.details(),
            Err(StepPayloadError::UnknownType(t)) if t == "call"
        ));
    }

    #[test]
    fn test_invalid_linkedin_action_is_rejected() {
        let step = step("linkedin", json!({"action": "wave"}));
        assert!(matches!(
            step.details(),
            Err(StepPayloadError::InvalidPayload { step_type, .. }) if step_type == "linkedin"
        ));
    }

    #[test]
    fn test_sending_policy_sanitizes_inverted_window() {
        let policy = SendingPolicy::sanitized(18, 9, true);
        assert_eq!(policy.start_hour, 9);
        assert_eq!(policy.end_hour, 17);
        assert!(policy.send_on_weekends);
    }

    #[test]
    fn test_sending_policy_sanitizes_out_of_range() {
        let policy = SendingPolicy::sanitized(-1, 30, false);
        assert_eq!(policy.start_hour, 9);
        assert_eq!(policy.end_hour, 17);
    }

    #[test]
    fn test_sending_policy_keeps_valid_window() {
        let policy = SendingPolicy::sanitized(8, 20, false);
        assert_eq!(policy.start_hour, 8);
        assert_eq!(policy.end_hour, 20);
        assert!(policy.contains_hour(8));
        assert!(policy.contains_hour(19));
        assert!(!policy.contains_hour(20));
        assert!(!policy.contains_hour(7));
    }

    #[test]
    fn test_exit_policy_flags() {
        let sequence = Sequence {
            id: 1,
            name: "Outbound".to_string(),
            description: None,
            active: true,
            exit_on_reply: true,
            exit_on_meeting_booked: false,
            exit_on_deal_won: true,
            exit_on_deal_lost: false,
            sending_hours_start: 9,
            sending_hours_end: 17,
            send_on_weekends: false,
            active_enrolled: 0,
            completed_count: 0,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(sequence.exits_on(&ExitEvent::EmailReplied));
        assert!(!sequence.exits_on(&ExitEvent::MeetingScheduled));
        assert!(sequence.exits_on(&ExitEvent::DealWon));
        assert!(!sequence.exits_on(&ExitEvent::DealLost));
    }
}

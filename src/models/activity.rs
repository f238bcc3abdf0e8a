//! # Activity Model
//!
//! Staged side effects of step execution. The engine never talks to an email
//! or LinkedIn provider; it records a pending activity and the host CRM's
//! delivery pipeline picks it up from there.

use crate::constants::activities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;

/// A staged activity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i64,
    /// Host timeline type: "email" or "task"
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub contact_id: Option<i64>,
    pub client_id: Option<i64>,
    pub deal_id: Option<i64>,
    /// CRM user the activity is assigned to
    pub owner_id: Option<i64>,
    pub status: String,
    pub due_at: Option<DateTime<Utc>>,
    /// Engine provenance: sequence, enrollment, step order, auto_generated flag
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for staging an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub contact_id: Option<i64>,
    pub client_id: Option<i64>,
    pub deal_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub status: String,
    pub due_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl NewActivity {
    /// Stage a pending email with resolved subject and body.
    pub fn email(title: String, body: String) -> Self {
        Self {
            activity_type: activities::TYPE_EMAIL.to_string(),
            title,
            description: Some(body),
            contact_id: None,
            client_id: None,
            deal_id: None,
            owner_id: None,
            status: activities::STATUS_PENDING.to_string(),
            due_at: None,
            metadata: json!({}),
        }
    }

    /// Stage a pending task due immediately.
    pub fn task(title: String, description: Option<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            activity_type: activities::TYPE_TASK.to_string(),
            title,
            description,
            contact_id: None,
            client_id: None,
            deal_id: None,
            owner_id: None,
            status: activities::STATUS_PENDING.to_string(),
            due_at: Some(due_at),
            metadata: json!({}),
        }
    }

    pub fn for_contact(mut self, contact_id: i64) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn for_client(mut self, client_id: Option<i64>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn for_deal(mut self, deal_id: Option<i64>) -> Self {
        self.deal_id = deal_id;
        self
    }

    pub fn owned_by(mut self, owner_id: Option<i64>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

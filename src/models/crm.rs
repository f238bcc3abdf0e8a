//! # CRM Entity Snapshots
//!
//! Read-only views of the host CRM's contacts, clients, deals, and users.
//! These rows are owned by the host application and reach the engine through
//! the [`CrmDirectory`](crate::store::CrmDirectory) port; the engine never
//! writes them.

use serde::{Deserialize, Serialize};

/// A contact enrolled in sequences. All descriptive fields are optional
/// because host CRMs routinely carry partial records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub client_id: Option<i64>,
}

impl Contact {
    /// First and last name joined, trimmed. Empty when both are missing.
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// A client company the contact belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
}

/// A deal associated with an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub name: String,
    pub value: Option<f64>,
    /// ISO currency code, e.g. "USD". Engine default applies when absent.
    pub currency: Option<String>,
    pub stage: Option<String>,
}

/// The CRM user who owns an enrollment (usually the enrolling salesperson).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_joins_and_trims() {
        let contact = Contact {
            id: 1,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: None,
            phone: None,
            position: None,
            client_id: None,
        };
        assert_eq!(contact.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_full_name_with_missing_parts() {
        let contact = Contact {
            id: 2,
            first_name: Some("Ada".to_string()),
            last_name: None,
            email: None,
            phone: None,
            position: None,
            client_id: None,
        };
        assert_eq!(contact.full_name(), "Ada");

        let empty = Contact {
            id: 3,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            position: None,
            client_id: None,
        };
        assert_eq!(empty.full_name(), "");
    }
}

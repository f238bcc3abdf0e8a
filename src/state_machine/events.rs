use crate::constants::exit_reasons;
use serde::{Deserialize, Serialize};

/// Events that can trigger enrollment status transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EnrollmentEvent {
    /// Put the enrollment on hold
    Pause,
    /// Resume a paused enrollment
    Resume,
    /// Mark the enrollment as having finished every step
    Complete,
    /// Exit the enrollment early with a human-readable reason
    Exit(String),
}

impl EnrollmentEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete => "complete",
            Self::Exit(_) => "exit",
        }
    }

    /// Extract the exit reason if this is an exit event
    pub fn exit_reason(&self) -> Option<&str> {
        match self {
            Self::Exit(reason) => Some(reason),
            _ => None,
        }
    }

    /// Check if this event leads to a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Exit(_))
    }

    /// Create an exit event with the given reason
    pub fn exit_with_reason(reason: impl Into<String>) -> Self {
        Self::Exit(reason.into())
    }
}

/// CRM happenings that may trigger an exit under the sequence's exit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitEvent {
    EmailReplied,
    MeetingScheduled,
    DealWon,
    DealLost,
}

impl ExitEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EmailReplied => "email_replied",
            Self::MeetingScheduled => "meeting_scheduled",
            Self::DealWon => "deal_won",
            Self::DealLost => "deal_lost",
        }
    }

    /// Human-readable exit reason recorded on the enrollment
    pub fn default_reason(&self) -> &'static str {
        match self {
            Self::EmailReplied => exit_reasons::REPLIED,
            Self::MeetingScheduled => exit_reasons::MEETING_BOOKED,
            Self::DealWon => exit_reasons::DEAL_WON,
            Self::DealLost => exit_reasons::DEAL_LOST,
        }
    }
}

/// Email engagement signals delivered by the host's tracking pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementEvent {
    Opened,
    Clicked,
    Replied,
}

impl EngagementEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Clicked => "clicked",
            Self::Replied => "replied",
        }
    }

    /// The corresponding exit policy event, when one exists
    pub fn as_exit_event(&self) -> Option<ExitEvent> {
        match self {
            Self::Replied => Some(ExitEvent::EmailReplied),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_event_types() {
        assert_eq!(EnrollmentEvent::Pause.event_type(), "pause");
        assert_eq!(
            EnrollmentEvent::exit_with_reason("Deal won").event_type(),
            "exit"
        );
        assert_eq!(
            EnrollmentEvent::exit_with_reason("Deal won").exit_reason(),
            Some("Deal won")
        );
        assert_eq!(EnrollmentEvent::Resume.exit_reason(), None);
    }

    #[test]
    fn test_terminal_events() {
        assert!(EnrollmentEvent::Complete.is_terminal());
        assert!(EnrollmentEvent::exit_with_reason("x").is_terminal());
        assert!(!EnrollmentEvent::Pause.is_terminal());
        assert!(!EnrollmentEvent::Resume.is_terminal());
    }

    #[test]
    fn test_exit_event_reasons() {
        assert_eq!(ExitEvent::EmailReplied.default_reason(), "Contact replied");
        assert_eq!(
            ExitEvent::MeetingScheduled.default_reason(),
            "Meeting booked"
        );
        assert_eq!(ExitEvent::DealWon.default_reason(), "Deal won");
        assert_eq!(ExitEvent::DealLost.default_reason(), "Deal lost");
    }

    #[test]
    fn test_engagement_to_exit_mapping() {
        assert_eq!(
            EngagementEvent::Replied.as_exit_event(),
            Some(ExitEvent::EmailReplied)
        );
        assert_eq!(EngagementEvent::Opened.as_exit_event(), None);
        assert_eq!(EngagementEvent::Clicked.as_exit_event(), None);
    }
}

use super::errors::TransitionError;
use super::events::EnrollmentEvent;
use super::states::EnrollmentStatus;

/// Pure transition table for enrollment statuses.
///
/// Components validate a transition here before persisting the status
/// change, so the storage layer only ever sees legal moves:
///
/// ```text
/// active  + pause     -> paused
/// active  + complete  -> completed
/// active  + exit      -> exited
/// paused  + resume    -> active
/// paused  + exit      -> exited
/// ```
///
/// Terminal statuses accept no events.
pub struct EnrollmentStateMachine;

impl EnrollmentStateMachine {
    /// Determine the target status for an event, or reject the transition.
    pub fn next_status(
        current: EnrollmentStatus,
        event: &EnrollmentEvent,
    ) -> Result<EnrollmentStatus, TransitionError> {
        let target = match (current, event) {
            (EnrollmentStatus::Active, EnrollmentEvent::Pause) => EnrollmentStatus::Paused,
            (EnrollmentStatus::Active, EnrollmentEvent::Complete) => EnrollmentStatus::Completed,
            (EnrollmentStatus::Active, EnrollmentEvent::Exit(_)) => EnrollmentStatus::Exited,
            (EnrollmentStatus::Paused, EnrollmentEvent::Resume) => EnrollmentStatus::Active,
            (EnrollmentStatus::Paused, EnrollmentEvent::Exit(_)) => EnrollmentStatus::Exited,
            (from, event) => {
                return Err(TransitionError::InvalidTransition {
                    from,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Whether an event would be accepted from the given status.
    pub fn can_transition(current: EnrollmentStatus, event: &EnrollmentEvent) -> bool {
        Self::next_status(current, event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            EnrollmentStateMachine::next_status(EnrollmentStatus::Active, &EnrollmentEvent::Pause)
                .unwrap(),
            EnrollmentStatus::Paused
        );
        assert_eq!(
            EnrollmentStateMachine::next_status(
                EnrollmentStatus::Active,
                &EnrollmentEvent::Complete
            )
            .unwrap(),
            EnrollmentStatus::Completed
        );
        assert_eq!(
            EnrollmentStateMachine::next_status(
                EnrollmentStatus::Active,
                &EnrollmentEvent::exit_with_reason("Contact replied")
            )
            .unwrap(),
            EnrollmentStatus::Exited
        );
        assert_eq!(
            EnrollmentStateMachine::next_status(EnrollmentStatus::Paused, &EnrollmentEvent::Resume)
                .unwrap(),
            EnrollmentStatus::Active
        );
        assert_eq!(
            EnrollmentStateMachine::next_status(
                EnrollmentStatus::Paused,
                &EnrollmentEvent::exit_with_reason("Deal lost")
            )
            .unwrap(),
            EnrollmentStatus::Exited
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot resume an active enrollment
        assert!(EnrollmentStateMachine::next_status(
            EnrollmentStatus::Active,
            &EnrollmentEvent::Resume
        )
        .is_err());

        // Cannot complete from paused; completion only happens while advancing
        assert!(EnrollmentStateMachine::next_status(
            EnrollmentStatus::Paused,
            &EnrollmentEvent::Complete
        )
        .is_err());

        // Cannot pause an already paused enrollment
        assert!(EnrollmentStateMachine::next_status(
            EnrollmentStatus::Paused,
            &EnrollmentEvent::Pause
        )
        .is_err());
    }

    #[test]
    fn test_terminal_statuses_accept_no_events() {
        for terminal in [EnrollmentStatus::Completed, EnrollmentStatus::Exited] {
            for event in [
                EnrollmentEvent::Pause,
                EnrollmentEvent::Resume,
                EnrollmentEvent::Complete,
                EnrollmentEvent::exit_with_reason("x"),
            ] {
                assert!(
                    EnrollmentStateMachine::next_status(terminal, &event).is_err(),
                    "{terminal} should reject {}",
                    event.event_type()
                );
            }
        }
    }

    #[test]
    fn test_can_transition_mirrors_next_status() {
        assert!(EnrollmentStateMachine::can_transition(
            EnrollmentStatus::Active,
            &EnrollmentEvent::Pause
        ));
        assert!(!EnrollmentStateMachine::can_transition(
            EnrollmentStatus::Completed,
            &EnrollmentEvent::Resume
        ));
    }
}

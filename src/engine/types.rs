//! Result types shared across the engine components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of executing a single step for one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// Step ran and its completion was recorded.
    Executed {
        /// Result label recorded in the completion log, e.g. "sent"
        result: String,
        /// Staged activity created for the host, when one exists
        activity_id: Option<i64>,
        message: Option<String>,
    },
    /// A completion for this step was already on record; nothing was done.
    AlreadyCompleted,
    /// Step could not run (missing contact, bad payload). The enrollment is
    /// left untouched so the next run can retry.
    Failed { message: String },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Executed { .. } | Self::AlreadyCompleted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// What the advancement loop did with one claimed enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentDisposition {
    /// Step executed and the next one was scheduled
    Advanced,
    /// Final step executed (or none left); enrollment completed
    Completed,
    /// Sequence missing or deactivated; enrollment paused
    Paused,
    /// Step failed or an unexpected error occurred; claim released for retry
    Error,
}

impl std::fmt::Display for EnrollmentDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Advanced => "advanced",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Per-enrollment line item of an advancement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRunDetail {
    pub enrollment_id: i64,
    pub contact_id: i64,
    /// Step position the run acted on (1-based)
    pub step_order: i32,
    pub disposition: EnrollmentDisposition,
    pub message: Option<String>,
}

/// Aggregate result of one advancement run.
///
/// `processed` counts every enrollment whose state moved (advanced,
/// completed, or paused); `errored` counts the ones left for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancementReport {
    pub run_id: Uuid,
    pub runner_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// How many due enrollments this run claimed
    pub claimed: usize,
    pub processed: usize,
    pub errored: usize,
    pub details: Vec<EnrollmentRunDetail>,
}

impl AdvancementReport {
    pub fn has_errors(&self) -> bool {
        self.errored > 0
    }

    /// Details with the given disposition, in claim order.
    pub fn with_disposition(
        &self,
        disposition: EnrollmentDisposition,
    ) -> impl Iterator<Item = &EnrollmentRunDetail> {
        self.details
            .iter()
            .filter(move |d| d.disposition == disposition)
    }

    /// One-line summary for run logging.
    pub fn summary(&self) -> String {
        format!(
            "run {} claimed {} processed {} errored {}",
            self.run_id, self.claimed, self.processed, self.errored
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_outcome_predicates() {
        let executed = StepOutcome::Executed {
            result: "sent".to_string(),
            activity_id: Some(1),
            message: None,
        };
        assert!(executed.is_success());
        assert!(StepOutcome::AlreadyCompleted.is_success());

        let failed = StepOutcome::Failed {
            message: "contact 9 not found".to_string(),
        };
        assert!(failed.is_failed());
        assert!(!failed.is_success());
    }

    #[test]
    fn test_report_filters_by_disposition() {
        let now = Utc::now();
        let report = AdvancementReport {
            run_id: Uuid::new_v4(),
            runner_id: "runner-test".to_string(),
            started_at: now,
            finished_at: now,
            claimed: 2,
            processed: 1,
            errored: 1,
            details: vec![
                EnrollmentRunDetail {
                    enrollment_id: 1,
                    contact_id: 10,
                    step_order: 1,
                    disposition: EnrollmentDisposition::Advanced,
                    message: None,
                },
                EnrollmentRunDetail {
                    enrollment_id: 2,
                    contact_id: 11,
                    step_order: 3,
                    disposition: EnrollmentDisposition::Error,
                    message: Some("contact 11 not found".to_string()),
                },
            ],
        };

        assert!(report.has_errors());
        let errors: Vec<_> = report
            .with_disposition(EnrollmentDisposition::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].enrollment_id, 2);
    }
}

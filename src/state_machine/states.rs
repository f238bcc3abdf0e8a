use serde::{Deserialize, Serialize};
use std::fmt;

/// Enrollment status definitions matching the persisted status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Enrollment is progressing through the sequence
    Active,
    /// Enrollment is on hold; no steps execute until resumed
    Paused,
    /// Every step ran; terminal
    Completed,
    /// Left early via exit policy or manual exit; terminal
    Exited,
}

impl EnrollmentStatus {
    /// Check if this is a terminal status (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exited)
    }

    /// Check if this enrollment is eligible for advancement
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this enrollment is on hold
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "exited" => Ok(Self::Exited),
            _ => Err(format!("Invalid enrollment status: {s}")),
        }
    }
}

/// Default status for new enrollments
impl Default for EnrollmentStatus {
    fn default() -> Self {
        Self::Active
    }
}

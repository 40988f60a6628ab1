use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::validation::{validate_min, ValidationErrors};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "IN_PROGRESS"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// A single in-progress or finished workout. At most one IN_PROGRESS
/// session exists per user program state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub user_program_state_id: Uuid,
    pub week_number: i32,
    pub day_index: i32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkoutSession {
    pub fn start(user_program_state_id: Uuid, week_number: i32, day_index: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_program_state_id,
            week_number,
            day_index,
            status: SessionStatus::InProgress,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One recorded set. Unique on (session, prescription, set number); repeat
/// logs for the same coordinates overwrite the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoggedSet {
    pub id: Uuid,
    pub session_id: Uuid,
    pub prescription_id: Uuid,
    pub lift_id: Uuid,
    pub set_number: i32,
    pub weight: f64,
    pub target_reps: i32,
    pub reps_performed: i32,
    pub is_amrap: bool,
    pub created_at: DateTime<Utc>,
}

impl LoggedSet {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_min(&mut errors, "set_number", self.set_number, 1);
        validate_min(&mut errors, "target_reps", self.target_reps, 1);
        validate_min(&mut errors, "reps_performed", self.reps_performed, 0);
        if self.weight < 0.0 {
            errors.add("weight", "must not be negative");
        }
        errors.into_result()
    }

    /// A set fails when it misses its target. AMRAP sets cannot fail; a
    /// zero-rep AMRAP is merely a zero-rep set.
    pub fn is_failure(&self) -> bool {
        !self.is_amrap && self.reps_performed < self.target_reps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_set(reps_performed: i32, is_amrap: bool) -> LoggedSet {
        LoggedSet {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            prescription_id: Uuid::new_v4(),
            lift_id: Uuid::new_v4(),
            set_number: 1,
            weight: 170.0,
            target_reps: 5,
            reps_performed,
            is_amrap,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missed_target_is_failure() {
        assert!(logged_set(3, false).is_failure());
        assert!(!logged_set(5, false).is_failure());
        assert!(!logged_set(8, false).is_failure());
    }

    #[test]
    fn amrap_sets_never_fail() {
        assert!(!logged_set(0, true).is_failure());
        assert!(!logged_set(12, true).is_failure());
    }

    #[test]
    fn set_numbers_start_at_one() {
        let mut set = logged_set(5, false);
        set.set_number = 0;
        assert!(set.validate().is_err());
    }
}

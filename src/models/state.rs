use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    BetweenCycles,
    Quit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "cycle_status", rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "week_status", rename_all = "snake_case")]
pub enum WeekStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "ACTIVE"),
            EnrollmentStatus::BetweenCycles => write!(f, "BETWEEN_CYCLES"),
            EnrollmentStatus::Quit => write!(f, "QUIT"),
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStatus::Pending => write!(f, "PENDING"),
            CycleStatus::InProgress => write!(f, "IN_PROGRESS"),
            CycleStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekStatus::Pending => write!(f, "PENDING"),
            WeekStatus::InProgress => write!(f, "IN_PROGRESS"),
            WeekStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// A user's position inside their enrolled program. At most one non-QUIT
/// state exists per user at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProgramState {
    pub id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub current_week: i32,
    pub current_day_index: i32,
    pub current_cycle_iteration: i32,
    pub enrollment_status: EnrollmentStatus,
    pub cycle_status: CycleStatus,
    pub week_status: WeekStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgramState {
    /// Fresh enrollment: week 1, day 0, first cycle iteration, everything
    /// pending.
    pub fn enroll(user_id: Uuid, program_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            program_id,
            current_week: 1,
            current_day_index: 0,
            current_cycle_iteration: 1,
            enrollment_status: EnrollmentStatus::Active,
            cycle_status: CycleStatus::Pending,
            week_status: WeekStatus::Pending,
            enrolled_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enrollment_status == EnrollmentStatus::Active
    }
}

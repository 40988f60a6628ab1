use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prescription::ResolvedPrescription;

/// A fully resolved workout: the day's prescriptions in order, each with
/// concrete sets and weights for this user's current maxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub cycle_iteration: i32,
    pub week_number: i32,
    pub day_slug: String,
    pub date: DateTime<Utc>,
    pub exercises: Vec<ResolvedPrescription>,
}

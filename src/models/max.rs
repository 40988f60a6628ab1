use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::validation::ValidationErrors;

/// Which reference weight a strategy or progression works against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "max_type", rename_all = "snake_case")]
pub enum MaxType {
    OneRm,
    TrainingMax,
}

impl fmt::Display for MaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxType::OneRm => write!(f, "ONE_RM"),
            MaxType::TrainingMax => write!(f, "TRAINING_MAX"),
        }
    }
}

impl std::str::FromStr for MaxType {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONE_RM" | "one_rm" => Ok(MaxType::OneRm),
            "TRAINING_MAX" | "training_max" => Ok(MaxType::TrainingMax),
            other => {
                let mut errors = ValidationErrors::new();
                errors.add("max_type", format!("unknown max type {other:?}"));
                Err(errors)
            }
        }
    }
}

/// A user's reference weight for a lift. Rows are append-only; the current
/// max for (user, lift, type) is the row with the greatest effective date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LiftMax {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lift_id: Uuid,
    #[serde(rename = "type")]
    pub max_type: MaxType,
    pub value: f64,
    pub effective_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LiftMax {
    pub fn new(user_id: Uuid, lift_id: Uuid, max_type: MaxType, value: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            lift_id,
            max_type,
            value,
            effective_date: now,
            created_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.value <= 0.0 {
            errors.add("value", "must be greater than zero");
        }
        if !has_quarter_precision(self.value) {
            errors.add("value", "must be a multiple of 0.25");
        }
        errors.into_result()
    }
}

/// Weights are stored at quarter-pound precision.
pub fn has_quarter_precision(value: f64) -> bool {
    let scaled = value * 4.0;
    (scaled - scaled.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_precision_values_pass() {
        for value in [200.0, 152.5, 141.25, 0.25] {
            let max = LiftMax::new(Uuid::new_v4(), Uuid::new_v4(), MaxType::OneRm, value);
            assert!(max.validate().is_ok(), "{value} should be valid");
        }
    }

    #[test]
    fn sub_quarter_precision_fails() {
        let max = LiftMax::new(Uuid::new_v4(), Uuid::new_v4(), MaxType::OneRm, 100.1);
        assert!(max.validate().is_err());
    }

    #[test]
    fn zero_value_fails() {
        let max = LiftMax::new(Uuid::new_v4(), Uuid::new_v4(), MaxType::TrainingMax, 0.0);
        assert!(max.validate().is_err());
    }

    #[test]
    fn max_type_round_trips_through_str() {
        assert_eq!("ONE_RM".parse::<MaxType>().unwrap(), MaxType::OneRm);
        assert_eq!(
            "training_max".parse::<MaxType>().unwrap(),
            MaxType::TrainingMax
        );
        assert!("BODYWEIGHT".parse::<MaxType>().is_err());
    }
}

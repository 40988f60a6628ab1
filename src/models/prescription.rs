use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lift::LiftSummary;
use super::load_strategy::LoadStrategy;
use super::set_scheme::{GeneratedSet, SetScheme};
use super::validation::{validate_max_len, validate_min, ValidationErrors};

pub const MAX_NOTES_LEN: usize = 500;

/// One exercise slot in a day: lift x load strategy x set scheme, ordered
/// within its parent day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub lift_id: Uuid,
    pub load_strategy: LoadStrategy,
    pub set_scheme: SetScheme,
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<i32>,
}

impl Prescription {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = self.load_strategy.validate() {
            errors.merge(e);
        }
        if let Err(e) = self.set_scheme.validate() {
            errors.merge(e);
        }
        validate_min(&mut errors, "order", self.order, 0);
        if let Some(notes) = &self.notes {
            validate_max_len(&mut errors, "notes", notes, MAX_NOTES_LEN);
        }
        if let Some(rest) = self.rest_seconds {
            validate_min(&mut errors, "rest_seconds", rest, 0);
        }
        errors.into_result()
    }
}

/// A prescription resolved against a user's current maxes: concrete,
/// numbered sets plus the carried-through presentation fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPrescription {
    pub prescription_id: Uuid,
    pub lift: LiftSummary,
    pub sets: Vec<GeneratedSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaxType;

    fn prescription() -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            lift_id: Uuid::new_v4(),
            load_strategy: LoadStrategy::PercentOf {
                max_type: MaxType::OneRm,
                percentage: 85.0,
                lookup_key: None,
                round_to: Some(5.0),
            },
            set_scheme: SetScheme::Fixed {
                sets: 3,
                reps: 5,
                is_amrap: false,
            },
            order: 0,
            notes: None,
            rest_seconds: Some(180),
        }
    }

    #[test]
    fn valid_prescription_passes() {
        assert!(prescription().validate().is_ok());
    }

    #[test]
    fn oversized_notes_fail() {
        let mut p = prescription();
        p.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        assert!(p.validate().is_err());
    }

    #[test]
    fn nested_violations_are_all_reported() {
        let mut p = prescription();
        p.order = -1;
        p.load_strategy = LoadStrategy::PercentOf {
            max_type: MaxType::OneRm,
            percentage: 0.0,
            lookup_key: None,
            round_to: None,
        };
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.violations().len(), 2);
    }
}

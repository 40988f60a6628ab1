use serde::{Deserialize, Serialize};

use super::load_strategy::round_to_increment;
use super::validation::{validate_min, validate_positive, ValidationErrors};

/// Ramp steps at or above this percentage count as work sets.
pub const DEFAULT_WORK_SET_THRESHOLD: f64 = 80.0;

fn default_work_set_threshold() -> f64 {
    DEFAULT_WORK_SET_THRESHOLD
}

/// How a base weight expands into a numbered list of sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetScheme {
    Fixed {
        sets: i32,
        reps: i32,
        #[serde(default)]
        is_amrap: bool,
    },
    Ramp {
        steps: Vec<RampStep>,
        #[serde(default = "default_work_set_threshold")]
        work_set_threshold: f64,
    },
    RepRange {
        sets: i32,
        min_reps: i32,
        max_reps: i32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RampStep {
    pub percentage: f64,
    pub reps: i32,
}

/// One concrete set produced by scheme expansion. Set numbers are dense and
/// 1-based in emission order. `max_reps` carries the REP_RANGE ceiling for
/// double progression; `is_amrap` marks a set whose target is a minimum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSet {
    pub set_number: i32,
    pub weight: f64,
    pub target_reps: i32,
    pub is_work_set: bool,
    pub is_amrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reps: Option<i32>,
}

impl SetScheme {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            SetScheme::Fixed { sets, reps, .. } => {
                validate_min(&mut errors, "sets", *sets, 1);
                validate_min(&mut errors, "reps", *reps, 1);
            }
            SetScheme::Ramp { steps, .. } => {
                if steps.is_empty() {
                    errors.add("steps", "must contain at least one step");
                }
                for (i, step) in steps.iter().enumerate() {
                    validate_positive(&mut errors, &format!("steps[{i}].percentage"), step.percentage);
                    validate_min(&mut errors, &format!("steps[{i}].reps"), step.reps, 1);
                }
            }
            SetScheme::RepRange {
                sets,
                min_reps,
                max_reps,
            } => {
                validate_min(&mut errors, "sets", *sets, 1);
                validate_min(&mut errors, "min_reps", *min_reps, 1);
                if max_reps < min_reps {
                    errors.add("max_reps", "must be at least min_reps");
                }
            }
        }
        errors.into_result()
    }

    /// Expand the scheme against a base weight. Ramp steps compute their own
    /// weights and are rounded per step with `round_to`; the other schemes
    /// use the base weight as handed in.
    pub fn generate_sets(&self, base_weight: f64, round_to: f64) -> Vec<GeneratedSet> {
        match self {
            SetScheme::Fixed {
                sets,
                reps,
                is_amrap,
            } => (1..=*sets)
                .map(|set_number| GeneratedSet {
                    set_number,
                    weight: base_weight,
                    target_reps: *reps,
                    is_work_set: true,
                    is_amrap: *is_amrap && set_number == *sets,
                    max_reps: None,
                })
                .collect(),
            SetScheme::Ramp {
                steps,
                work_set_threshold,
            } => steps
                .iter()
                .enumerate()
                .map(|(i, step)| GeneratedSet {
                    set_number: i as i32 + 1,
                    weight: round_to_increment(base_weight * step.percentage / 100.0, round_to),
                    target_reps: step.reps,
                    is_work_set: step.percentage >= *work_set_threshold,
                    is_amrap: false,
                    max_reps: None,
                })
                .collect(),
            SetScheme::RepRange {
                sets,
                min_reps,
                max_reps,
            } => (1..=*sets)
                .map(|set_number| GeneratedSet {
                    set_number,
                    weight: base_weight,
                    target_reps: *min_reps,
                    is_work_set: true,
                    is_amrap: false,
                    max_reps: Some(*max_reps),
                })
                .collect(),
        }
    }

    /// REP_RANGE ceiling, when the scheme has one.
    pub fn rep_ceiling(&self) -> Option<i32> {
        match self {
            SetScheme::RepRange { max_reps, .. } => Some(*max_reps),
            _ => None,
        }
    }
}

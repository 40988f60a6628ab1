use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::max::MaxType;
use super::validation::ValidationErrors;

/// The rule kinds the engine can dispatch on. The set is closed; each kind
/// is a pure compute function, not a type hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "progression_type", rename_all = "snake_case")]
pub enum ProgressionType {
    Linear,
    Cycle,
    Amrap,
    DefinedIncrement,
    DeloadOnFailure,
    Double,
}

/// The state-transition events a rule can react to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "trigger_type", rename_all = "snake_case")]
pub enum TriggerType {
    AfterSet,
    AfterSession,
    AfterWeek,
    AfterCycle,
    OnFailure,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::AfterSet => write!(f, "AFTER_SET"),
            TriggerType::AfterSession => write!(f, "AFTER_SESSION"),
            TriggerType::AfterWeek => write!(f, "AFTER_WEEK"),
            TriggerType::AfterCycle => write!(f, "AFTER_CYCLE"),
            TriggerType::OnFailure => write!(f, "ON_FAILURE"),
        }
    }
}

/// A declarative progression rule from the catalog. `parameters` carries the
/// kind-specific payload and is parsed on application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Progression {
    pub id: Uuid,
    pub name: String,
    pub progression_type: ProgressionType,
    pub parameters: serde_json::Value,
    pub trigger: TriggerType,
    pub max_type: MaxType,
    pub created_at: DateTime<Utc>,
}

/// Attaches a progression to a program. A null `lift_id` means "all lifts
/// in the program"; lift-specific rows shadow program-default rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramProgression {
    pub id: Uuid,
    pub program_id: Uuid,
    pub progression_id: Uuid,
    pub lift_id: Option<Uuid>,
    pub priority: i32,
    pub enabled: bool,
    pub override_increment: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit of every rule application. Unique on
/// (user, progression, lift, trigger type, trigger instance key) to make
/// repeats idempotent; failed applications carry an error marker instead of
/// a max mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressionLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub progression_id: Uuid,
    pub lift_id: Uuid,
    pub previous_value: f64,
    pub new_value: f64,
    pub delta: f64,
    pub trigger_type: TriggerType,
    pub trigger_instance_key: String,
    pub trigger_context: serde_json::Value,
    pub error: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// LINEAR: add a flat increment on every matching trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearParams {
    pub increment: f64,
}

/// CYCLE: like LINEAR but only sensible on AFTER_CYCLE; per-lift increments
/// come from `ProgramProgression.override_increment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleParams {
    pub increment: f64,
}

/// AMRAP: reward rep counts on the final AMRAP set against two thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmrapParams {
    pub threshold1: i32,
    pub small_increment: f64,
    pub threshold2: i32,
    pub large_increment: f64,
}

/// DEFINED_INCREMENT: increments looked up per effective week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefinedIncrementParams {
    pub increments: BTreeMap<String, f64>,
}

fn default_failure_threshold() -> i32 {
    3
}

/// DELOAD_ON_FAILURE: cut the max after a run of consecutive failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeloadParams {
    pub deload_percent: f64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: i32,
}

/// DOUBLE: add the increment once every set of a REP_RANGE prescription
/// reaches its rep ceiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoubleParams {
    pub increment: f64,
}

impl Progression {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "must not be empty");
        }
        if let Err(err) = self.parse_check() {
            errors.add("parameters", err);
        }
        errors.into_result()
    }

    fn parse_check(&self) -> Result<(), String> {
        let parameters = self.parameters.clone();
        let result = match self.progression_type {
            ProgressionType::Linear => serde_json::from_value::<LinearParams>(parameters).map(|_| ()),
            ProgressionType::Cycle => serde_json::from_value::<CycleParams>(parameters).map(|_| ()),
            ProgressionType::Amrap => serde_json::from_value::<AmrapParams>(parameters).map(|_| ()),
            ProgressionType::DefinedIncrement => {
                serde_json::from_value::<DefinedIncrementParams>(parameters).map(|_| ())
            }
            ProgressionType::DeloadOnFailure => {
                serde_json::from_value::<DeloadParams>(parameters).map(|_| ())
            }
            ProgressionType::Double => serde_json::from_value::<DoubleParams>(parameters).map(|_| ()),
        };
        result.map_err(|e| e.to_string())
    }
}

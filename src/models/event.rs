use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Every state-transition event the engine can publish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Enrolled,
    Quit,
    CycleBoundaryReached,
    CycleStarted,
    CycleCompleted,
    WeekStarted,
    WeekCompleted,
    WorkoutStarted,
    WorkoutCompleted,
    WorkoutAbandoned,
    SetLogged,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Enrolled => "ENROLLED",
            EventType::Quit => "QUIT",
            EventType::CycleBoundaryReached => "CYCLE_BOUNDARY_REACHED",
            EventType::CycleStarted => "CYCLE_STARTED",
            EventType::CycleCompleted => "CYCLE_COMPLETED",
            EventType::WeekStarted => "WEEK_STARTED",
            EventType::WeekCompleted => "WEEK_COMPLETED",
            EventType::WorkoutStarted => "WORKOUT_STARTED",
            EventType::WorkoutCompleted => "WORKOUT_COMPLETED",
            EventType::WorkoutAbandoned => "WORKOUT_ABANDONED",
            EventType::SetLogged => "SET_LOGGED",
        };
        write!(f, "{name}")
    }
}

/// An event on the in-process bus. Payloads are typed per event kind and
/// serialized as a JSON map; events are not durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl StateEvent {
    pub fn new<P: Serialize>(
        event_type: EventType,
        user_id: Uuid,
        program_id: Uuid,
        payload: &P,
    ) -> Self {
        Self {
            event_type,
            user_id,
            program_id,
            timestamp: Utc::now(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn payload_as<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// SET_LOGGED payload; `is_failure` is derived at log time so subscribers
/// never re-derive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLoggedPayload {
    pub logged_set_id: Uuid,
    pub session_id: Uuid,
    pub prescription_id: Uuid,
    pub lift_id: Uuid,
    pub set_number: i32,
    pub weight: f64,
    pub target_reps: i32,
    pub reps_performed: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reps: Option<i32>,
    pub is_amrap: bool,
    pub is_failure: bool,
    pub week_number: i32,
    pub cycle_iteration: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPayload {
    pub session_id: Uuid,
    pub week_number: i32,
    pub day_index: i32,
    pub cycle_iteration: i32,
    /// Lifts with at least one logged set; empty for WORKOUT_STARTED.
    #[serde(default)]
    pub lift_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekPayload {
    pub week_number: i32,
    pub cycle_iteration: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclePayload {
    pub cycle_iteration: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentPayload {
    pub user_program_state_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips() {
        let payload = WeekPayload {
            week_number: 4,
            cycle_iteration: 2,
        };
        let event = StateEvent::new(
            EventType::WeekCompleted,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &payload,
        );
        let back: WeekPayload = event.payload_as().unwrap();
        assert_eq!(back.week_number, 4);
        assert_eq!(back.cycle_iteration, 2);
    }

    #[test]
    fn event_type_serializes_screaming() {
        let json = serde_json::to_value(EventType::CycleBoundaryReached).unwrap();
        assert_eq!(json, "CYCLE_BOUNDARY_REACHED");
    }
}

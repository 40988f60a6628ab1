use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::EventSubscriber;
use crate::models::{
    CyclePayload, EventType, LiftMax, ProgramProgression, Progression, ProgressionLog,
    ProgressionType, SetLoggedPayload, StateEvent, TriggerType, WeekPayload, WorkoutPayload,
    DEFAULT_ROUND_TO,
};
use crate::repository::Store;

use super::rules::{self, RuleContext};

/// Which lifts an event puts in play for rule evaluation.
enum LiftScope {
    Explicit(Vec<Uuid>),
    AllProgramLifts,
}

/// The facts the engine extracts from one event before rule dispatch.
struct EventFacts {
    trigger: TriggerType,
    instance_key: String,
    lifts: LiftScope,
    reps_performed: Option<i32>,
    is_amrap: bool,
    max_reps: Option<i32>,
    week_number: Option<i32>,
}

impl EventFacts {
    fn from_event(event: &StateEvent) -> Result<Option<Self>> {
        let facts = match event.event_type {
            EventType::SetLogged => {
                let payload: SetLoggedPayload = event
                    .payload_as()
                    .map_err(|e| Error::Internal(e.into()))?;
                let trigger = if payload.is_failure {
                    TriggerType::OnFailure
                } else {
                    TriggerType::AfterSet
                };
                Self {
                    trigger,
                    instance_key: payload.logged_set_id.to_string(),
                    lifts: LiftScope::Explicit(vec![payload.lift_id]),
                    reps_performed: Some(payload.reps_performed),
                    is_amrap: payload.is_amrap,
                    max_reps: payload.max_reps,
                    week_number: Some(payload.week_number),
                }
            }
            EventType::WorkoutCompleted => {
                let payload: WorkoutPayload = event
                    .payload_as()
                    .map_err(|e| Error::Internal(e.into()))?;
                Self {
                    trigger: TriggerType::AfterSession,
                    instance_key: payload.session_id.to_string(),
                    lifts: LiftScope::Explicit(payload.lift_ids),
                    reps_performed: None,
                    is_amrap: false,
                    max_reps: None,
                    week_number: Some(payload.week_number),
                }
            }
            EventType::WeekCompleted => {
                let payload: WeekPayload = event
                    .payload_as()
                    .map_err(|e| Error::Internal(e.into()))?;
                Self {
                    trigger: TriggerType::AfterWeek,
                    instance_key: format!(
                        "{}:{}:{}:{}",
                        event.user_id, event.program_id, payload.cycle_iteration, payload.week_number
                    ),
                    lifts: LiftScope::AllProgramLifts,
                    reps_performed: None,
                    is_amrap: false,
                    max_reps: None,
                    week_number: Some(payload.week_number),
                }
            }
            EventType::CycleCompleted => {
                let payload: CyclePayload = event
                    .payload_as()
                    .map_err(|e| Error::Internal(e.into()))?;
                Self {
                    trigger: TriggerType::AfterCycle,
                    instance_key: format!(
                        "{}:{}:{}",
                        event.user_id, event.program_id, payload.cycle_iteration
                    ),
                    lifts: LiftScope::AllProgramLifts,
                    reps_performed: None,
                    is_amrap: false,
                    max_reps: None,
                    week_number: None,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(facts))
    }
}

/// One rule evaluation that produced (or refused to produce) a log row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppliedProgression {
    pub progression_id: Uuid,
    pub lift_id: Uuid,
    pub previous_value: f64,
    pub new_value: f64,
    pub delta: f64,
    pub applied: bool,
    pub error: Option<String>,
}

/// Subscribes to the engine's state events and mutates lift maxes according
/// to the program's declarative rules, exactly once per qualifying event.
#[derive(Clone)]
pub struct ProgressionEngine {
    store: Store,
}

impl ProgressionEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Event-driven entry point. Rule failures are recorded against the
    /// log and do not propagate to the action that produced the event.
    pub async fn handle_event(&self, event: &StateEvent) -> Result<Vec<AppliedProgression>> {
        let Some(facts) = EventFacts::from_event(event)? else {
            return Ok(Vec::new());
        };

        self.track_failure_streak(event).await?;

        let rounding = self.program_rounding(event.program_id).await?;
        let rows: Vec<(ProgramProgression, Progression)> = self
            .store
            .progressions
            .program_progressions(event.program_id)
            .await?
            .into_iter()
            .filter(|(_, progression)| progression.trigger == facts.trigger)
            .collect();
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let scope = self.lift_scope(event.program_id, &facts.lifts).await?;
        self.apply_rules(
            event.user_id,
            &facts,
            &rows,
            &scope,
            &event.payload,
            rounding,
            false,
        )
        .await
    }

    /// Manual trigger. `force` bypasses the idempotency check by salting
    /// the instance key; otherwise behaviour matches an event-driven run
    /// against the user's current position.
    pub async fn trigger(
        &self,
        user_id: Uuid,
        progression_id: Uuid,
        lift_id: Option<Uuid>,
        force: bool,
    ) -> Result<Vec<AppliedProgression>> {
        let state = self
            .store
            .states
            .state_for_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("enrollment", user_id))?;
        let progression = self
            .store
            .progressions
            .progression(progression_id)
            .await?
            .ok_or_else(|| Error::not_found("progression", progression_id))?;

        let rows: Vec<(ProgramProgression, Progression)> = self
            .store
            .progressions
            .program_progressions(state.program_id)
            .await?
            .into_iter()
            .filter(|(attachment, _)| attachment.progression_id == progression_id)
            .collect();
        if rows.is_empty() {
            return Err(Error::not_found("program progression", progression_id));
        }

        let instance_key = match progression.trigger {
            TriggerType::AfterCycle => format!(
                "{}:{}:{}",
                user_id, state.program_id, state.current_cycle_iteration
            ),
            TriggerType::AfterWeek => format!(
                "{}:{}:{}:{}",
                user_id, state.program_id, state.current_cycle_iteration, state.current_week
            ),
            // No natural key exists outside an event; every manual run is
            // its own instance.
            _ => format!("manual:{}", Uuid::new_v4()),
        };

        let facts = EventFacts {
            trigger: progression.trigger,
            instance_key,
            lifts: match lift_id {
                Some(lift) => LiftScope::Explicit(vec![lift]),
                None => LiftScope::AllProgramLifts,
            },
            reps_performed: None,
            is_amrap: false,
            max_reps: None,
            week_number: Some(state.current_week),
        };

        let rounding = self.program_rounding(state.program_id).await?;
        let scope = self.lift_scope(state.program_id, &facts.lifts).await?;
        let context = serde_json::json!({ "manual": true, "force": force });
        self.apply_rules(user_id, &facts, &rows, &scope, &context, rounding, force)
            .await
    }

    async fn program_rounding(&self, program_id: Uuid) -> Result<f64> {
        Ok(self
            .store
            .catalog
            .program(program_id)
            .await?
            .and_then(|p| p.default_rounding)
            .unwrap_or(DEFAULT_ROUND_TO))
    }

    async fn lift_scope(&self, program_id: Uuid, scope: &LiftScope) -> Result<Vec<Uuid>> {
        match scope {
            LiftScope::Explicit(lifts) => Ok(lifts.clone()),
            LiftScope::AllProgramLifts => self.store.catalog.program_lifts(program_id).await,
        }
    }

    /// Consecutive-failure bookkeeping for DELOAD_ON_FAILURE: a failed set
    /// extends the lift's streak, a successful one clears it.
    async fn track_failure_streak(&self, event: &StateEvent) -> Result<()> {
        if event.event_type != EventType::SetLogged {
            return Ok(());
        }
        let payload: SetLoggedPayload = event
            .payload_as()
            .map_err(|e| Error::Internal(e.into()))?;
        if payload.is_failure {
            let streak = self
                .store
                .states
                .increment_failures(event.user_id, payload.lift_id)
                .await?;
            debug!(lift = %payload.lift_id, streak, "failure streak extended");
        } else {
            self.store
                .states
                .reset_failures(event.user_id, payload.lift_id)
                .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_rules(
        &self,
        user_id: Uuid,
        facts: &EventFacts,
        rows: &[(ProgramProgression, Progression)],
        scope: &[Uuid],
        trigger_context: &serde_json::Value,
        rounding: f64,
        force: bool,
    ) -> Result<Vec<AppliedProgression>> {
        // Lift-specific attachments shadow the program-default attachment
        // of the same progression for that lift.
        let mut specific: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for (attachment, _) in rows {
            if let Some(lift) = attachment.lift_id {
                specific
                    .entry(attachment.progression_id)
                    .or_default()
                    .insert(lift);
            }
        }

        let mut results = Vec::new();
        for (attachment, progression) in rows {
            let lifts: Vec<Uuid> = match attachment.lift_id {
                Some(lift) if scope.contains(&lift) => vec![lift],
                Some(_) => continue,
                None => scope
                    .iter()
                    .copied()
                    .filter(|lift| {
                        !specific
                            .get(&attachment.progression_id)
                            .is_some_and(|s| s.contains(lift))
                    })
                    .collect(),
            };

            for lift in lifts {
                match self
                    .apply_one(
                        user_id,
                        facts,
                        attachment,
                        progression,
                        lift,
                        trigger_context,
                        rounding,
                        force,
                    )
                    .await
                {
                    Ok(Some(result)) => results.push(result),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(
                            progression = %progression.id,
                            lift = %lift,
                            error = %err,
                            "progression application failed"
                        );
                    }
                }
            }
        }
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_one(
        &self,
        user_id: Uuid,
        facts: &EventFacts,
        attachment: &ProgramProgression,
        progression: &Progression,
        lift_id: Uuid,
        trigger_context: &serde_json::Value,
        rounding: f64,
        force: bool,
    ) -> Result<Option<AppliedProgression>> {
        let instance_key = if force {
            format!("{}:forced:{}", facts.instance_key, Uuid::new_v4())
        } else {
            facts.instance_key.clone()
        };

        if !force
            && self
                .store
                .progressions
                .log_exists(user_id, progression.id, lift_id, facts.trigger, &instance_key)
                .await?
        {
            debug!(progression = %progression.id, key = %instance_key, "duplicate trigger skipped");
            return Ok(None);
        }

        let Some(current) = self
            .store
            .maxes
            .current_max(user_id, lift_id, progression.max_type)
            .await?
        else {
            debug!(lift = %lift_id, "no max to progress, skipping");
            return Ok(None);
        };

        let failure_count = if progression.progression_type == ProgressionType::DeloadOnFailure {
            self.store.states.failure_count(user_id, lift_id).await?
        } else {
            0
        };

        let context = RuleContext {
            trigger: facts.trigger,
            reps_performed: facts.reps_performed,
            is_amrap: facts.is_amrap,
            max_reps: facts.max_reps,
            week_number: facts.week_number,
            failure_count,
            override_increment: attachment.override_increment,
            rounding,
        };

        match rules::compute(progression, &context, current.value) {
            Ok(outcome) => {
                let log = ProgressionLog {
                    id: Uuid::new_v4(),
                    user_id,
                    progression_id: progression.id,
                    lift_id,
                    previous_value: current.value,
                    new_value: outcome.new_value,
                    delta: outcome.delta,
                    trigger_type: facts.trigger,
                    trigger_instance_key: instance_key,
                    trigger_context: trigger_context.clone(),
                    error: None,
                    applied_at: Utc::now(),
                };
                let new_max = (outcome.delta != 0.0).then(|| {
                    LiftMax::new(user_id, lift_id, progression.max_type, outcome.new_value)
                });
                let inserted = self
                    .store
                    .progressions
                    .apply(&log, new_max.as_ref())
                    .await?;
                if !inserted {
                    return Ok(None);
                }
                if outcome.applied
                    && progression.progression_type == ProgressionType::DeloadOnFailure
                {
                    self.store.states.reset_failures(user_id, lift_id).await?;
                }
                Ok(Some(AppliedProgression {
                    progression_id: progression.id,
                    lift_id,
                    previous_value: current.value,
                    new_value: outcome.new_value,
                    delta: outcome.delta,
                    applied: outcome.applied,
                    error: None,
                }))
            }
            Err(reason) => {
                // Record the failure against the log with an error marker;
                // the max is untouched and later rules still run.
                let log = ProgressionLog {
                    id: Uuid::new_v4(),
                    user_id,
                    progression_id: progression.id,
                    lift_id,
                    previous_value: current.value,
                    new_value: current.value,
                    delta: 0.0,
                    trigger_type: facts.trigger,
                    trigger_instance_key: instance_key,
                    trigger_context: trigger_context.clone(),
                    error: Some(reason.clone()),
                    applied_at: Utc::now(),
                };
                self.store.progressions.apply(&log, None).await?;
                warn!(progression = %progression.id, reason = %reason, "rule compute failed");
                Ok(Some(AppliedProgression {
                    progression_id: progression.id,
                    lift_id,
                    previous_value: current.value,
                    new_value: current.value,
                    delta: 0.0,
                    applied: false,
                    error: Some(reason),
                }))
            }
        }
    }
}

#[async_trait]
impl EventSubscriber for ProgressionEngine {
    fn name(&self) -> &str {
        "progression-engine"
    }

    async fn handle(&self, event: &StateEvent) -> AnyResult<()> {
        self.handle_event(event).await?;
        Ok(())
    }
}

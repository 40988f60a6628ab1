use crate::models::{
    round_to_increment, AmrapParams, CycleParams, DefinedIncrementParams, DeloadParams,
    DoubleParams, LinearParams, Progression, ProgressionType, TriggerType,
};

/// Everything a rule compute can see: the triggering event's facts, the
/// per-lift failure streak, and any per-(program, lift) increment override.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub trigger: TriggerType,
    pub reps_performed: Option<i32>,
    pub is_amrap: bool,
    pub max_reps: Option<i32>,
    pub week_number: Option<i32>,
    pub failure_count: i32,
    pub override_increment: Option<f64>,
    pub rounding: f64,
}

impl RuleContext {
    pub fn for_trigger(trigger: TriggerType, rounding: f64) -> Self {
        Self {
            trigger,
            reps_performed: None,
            is_amrap: false,
            max_reps: None,
            week_number: None,
            failure_count: 0,
            override_increment: None,
            rounding,
        }
    }
}

/// Result of a rule compute. `applied` is false when the rule matched but
/// decided not to move the max (below threshold, missing lookup entry,
/// failure streak not long enough).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub new_value: f64,
    pub delta: f64,
    pub applied: bool,
}

impl RuleOutcome {
    fn unchanged(current: f64) -> Self {
        Self {
            new_value: current,
            delta: 0.0,
            applied: false,
        }
    }

    fn moved(current: f64, new_value: f64) -> Self {
        Self {
            new_value,
            delta: new_value - current,
            applied: true,
        }
    }
}

/// Dispatch a rule by kind. Pure: same inputs, same outcome. Errors mean
/// malformed parameters and surface as PROGRESSION_FAILED upstream.
pub fn compute(
    progression: &Progression,
    context: &RuleContext,
    current: f64,
) -> Result<RuleOutcome, String> {
    match progression.progression_type {
        ProgressionType::Linear => {
            let params: LinearParams = parse(&progression.parameters)?;
            let increment = context.override_increment.unwrap_or(params.increment);
            Ok(RuleOutcome::moved(current, current + increment))
        }
        ProgressionType::Cycle => {
            if context.trigger != TriggerType::AfterCycle {
                return Ok(RuleOutcome::unchanged(current));
            }
            let params: CycleParams = parse(&progression.parameters)?;
            let increment = context.override_increment.unwrap_or(params.increment);
            Ok(RuleOutcome::moved(current, current + increment))
        }
        ProgressionType::Amrap => {
            let params: AmrapParams = parse(&progression.parameters)?;
            if !context.is_amrap {
                return Ok(RuleOutcome::unchanged(current));
            }
            let reps = context
                .reps_performed
                .ok_or_else(|| "AMRAP rule needs reps_performed".to_string())?;
            if reps >= params.threshold2 {
                Ok(RuleOutcome::moved(current, current + params.large_increment))
            } else if reps >= params.threshold1 {
                Ok(RuleOutcome::moved(current, current + params.small_increment))
            } else {
                Ok(RuleOutcome::unchanged(current))
            }
        }
        ProgressionType::DefinedIncrement => {
            let params: DefinedIncrementParams = parse(&progression.parameters)?;
            let week = context
                .week_number
                .ok_or_else(|| "DEFINED_INCREMENT rule needs a week number".to_string())?;
            match params.increments.get(&week.to_string()) {
                Some(increment) => Ok(RuleOutcome::moved(current, current + increment)),
                None => Ok(RuleOutcome::unchanged(current)),
            }
        }
        ProgressionType::DeloadOnFailure => {
            if context.trigger != TriggerType::OnFailure {
                return Ok(RuleOutcome::unchanged(current));
            }
            let params: DeloadParams = parse(&progression.parameters)?;
            if context.failure_count < params.failure_threshold {
                return Ok(RuleOutcome::unchanged(current));
            }
            let new_value = round_to_increment(
                current * (1.0 - params.deload_percent / 100.0),
                context.rounding,
            );
            Ok(RuleOutcome::moved(current, new_value))
        }
        ProgressionType::Double => {
            let params: DoubleParams = parse(&progression.parameters)?;
            let (Some(reps), Some(ceiling)) = (context.reps_performed, context.max_reps) else {
                return Ok(RuleOutcome::unchanged(current));
            };
            if reps >= ceiling {
                Ok(RuleOutcome::moved(current, current + params.increment))
            } else {
                Ok(RuleOutcome::unchanged(current))
            }
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(parameters: &serde_json::Value) -> Result<T, String> {
    serde_json::from_value(parameters.clone()).map_err(|e| format!("bad parameters: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaxType;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn progression(
        progression_type: ProgressionType,
        trigger: TriggerType,
        parameters: serde_json::Value,
    ) -> Progression {
        Progression {
            id: Uuid::new_v4(),
            name: "rule".to_string(),
            progression_type,
            parameters,
            trigger,
            max_type: MaxType::OneRm,
            created_at: Utc::now(),
        }
    }

    fn context(trigger: TriggerType) -> RuleContext {
        RuleContext::for_trigger(trigger, 5.0)
    }

    #[test]
    fn linear_adds_increment() {
        let rule = progression(
            ProgressionType::Linear,
            TriggerType::AfterSession,
            json!({"increment": 5.0}),
        );
        let outcome = compute(&rule, &context(TriggerType::AfterSession), 200.0).unwrap();
        assert_eq!(outcome, RuleOutcome { new_value: 205.0, delta: 5.0, applied: true });
    }

    #[test]
    fn linear_honors_override_increment() {
        let rule = progression(
            ProgressionType::Linear,
            TriggerType::AfterSession,
            json!({"increment": 5.0}),
        );
        let mut ctx = context(TriggerType::AfterSession);
        ctx.override_increment = Some(10.0);
        let outcome = compute(&rule, &ctx, 300.0).unwrap();
        assert_eq!(outcome.new_value, 310.0);
    }

    #[test]
    fn cycle_only_fires_after_cycle() {
        let rule = progression(
            ProgressionType::Cycle,
            TriggerType::AfterCycle,
            json!({"increment": 5.0}),
        );
        assert!(!compute(&rule, &context(TriggerType::AfterSession), 150.0)
            .unwrap()
            .applied);
        let outcome = compute(&rule, &context(TriggerType::AfterCycle), 150.0).unwrap();
        assert_eq!(outcome.new_value, 155.0);
    }

    #[test]
    fn amrap_thresholds() {
        let rule = progression(
            ProgressionType::Amrap,
            TriggerType::AfterSet,
            json!({"threshold1": 5, "small_increment": 2.5, "threshold2": 10, "large_increment": 5.0}),
        );
        let mut ctx = context(TriggerType::AfterSet);
        ctx.is_amrap = true;

        ctx.reps_performed = Some(12);
        assert_eq!(compute(&rule, &ctx, 200.0).unwrap().delta, 5.0);

        ctx.reps_performed = Some(7);
        assert_eq!(compute(&rule, &ctx, 200.0).unwrap().delta, 2.5);

        ctx.reps_performed = Some(3);
        let outcome = compute(&rule, &ctx, 200.0).unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.new_value, 200.0);
    }

    #[test]
    fn amrap_ignores_non_amrap_sets() {
        let rule = progression(
            ProgressionType::Amrap,
            TriggerType::AfterSet,
            json!({"threshold1": 5, "small_increment": 2.5, "threshold2": 10, "large_increment": 5.0}),
        );
        let mut ctx = context(TriggerType::AfterSet);
        ctx.reps_performed = Some(12);
        assert!(!compute(&rule, &ctx, 200.0).unwrap().applied);
    }

    #[test]
    fn defined_increment_reads_week_table() {
        let rule = progression(
            ProgressionType::DefinedIncrement,
            TriggerType::AfterWeek,
            json!({"increments": {"1": 5.0, "2": 2.5}}),
        );
        let mut ctx = context(TriggerType::AfterWeek);
        ctx.week_number = Some(2);
        assert_eq!(compute(&rule, &ctx, 100.0).unwrap().delta, 2.5);
        ctx.week_number = Some(3);
        assert!(!compute(&rule, &ctx, 100.0).unwrap().applied);
    }

    #[test]
    fn deload_waits_for_failure_streak_then_rounds() {
        let rule = progression(
            ProgressionType::DeloadOnFailure,
            TriggerType::OnFailure,
            json!({"deload_percent": 10.0, "failure_threshold": 3}),
        );
        let mut ctx = context(TriggerType::OnFailure);
        ctx.failure_count = 2;
        assert!(!compute(&rule, &ctx, 225.0).unwrap().applied);

        ctx.failure_count = 3;
        let outcome = compute(&rule, &ctx, 225.0).unwrap();
        // 225 * 0.9 = 202.5, rounded up to 205 at the default increment.
        assert_eq!(outcome.new_value, 205.0);
        assert!(outcome.delta < 0.0);
    }

    #[test]
    fn double_fires_at_rep_ceiling() {
        let rule = progression(
            ProgressionType::Double,
            TriggerType::AfterSet,
            json!({"increment": 2.5}),
        );
        let mut ctx = context(TriggerType::AfterSet);
        ctx.reps_performed = Some(12);
        ctx.max_reps = Some(12);
        assert_eq!(compute(&rule, &ctx, 135.0).unwrap().delta, 2.5);

        ctx.reps_performed = Some(11);
        assert!(!compute(&rule, &ctx, 135.0).unwrap().applied);

        // Not a REP_RANGE prescription: no ceiling, no move.
        ctx.max_reps = None;
        assert!(!compute(&rule, &ctx, 135.0).unwrap().applied);
    }

    #[test]
    fn malformed_parameters_error() {
        let rule = progression(
            ProgressionType::Linear,
            TriggerType::AfterSession,
            json!({"nope": true}),
        );
        assert!(compute(&rule, &context(TriggerType::AfterSession), 100.0).is_err());
    }
}

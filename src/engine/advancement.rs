use chrono::Utc;

use crate::error::Result;
use crate::models::{
    CyclePayload, CycleStatus, EnrollmentStatus, EventType, StateEvent, UserProgramState,
    WeekPayload, WeekStatus,
};

use super::machines::StateMachine;

/// What the caller knows about the surrounding schedule when advancing.
#[derive(Debug, Clone, Copy)]
pub struct AdvanceContext {
    pub days_in_current_week: i32,
    pub cycle_length_weeks: i32,
}

/// The advanced state plus the events the transition produced, in the
/// order they must publish: WEEK_COMPLETED before CYCLE_COMPLETED before
/// CYCLE_BOUNDARY_REACHED.
#[derive(Debug)]
pub struct AdvanceOutcome {
    pub state: UserProgramState,
    pub events: Vec<StateEvent>,
}

/// Advance one day. Crossing the end of the week cascades into a week
/// advance; crossing the last week of the cycle parks the enrollment
/// BETWEEN_CYCLES. The cycle iteration is never incremented here; that
/// takes an explicit start-next-cycle action.
pub fn advance_day(state: &UserProgramState, ctx: AdvanceContext) -> Result<AdvanceOutcome> {
    let mut next = state.clone();
    next.current_day_index += 1;
    if next.current_day_index >= ctx.days_in_current_week {
        return advance_week_inner(next, ctx);
    }
    next.updated_at = Utc::now();
    Ok(AdvanceOutcome {
        state: next,
        events: Vec::new(),
    })
}

/// Advance to the next week regardless of remaining days (also the manual
/// advance-week operation).
pub fn advance_week(state: &UserProgramState, ctx: AdvanceContext) -> Result<AdvanceOutcome> {
    advance_week_inner(state.clone(), ctx)
}

fn advance_week_inner(
    mut next: UserProgramState,
    ctx: AdvanceContext,
) -> Result<AdvanceOutcome> {
    let mut events = Vec::new();
    let completed_week = next.current_week;

    if next.week_status == WeekStatus::InProgress {
        next.week_status = next.week_status.transition_to(WeekStatus::Completed)?;
        events.push(StateEvent::new(
            EventType::WeekCompleted,
            next.user_id,
            next.program_id,
            &WeekPayload {
                week_number: completed_week,
                cycle_iteration: next.current_cycle_iteration,
            },
        ));
    }

    next.current_week += 1;
    next.current_day_index = 0;

    if next.current_week > ctx.cycle_length_weeks {
        if next.cycle_status == CycleStatus::InProgress {
            next.cycle_status = next.cycle_status.transition_to(CycleStatus::Completed)?;
            events.push(StateEvent::new(
                EventType::CycleCompleted,
                next.user_id,
                next.program_id,
                &CyclePayload {
                    cycle_iteration: next.current_cycle_iteration,
                },
            ));
        }
        next.enrollment_status = next
            .enrollment_status
            .transition_to(EnrollmentStatus::BetweenCycles)?;
        events.push(StateEvent::new(
            EventType::CycleBoundaryReached,
            next.user_id,
            next.program_id,
            &CyclePayload {
                cycle_iteration: next.current_cycle_iteration,
            },
        ));
    } else if next.week_status == WeekStatus::Completed {
        // Reset the machine for the new week.
        next.week_status = next.week_status.transition_to(WeekStatus::Pending)?;
    }

    next.updated_at = Utc::now();
    Ok(AdvanceOutcome {
        state: next,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn mid_week_state() -> UserProgramState {
        let mut state = UserProgramState::enroll(Uuid::new_v4(), Uuid::new_v4());
        state.cycle_status = CycleStatus::InProgress;
        state.week_status = WeekStatus::InProgress;
        state
    }

    const CTX: AdvanceContext = AdvanceContext {
        days_in_current_week: 3,
        cycle_length_weeks: 4,
    };

    #[test]
    fn day_advance_within_week() {
        let state = mid_week_state();
        let outcome = advance_day(&state, CTX).unwrap();
        assert_eq!(outcome.state.current_day_index, 1);
        assert_eq!(outcome.state.current_week, 1);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn last_day_rolls_into_next_week() {
        let mut state = mid_week_state();
        state.current_day_index = 2;
        let outcome = advance_day(&state, CTX).unwrap();
        assert_eq!(outcome.state.current_week, 2);
        assert_eq!(outcome.state.current_day_index, 0);
        assert_eq!(outcome.state.week_status, WeekStatus::Pending);
        assert_eq!(
            outcome.events.iter().map(|e| e.event_type).collect::<Vec<_>>(),
            vec![EventType::WeekCompleted]
        );
    }

    #[test]
    fn last_week_parks_enrollment_between_cycles() {
        let mut state = mid_week_state();
        state.current_week = 4;
        state.current_day_index = 2;
        let outcome = advance_day(&state, CTX).unwrap();
        assert_eq!(outcome.state.enrollment_status, EnrollmentStatus::BetweenCycles);
        assert_eq!(outcome.state.cycle_status, CycleStatus::Completed);
        assert_eq!(outcome.state.week_status, WeekStatus::Completed);
        // Iteration is untouched until the user starts the next cycle.
        assert_eq!(outcome.state.current_cycle_iteration, 1);
        assert_eq!(
            outcome.events.iter().map(|e| e.event_type).collect::<Vec<_>>(),
            vec![
                EventType::WeekCompleted,
                EventType::CycleCompleted,
                EventType::CycleBoundaryReached
            ]
        );
    }

    #[test]
    fn manual_week_advance_skips_remaining_days() {
        let state = mid_week_state();
        let outcome = advance_week(&state, CTX).unwrap();
        assert_eq!(outcome.state.current_week, 2);
        assert_eq!(outcome.state.current_day_index, 0);
        assert_eq!(
            outcome.events.iter().map(|e| e.event_type).collect::<Vec<_>>(),
            vec![EventType::WeekCompleted]
        );
    }

    #[test]
    fn pending_week_advances_without_completion_event() {
        let mut state = mid_week_state();
        state.week_status = WeekStatus::Pending;
        let outcome = advance_week(&state, CTX).unwrap();
        assert_eq!(outcome.state.current_week, 2);
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.state.week_status, WeekStatus::Pending);
    }
}

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::models::{
    CycleStatus, EnrollmentPayload, EnrollmentStatus, EventType, StateEvent, UserProgramState,
    WeekStatus, WorkoutSession,
};
use crate::repository::Store;

use super::advancement::{self, AdvanceContext};
use super::machines::StateMachine;
use super::schedule::days_in_week;

/// Enrollment lifecycle: enroll, quit, the between-cycles gate, and the
/// manual week advance.
#[derive(Clone)]
pub struct EnrollmentService {
    store: Store,
    bus: EventBus,
}

impl EnrollmentService {
    pub fn new(store: Store, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Enroll the user. A user holds exactly one non-QUIT state at a time.
    pub async fn enroll(&self, user_id: Uuid, program_id: Uuid) -> Result<UserProgramState> {
        let program = self
            .store
            .catalog
            .program(program_id)
            .await?
            .ok_or_else(|| Error::not_found("program", program_id))?;
        let state = UserProgramState::enroll(user_id, program.id);
        self.store.states.insert_state(&state).await?;
        info!(user = %user_id, program = %program.slug, "user enrolled");

        self.publish(&[StateEvent::new(
            EventType::Enrolled,
            user_id,
            program.id,
            &EnrollmentPayload {
                user_program_state_id: state.id,
            },
        )])
        .await;
        Ok(state)
    }

    /// Quit the program. QUIT is terminal.
    pub async fn quit(&self, user_id: Uuid) -> Result<UserProgramState> {
        let state = self.require_state(user_id).await?;
        let mut next = state.clone();
        next.enrollment_status = next
            .enrollment_status
            .transition_to(EnrollmentStatus::Quit)?;
        let expected = state.updated_at;
        next.updated_at = Utc::now();
        self.store.states.update_state(&next, expected).await?;
        info!(user = %user_id, "user quit program");

        self.publish(&[StateEvent::new(
            EventType::Quit,
            user_id,
            next.program_id,
            &EnrollmentPayload {
                user_program_state_id: next.id,
            },
        )])
        .await;
        Ok(next)
    }

    /// BETWEEN_CYCLES -> ACTIVE: reset the cycle and week machines, bump
    /// the iteration, move back to week 1 day 0. Explicit user action; the
    /// cycle boundary never does this on its own.
    pub async fn start_next_cycle(&self, user_id: Uuid) -> Result<UserProgramState> {
        let state = self.require_state(user_id).await?;
        if state.enrollment_status != EnrollmentStatus::BetweenCycles {
            return Err(Error::InvalidEnrollmentState {
                status: state.enrollment_status,
            });
        }

        let mut next = state.clone();
        next.enrollment_status = next
            .enrollment_status
            .transition_to(EnrollmentStatus::Active)?;
        next.cycle_status = next.cycle_status.transition_to(CycleStatus::Pending)?;
        next.week_status = next.week_status.transition_to(WeekStatus::Pending)?;
        next.current_cycle_iteration += 1;
        next.current_week = 1;
        next.current_day_index = 0;

        let expected = state.updated_at;
        next.updated_at = Utc::now();
        self.store.states.update_state(&next, expected).await?;
        info!(
            user = %user_id,
            iteration = next.current_cycle_iteration,
            "next cycle started"
        );
        Ok(next)
    }

    /// Manual week advance, skipping any remaining days.
    pub async fn advance_week(&self, user_id: Uuid) -> Result<UserProgramState> {
        let state = self.require_state(user_id).await?;
        if !state.is_active() {
            return Err(Error::InvalidEnrollmentState {
                status: state.enrollment_status,
            });
        }
        let program = self
            .store
            .catalog
            .program(state.program_id)
            .await?
            .ok_or_else(|| Error::not_found("program", state.program_id))?;
        let cycle = self
            .store
            .catalog
            .cycle(program.cycle_id)
            .await?
            .ok_or_else(|| Error::not_found("cycle", program.cycle_id))?;
        let days =
            days_in_week(&self.store.catalog, program.cycle_id, state.current_week).await?;

        let outcome = advancement::advance_week(
            &state,
            AdvanceContext {
                days_in_current_week: days,
                cycle_length_weeks: cycle.length_weeks,
            },
        )?;

        let expected = state.updated_at;
        self.store.states.update_state(&outcome.state, expected).await?;
        self.publish(&outcome.events).await;
        Ok(outcome.state)
    }

    /// Full state plus the in-progress session, if one exists.
    pub async fn enrollment_info(
        &self,
        user_id: Uuid,
    ) -> Result<(UserProgramState, Option<WorkoutSession>)> {
        let state = self.require_state(user_id).await?;
        let session = self.store.sessions.in_progress_session(state.id).await?;
        Ok((state, session))
    }

    async fn require_state(&self, user_id: Uuid) -> Result<UserProgramState> {
        self.store
            .states
            .state_for_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("enrollment", user_id))
    }

    async fn publish(&self, events: &[StateEvent]) {
        if let Err(err) = self.bus.publish_all(events).await {
            warn!(error = %err, "event subscriber failed after commit");
        }
    }
}

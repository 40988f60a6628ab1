use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::models::{
    CyclePayload, CycleStatus, EventType, LoggedSet, SessionStatus, SetLoggedPayload, StateEvent,
    UserProgramState, WeekPayload, WeekStatus, WorkoutPayload, WorkoutSession,
};
use crate::repository::Store;

use super::advancement::{self, AdvanceContext};
use super::machines::StateMachine;
use super::schedule::{days_in_week, Scheduler};

/// Input for logging one set; the lift and the rep ceiling come from the
/// prescription.
#[derive(Debug, Clone)]
pub struct LogSetInput {
    pub prescription_id: Uuid,
    pub set_number: i32,
    pub weight: f64,
    pub target_reps: i32,
    pub reps_performed: i32,
    pub is_amrap: bool,
}

/// Lifecycle of a single workout session: start, set logging, finish with
/// advancement, abandon. Events publish after the state commit.
#[derive(Clone)]
pub struct SessionService {
    store: Store,
    bus: EventBus,
    scheduler: Scheduler,
}

impl SessionService {
    pub fn new(store: Store, bus: EventBus) -> Self {
        let scheduler = Scheduler::new(store.catalog.clone());
        Self {
            store,
            bus,
            scheduler,
        }
    }

    /// Start the user's current workout. The first session of a pending
    /// cycle or week flips those machines to IN_PROGRESS.
    pub async fn start_session(&self, user_id: Uuid) -> Result<WorkoutSession> {
        let state = self.require_state(user_id).await?;
        if !state.is_active() {
            return Err(Error::InvalidEnrollmentState {
                status: state.enrollment_status,
            });
        }
        if let Some(existing) = self.store.sessions.in_progress_session(state.id).await? {
            return Err(Error::WorkoutAlreadyInProgress {
                session_id: existing.id,
            });
        }

        let session = WorkoutSession::start(state.id, state.current_week, state.current_day_index);
        let mut next = state.clone();
        let mut events = Vec::new();

        if next.cycle_status == CycleStatus::Pending {
            next.cycle_status = next.cycle_status.transition_to(CycleStatus::InProgress)?;
            events.push(StateEvent::new(
                EventType::CycleStarted,
                next.user_id,
                next.program_id,
                &CyclePayload {
                    cycle_iteration: next.current_cycle_iteration,
                },
            ));
        }
        if next.week_status == WeekStatus::Pending {
            next.week_status = next.week_status.transition_to(WeekStatus::InProgress)?;
            events.push(StateEvent::new(
                EventType::WeekStarted,
                next.user_id,
                next.program_id,
                &WeekPayload {
                    week_number: next.current_week,
                    cycle_iteration: next.current_cycle_iteration,
                },
            ));
        }
        events.push(StateEvent::new(
            EventType::WorkoutStarted,
            next.user_id,
            next.program_id,
            &WorkoutPayload {
                session_id: session.id,
                week_number: session.week_number,
                day_index: session.day_index,
                cycle_iteration: next.current_cycle_iteration,
                lift_ids: Vec::new(),
            },
        ));

        let expected = state.updated_at;
        next.updated_at = Utc::now();
        self.store
            .sessions
            .create_session(&session, &next, expected)
            .await?;
        info!(user = %user_id, session = %session.id, "workout session started");

        self.publish(&events).await;
        Ok(session)
    }

    /// Upsert one logged set and emit SET_LOGGED.
    pub async fn log_set(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        input: LogSetInput,
    ) -> Result<LoggedSet> {
        let (session, state) = self.owned_session(user_id, session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(Error::NoActiveSession);
        }

        let prescription = self
            .store
            .catalog
            .prescription(input.prescription_id)
            .await?
            .ok_or_else(|| Error::not_found("prescription", input.prescription_id))?;

        let set = LoggedSet {
            id: Uuid::new_v4(),
            session_id,
            prescription_id: prescription.id,
            lift_id: prescription.lift_id,
            set_number: input.set_number,
            weight: input.weight,
            target_reps: input.target_reps,
            reps_performed: input.reps_performed,
            is_amrap: input.is_amrap,
            created_at: Utc::now(),
        };
        set.validate()?;
        let stored = self.store.sessions.upsert_logged_set(&set).await?;

        let event = StateEvent::new(
            EventType::SetLogged,
            user_id,
            state.program_id,
            &SetLoggedPayload {
                logged_set_id: stored.id,
                session_id,
                prescription_id: stored.prescription_id,
                lift_id: stored.lift_id,
                set_number: stored.set_number,
                weight: stored.weight,
                target_reps: stored.target_reps,
                reps_performed: stored.reps_performed,
                max_reps: prescription.set_scheme.rep_ceiling(),
                is_amrap: stored.is_amrap,
                is_failure: stored.is_failure(),
                week_number: session.week_number,
                cycle_iteration: state.current_cycle_iteration,
            },
        );
        self.publish(&[event]).await;
        Ok(stored)
    }

    /// Finish the current session: IN_PROGRESS -> COMPLETED, then advance
    /// the user's position one day (cascading into week and cycle
    /// boundaries). Events publish after the commit, state events first.
    pub async fn finish_current(&self, user_id: Uuid) -> Result<(WorkoutSession, UserProgramState)> {
        let state = self.require_state(user_id).await?;
        let session = self
            .store
            .sessions
            .in_progress_session(state.id)
            .await?
            .ok_or(Error::NoActiveSession)?;

        let mut finished = session.clone();
        finished.status = finished.status.transition_to(SessionStatus::Completed)?;
        finished.finished_at = Some(Utc::now());

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
        let schedule = self
            .scheduler
            .effective_schedule(&program, &state, Utc::now().date_naive())
            .await?;
        let days = days_in_week(&self.store.catalog, program.cycle_id, schedule.week_number).await?;

        let outcome = advancement::advance_day(
            &state,
            AdvanceContext {
                days_in_current_week: days,
                cycle_length_weeks: cycle.length_weeks,
            },
        )?;

        let logged = self.store.sessions.logged_sets(session.id).await?;
        let mut lift_ids: Vec<Uuid> = logged.iter().map(|s| s.lift_id).collect();
        lift_ids.sort();
        lift_ids.dedup();

        let mut events = vec![StateEvent::new(
            EventType::WorkoutCompleted,
            user_id,
            state.program_id,
            &WorkoutPayload {
                session_id: session.id,
                week_number: session.week_number,
                day_index: session.day_index,
                cycle_iteration: state.current_cycle_iteration,
                lift_ids,
            },
        )];
        events.extend(outcome.events);

        let expected = state.updated_at;
        self.store
            .sessions
            .complete_session(&finished, &outcome.state, expected)
            .await?;
        info!(user = %user_id, session = %session.id, "workout session finished");

        self.publish(&events).await;
        Ok((finished, outcome.state))
    }

    /// IN_PROGRESS -> ABANDONED. No advancement.
    pub async fn abandon_current(&self, user_id: Uuid) -> Result<WorkoutSession> {
        let state = self.require_state(user_id).await?;
        let session = self
            .store
            .sessions
            .in_progress_session(state.id)
            .await?
            .ok_or(Error::NoActiveSession)?;

        let mut abandoned = session.clone();
        abandoned.status = abandoned.status.transition_to(SessionStatus::Abandoned)?;
        abandoned.finished_at = Some(Utc::now());

        let expected = state.updated_at;
        self.store
            .sessions
            .complete_session(&abandoned, &state, expected)
            .await?;

        let event = StateEvent::new(
            EventType::WorkoutAbandoned,
            user_id,
            state.program_id,
            &WorkoutPayload {
                session_id: session.id,
                week_number: session.week_number,
                day_index: session.day_index,
                cycle_iteration: state.current_cycle_iteration,
                lift_ids: Vec::new(),
            },
        );
        self.publish(&[event]).await;
        Ok(abandoned)
    }

    pub async fn current_session(&self, user_id: Uuid) -> Result<Option<WorkoutSession>> {
        let state = self.require_state(user_id).await?;
        self.store.sessions.in_progress_session(state.id).await
    }

    pub async fn logged_sets(&self, user_id: Uuid, session_id: Uuid) -> Result<Vec<LoggedSet>> {
        let (session, _) = self.owned_session(user_id, session_id).await?;
        self.store.sessions.logged_sets(session.id).await
    }

    async fn require_state(&self, user_id: Uuid) -> Result<UserProgramState> {
        self.store
            .states
            .state_for_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("enrollment", user_id))
    }

    async fn owned_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<(WorkoutSession, UserProgramState)> {
        let session = self
            .store
            .sessions
            .session(session_id)
            .await?
            .ok_or_else(|| Error::not_found("workout session", session_id))?;
        let state = self
            .store
            .states
            .state(session.user_program_state_id)
            .await?
            .ok_or_else(|| Error::not_found("user program state", session.user_program_state_id))?;
        if state.user_id != user_id {
            return Err(Error::Forbidden);
        }
        Ok((session, state))
    }

    /// Post-commit publish. Subscriber failures are logged, never surfaced
    /// to the action that produced the events.
    async fn publish(&self, events: &[StateEvent]) {
        if let Err(err) = self.bus.publish_all(events).await {
            warn!(error = %err, "event subscriber failed after commit");
        }
    }
}

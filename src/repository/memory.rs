use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Cycle, DailyLookup, Day, EnrollmentStatus, Lift, LiftMax, LoggedSet, MaxType, Prescription,
    Program, ProgramProgression, Progression, ProgressionLog, TriggerType, UserProgramState, Week,
    WeeklyLookup, WorkoutSession,
};

use super::{
    CatalogRepository, MaxRepository, ProgressionRepository, SessionRepository, StateRepository,
};

#[derive(Default)]
struct Inner {
    lifts: HashMap<Uuid, Lift>,
    programs: HashMap<Uuid, Program>,
    cycles: HashMap<Uuid, Cycle>,
    weeks: Vec<Week>,
    days: HashMap<Uuid, Day>,
    prescriptions: HashMap<Uuid, Prescription>,
    weekly_lookups: HashMap<Uuid, WeeklyLookup>,
    daily_lookups: HashMap<Uuid, DailyLookup>,
    states: HashMap<Uuid, UserProgramState>,
    sessions: HashMap<Uuid, WorkoutSession>,
    logged_sets: Vec<LoggedSet>,
    maxes: Vec<LiftMax>,
    progressions: HashMap<Uuid, Progression>,
    program_progressions: Vec<ProgramProgression>,
    progression_logs: Vec<ProgressionLog>,
    failure_counters: HashMap<(Uuid, Uuid), i32>,
}

/// In-process store used by tests and demos. One mutex over the whole
/// store gives every compound method the same atomicity and per-user
/// serialisation the Postgres implementation gets from transactions and
/// row locks.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }

    // Catalog seeding, used by tests and demo wiring.

    pub fn insert_lift(&self, lift: Lift) {
        self.lock().lifts.insert(lift.id, lift);
    }

    pub fn insert_program(&self, program: Program) {
        self.lock().programs.insert(program.id, program);
    }

    pub fn insert_cycle(&self, cycle: Cycle) {
        self.lock().cycles.insert(cycle.id, cycle);
    }

    pub fn insert_week(&self, week: Week) {
        self.lock().weeks.push(week);
    }

    pub fn insert_day(&self, day: Day) {
        self.lock().days.insert(day.id, day);
    }

    pub fn insert_prescription(&self, prescription: Prescription) {
        self.lock()
            .prescriptions
            .insert(prescription.id, prescription);
    }

    pub fn insert_weekly_lookup(&self, lookup: WeeklyLookup) {
        self.lock().weekly_lookups.insert(lookup.id, lookup);
    }

    pub fn insert_daily_lookup(&self, lookup: DailyLookup) {
        self.lock().daily_lookups.insert(lookup.id, lookup);
    }

    pub fn insert_progression(&self, progression: Progression) {
        self.lock()
            .progressions
            .insert(progression.id, progression);
    }

    pub fn insert_program_progression(&self, attachment: ProgramProgression) {
        self.lock().program_progressions.push(attachment);
    }
}

#[async_trait]
impl CatalogRepository for MemoryRepository {
    async fn lift(&self, id: Uuid) -> Result<Option<Lift>> {
        Ok(self.lock().lifts.get(&id).cloned())
    }

    async fn lift_by_slug(&self, slug: &str) -> Result<Option<Lift>> {
        Ok(self.lock().lifts.values().find(|l| l.slug == slug).cloned())
    }

    async fn program(&self, id: Uuid) -> Result<Option<Program>> {
        Ok(self.lock().programs.get(&id).cloned())
    }

    async fn cycle(&self, id: Uuid) -> Result<Option<Cycle>> {
        Ok(self.lock().cycles.get(&id).cloned())
    }

    async fn week(&self, cycle_id: Uuid, week_number: i32) -> Result<Option<Week>> {
        Ok(self
            .lock()
            .weeks
            .iter()
            .find(|w| w.cycle_id == cycle_id && w.week_number == week_number)
            .cloned())
    }

    async fn day(&self, id: Uuid) -> Result<Option<Day>> {
        Ok(self.lock().days.get(&id).cloned())
    }

    async fn prescription(&self, id: Uuid) -> Result<Option<Prescription>> {
        Ok(self.lock().prescriptions.get(&id).cloned())
    }

    async fn weekly_lookup(&self, id: Uuid) -> Result<Option<WeeklyLookup>> {
        Ok(self.lock().weekly_lookups.get(&id).cloned())
    }

    async fn daily_lookup(&self, id: Uuid) -> Result<Option<DailyLookup>> {
        Ok(self.lock().daily_lookups.get(&id).cloned())
    }

    async fn program_lifts(&self, program_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.lock();
        let Some(program) = inner.programs.get(&program_id) else {
            return Ok(Vec::new());
        };
        let day_ids: Vec<Uuid> = inner
            .weeks
            .iter()
            .filter(|w| w.cycle_id == program.cycle_id)
            .flat_map(|w| w.day_order.iter().copied())
            .collect();
        let mut lift_ids: Vec<Uuid> = day_ids
            .iter()
            .filter_map(|day_id| inner.days.get(day_id))
            .flat_map(|day| day.prescription_order.iter())
            .filter_map(|rx_id| inner.prescriptions.get(rx_id))
            .map(|rx| rx.lift_id)
            .collect();
        lift_ids.sort();
        lift_ids.dedup();
        Ok(lift_ids)
    }
}

#[async_trait]
impl StateRepository for MemoryRepository {
    async fn state_for_user(&self, user_id: Uuid) -> Result<Option<UserProgramState>> {
        Ok(self
            .lock()
            .states
            .values()
            .find(|s| s.user_id == user_id && s.enrollment_status != EnrollmentStatus::Quit)
            .cloned())
    }

    async fn state(&self, id: Uuid) -> Result<Option<UserProgramState>> {
        Ok(self.lock().states.get(&id).cloned())
    }

    async fn insert_state(&self, state: &UserProgramState) -> Result<()> {
        let mut inner = self.lock();
        let already_enrolled = inner.states.values().any(|s| {
            s.user_id == state.user_id && s.enrollment_status != EnrollmentStatus::Quit
        });
        if already_enrolled {
            return Err(Error::Conflict(
                "user already has an active enrollment".to_string(),
            ));
        }
        inner.states.insert(state.id, state.clone());
        Ok(())
    }

    async fn update_state(
        &self,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let stored = inner
            .states
            .get_mut(&state.id)
            .ok_or_else(|| Error::not_found("user program state", state.id))?;
        if stored.updated_at != expected_updated_at {
            return Err(Error::Conflict("stale program state".to_string()));
        }
        *stored = state.clone();
        Ok(())
    }

    async fn failure_count(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32> {
        Ok(self
            .lock()
            .failure_counters
            .get(&(user_id, lift_id))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32> {
        let mut inner = self.lock();
        let counter = inner.failure_counters.entry((user_id, lift_id)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn reset_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<()> {
        self.lock().failure_counters.remove(&(user_id, lift_id));
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryRepository {
    async fn session(&self, id: Uuid) -> Result<Option<WorkoutSession>> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn in_progress_session(&self, state_id: Uuid) -> Result<Option<WorkoutSession>> {
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| {
                s.user_program_state_id == state_id
                    && s.status == crate::models::SessionStatus::InProgress
            })
            .cloned())
    }

    async fn create_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let stored = inner
            .states
            .get(&state.id)
            .ok_or_else(|| Error::not_found("user program state", state.id))?;
        if stored.updated_at != expected_updated_at {
            return Err(Error::Conflict("stale program state".to_string()));
        }
        inner.sessions.insert(session.id, session.clone());
        inner.states.insert(state.id, state.clone());
        Ok(())
    }

    async fn complete_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let stored = inner
            .states
            .get(&state.id)
            .ok_or_else(|| Error::not_found("user program state", state.id))?;
        if stored.updated_at != expected_updated_at {
            return Err(Error::Conflict("stale program state".to_string()));
        }
        inner.sessions.insert(session.id, session.clone());
        inner.states.insert(state.id, state.clone());
        Ok(())
    }

    async fn upsert_logged_set(&self, set: &LoggedSet) -> Result<LoggedSet> {
        let mut inner = self.lock();
        if let Some(existing) = inner.logged_sets.iter_mut().find(|s| {
            s.session_id == set.session_id
                && s.prescription_id == set.prescription_id
                && s.set_number == set.set_number
        }) {
            let mut updated = set.clone();
            updated.id = existing.id;
            updated.created_at = existing.created_at;
            *existing = updated.clone();
            return Ok(updated);
        }
        inner.logged_sets.push(set.clone());
        Ok(set.clone())
    }

    async fn logged_sets(&self, session_id: Uuid) -> Result<Vec<LoggedSet>> {
        let mut sets: Vec<LoggedSet> = self
            .lock()
            .logged_sets
            .iter()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        sets.sort_by_key(|s| (s.created_at, s.set_number));
        Ok(sets)
    }
}

#[async_trait]
impl MaxRepository for MemoryRepository {
    async fn current_max(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Option<LiftMax>> {
        Ok(self
            .lock()
            .maxes
            .iter()
            .filter(|m| m.user_id == user_id && m.lift_id == lift_id && m.max_type == max_type)
            .max_by_key(|m| (m.effective_date, m.created_at))
            .cloned())
    }

    async fn insert_max(&self, max: &LiftMax) -> Result<()> {
        self.lock().maxes.push(max.clone());
        Ok(())
    }

    async fn max_history(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Vec<LiftMax>> {
        let mut history: Vec<LiftMax> = self
            .lock()
            .maxes
            .iter()
            .filter(|m| m.user_id == user_id && m.lift_id == lift_id && m.max_type == max_type)
            .cloned()
            .collect();
        history.sort_by_key(|m| (m.effective_date, m.created_at));
        Ok(history)
    }
}

#[async_trait]
impl ProgressionRepository for MemoryRepository {
    async fn progression(&self, id: Uuid) -> Result<Option<Progression>> {
        Ok(self.lock().progressions.get(&id).cloned())
    }

    async fn program_progressions(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<(ProgramProgression, Progression)>> {
        let inner = self.lock();
        let mut rows: Vec<(ProgramProgression, Progression)> = inner
            .program_progressions
            .iter()
            .filter(|pp| pp.program_id == program_id && pp.enabled)
            .filter_map(|pp| {
                inner
                    .progressions
                    .get(&pp.progression_id)
                    .map(|p| (pp.clone(), p.clone()))
            })
            .collect();
        rows.sort_by_key(|(pp, _)| (pp.priority, pp.created_at));
        Ok(rows)
    }

    async fn log_exists(
        &self,
        user_id: Uuid,
        progression_id: Uuid,
        lift_id: Uuid,
        trigger_type: TriggerType,
        trigger_instance_key: &str,
    ) -> Result<bool> {
        Ok(self.lock().progression_logs.iter().any(|log| {
            log.user_id == user_id
                && log.progression_id == progression_id
                && log.lift_id == lift_id
                && log.trigger_type == trigger_type
                && log.trigger_instance_key == trigger_instance_key
        }))
    }

    async fn apply(&self, log: &ProgressionLog, new_max: Option<&LiftMax>) -> Result<bool> {
        let mut inner = self.lock();
        let duplicate = inner.progression_logs.iter().any(|existing| {
            existing.user_id == log.user_id
                && existing.progression_id == log.progression_id
                && existing.lift_id == log.lift_id
                && existing.trigger_type == log.trigger_type
                && existing.trigger_instance_key == log.trigger_instance_key
        });
        if duplicate {
            return Ok(false);
        }
        inner.progression_logs.push(log.clone());
        if let Some(max) = new_max {
            inner.maxes.push(max.clone());
        }
        Ok(true)
    }

    async fn logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProgressionLog>, i64)> {
        let inner = self.lock();
        let mut logs: Vec<ProgressionLog> = inner
            .progression_logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| std::cmp::Reverse(log.applied_at));
        let total = logs.len() as i64;
        let page = logs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

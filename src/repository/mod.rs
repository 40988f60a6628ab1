// Store abstractions the engine consumes. No SQL leaks past this boundary;
// compound methods are atomic in every implementation so a business
// operation is a single commit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Cycle, DailyLookup, Day, Lift, LiftMax, LoggedSet, MaxType, Prescription, Program,
    ProgramProgression, Progression, ProgressionLog, TriggerType, UserProgramState, Week,
    WeeklyLookup, WorkoutSession,
};

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Read-only access to the program catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn lift(&self, id: Uuid) -> Result<Option<Lift>>;
    async fn lift_by_slug(&self, slug: &str) -> Result<Option<Lift>>;
    async fn program(&self, id: Uuid) -> Result<Option<Program>>;
    async fn cycle(&self, id: Uuid) -> Result<Option<Cycle>>;
    async fn week(&self, cycle_id: Uuid, week_number: i32) -> Result<Option<Week>>;
    async fn day(&self, id: Uuid) -> Result<Option<Day>>;
    async fn prescription(&self, id: Uuid) -> Result<Option<Prescription>>;
    async fn weekly_lookup(&self, id: Uuid) -> Result<Option<WeeklyLookup>>;
    async fn daily_lookup(&self, id: Uuid) -> Result<Option<DailyLookup>>;
    /// Distinct lifts referenced by any prescription in the program's cycle.
    async fn program_lifts(&self, program_id: Uuid) -> Result<Vec<Uuid>>;
}

/// The user's program position plus per-lift failure counters.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// The user's single non-QUIT state, if any.
    async fn state_for_user(&self, user_id: Uuid) -> Result<Option<UserProgramState>>;
    async fn state(&self, id: Uuid) -> Result<Option<UserProgramState>>;
    /// Fails with CONFLICT when the user already has a non-QUIT state.
    async fn insert_state(&self, state: &UserProgramState) -> Result<()>;
    /// Optimistic write: fails with CONFLICT when the stored row's
    /// `updated_at` no longer matches `expected_updated_at`.
    async fn update_state(
        &self,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn failure_count(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32>;
    async fn increment_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32>;
    async fn reset_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<()>;
}

/// Workout sessions and their logged sets.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn session(&self, id: Uuid) -> Result<Option<WorkoutSession>>;
    async fn in_progress_session(&self, state_id: Uuid) -> Result<Option<WorkoutSession>>;
    /// Atomically insert the session and write the state row (optimistic on
    /// `expected_updated_at`).
    async fn create_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Atomically write the finished/abandoned session and the advanced
    /// state row.
    async fn complete_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Upsert by (session, prescription, set number); the stored row keeps
    /// its original id on overwrite.
    async fn upsert_logged_set(&self, set: &LoggedSet) -> Result<LoggedSet>;
    async fn logged_sets(&self, session_id: Uuid) -> Result<Vec<LoggedSet>>;
}

/// Append-only lift max series.
#[async_trait]
pub trait MaxRepository: Send + Sync {
    async fn current_max(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Option<LiftMax>>;
    async fn insert_max(&self, max: &LiftMax) -> Result<()>;
    async fn max_history(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Vec<LiftMax>>;
}

/// Progression rules, their program attachments, and the idempotent
/// application log.
#[async_trait]
pub trait ProgressionRepository: Send + Sync {
    async fn progression(&self, id: Uuid) -> Result<Option<Progression>>;
    /// Enabled attachments for the program, ordered by priority ascending
    /// then creation, each joined with its rule.
    async fn program_progressions(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<(ProgramProgression, Progression)>>;
    async fn log_exists(
        &self,
        user_id: Uuid,
        progression_id: Uuid,
        lift_id: Uuid,
        trigger_type: TriggerType,
        trigger_instance_key: &str,
    ) -> Result<bool>;
    /// Atomically insert the log row and, when present, the new max row.
    /// Returns false without writing when the idempotency key (scoped per
    /// lift) already exists.
    async fn apply(&self, log: &ProgressionLog, new_max: Option<&LiftMax>) -> Result<bool>;
    async fn logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProgressionLog>, i64)>;
}

/// The bundle of repositories the engine components share.
#[derive(Clone)]
pub struct Store {
    pub catalog: Arc<dyn CatalogRepository>,
    pub states: Arc<dyn StateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub maxes: Arc<dyn MaxRepository>,
    pub progressions: Arc<dyn ProgressionRepository>,
}

impl Store {
    /// All repositories backed by one in-memory store.
    pub fn in_memory() -> (Self, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        (Self::from_memory(repo.clone()), repo)
    }

    pub fn from_memory(repo: Arc<MemoryRepository>) -> Self {
        Self {
            catalog: repo.clone(),
            states: repo.clone(),
            sessions: repo.clone(),
            maxes: repo.clone(),
            progressions: repo,
        }
    }

    /// All repositories backed by one Postgres pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let repo = Arc::new(PostgresRepository::new(pool));
        Self {
            catalog: repo.clone(),
            states: repo.clone(),
            sessions: repo.clone(),
            maxes: repo.clone(),
            progressions: repo,
        }
    }
}

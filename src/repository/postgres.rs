use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Cycle, DailyLookup, Day, Lift, LiftMax, LoadStrategy, LoggedSet, LookupEntry, MaxType,
    Prescription, Program, ProgramProgression, Progression, ProgressionLog, SetScheme,
    UserProgramState, Week, WeeklyLookup, WorkoutSession,
};

use super::{
    CatalogRepository, MaxRepository, ProgressionRepository, SessionRepository, StateRepository,
};
use crate::models::TriggerType;

/// Postgres-backed store. Compound methods run in one transaction with a
/// row lock on the state row, which serialises mutations per user.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock the state row and verify the optimistic timestamp.
    async fn lock_state(
        tx: &mut Transaction<'_, Postgres>,
        state_id: Uuid,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT updated_at FROM user_program_states WHERE id = $1 FOR UPDATE")
                .bind(state_id)
                .fetch_optional(&mut **tx)
                .await?;
        match row {
            None => Err(Error::not_found("user program state", state_id)),
            Some((updated_at,)) if updated_at != expected_updated_at => {
                Err(Error::Conflict("stale program state".to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    async fn write_state(
        tx: &mut Transaction<'_, Postgres>,
        state: &UserProgramState,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_program_states
            SET current_week = $2,
                current_day_index = $3,
                current_cycle_iteration = $4,
                enrollment_status = $5,
                cycle_status = $6,
                week_status = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(state.id)
        .bind(state.current_week)
        .bind(state.current_day_index)
        .bind(state.current_cycle_iteration)
        .bind(state.enrollment_status)
        .bind(state.cycle_status)
        .bind(state.week_status)
        .bind(state.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn write_session(
        tx: &mut Transaction<'_, Postgres>,
        session: &WorkoutSession,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workout_sessions (id, user_program_state_id, week_number, day_index, status, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET status = $5, finished_at = $7
            "#,
        )
        .bind(session.id)
        .bind(session.user_program_state_id)
        .bind(session.week_number)
        .bind(session.day_index)
        .bind(session.status)
        .bind(session.started_at)
        .bind(session.finished_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct PrescriptionRow {
    id: Uuid,
    lift_id: Uuid,
    load_strategy: Json<LoadStrategy>,
    set_scheme: Json<SetScheme>,
    position: i32,
    notes: Option<String>,
    rest_seconds: Option<i32>,
}

impl From<PrescriptionRow> for Prescription {
    fn from(row: PrescriptionRow) -> Self {
        Prescription {
            id: row.id,
            lift_id: row.lift_id,
            load_strategy: row.load_strategy.0,
            set_scheme: row.set_scheme.0,
            order: row.position,
            notes: row.notes,
            rest_seconds: row.rest_seconds,
        }
    }
}

#[derive(FromRow)]
struct DayRow {
    id: Uuid,
    name: String,
    slug: String,
    metadata: serde_json::Value,
    prescription_order: Vec<Uuid>,
}

impl From<DayRow> for Day {
    fn from(row: DayRow) -> Self {
        Day {
            id: row.id,
            name: row.name,
            slug: row.slug,
            metadata: row.metadata,
            prescription_order: row.prescription_order,
        }
    }
}

#[derive(FromRow)]
struct WeekRow {
    id: Uuid,
    cycle_id: Uuid,
    week_number: i32,
    day_order: Vec<Uuid>,
}

impl From<WeekRow> for Week {
    fn from(row: WeekRow) -> Self {
        Week {
            id: row.id,
            cycle_id: row.cycle_id,
            week_number: row.week_number,
            day_order: row.day_order,
        }
    }
}

#[derive(FromRow)]
struct LookupRow {
    id: Uuid,
    name: String,
    entries: Json<HashMap<String, LookupEntry>>,
}

#[async_trait]
impl CatalogRepository for PostgresRepository {
    async fn lift(&self, id: Uuid) -> Result<Option<Lift>> {
        let lift = sqlx::query_as::<_, Lift>(
            "SELECT id, name, slug, is_competition_lift, parent_lift_id, created_at FROM lifts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lift)
    }

    async fn lift_by_slug(&self, slug: &str) -> Result<Option<Lift>> {
        let lift = sqlx::query_as::<_, Lift>(
            "SELECT id, name, slug, is_competition_lift, parent_lift_id, created_at FROM lifts WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lift)
    }

    async fn program(&self, id: Uuid) -> Result<Option<Program>> {
        let program = sqlx::query_as::<_, Program>(
            r#"
            SELECT id, name, slug, cycle_id, weekly_lookup_id, daily_lookup_id,
                   default_rounding, schedule_type, meet_date
            FROM programs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(program)
    }

    async fn cycle(&self, id: Uuid) -> Result<Option<Cycle>> {
        let cycle = sqlx::query_as::<_, Cycle>(
            "SELECT id, name, length_weeks FROM cycles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cycle)
    }

    async fn week(&self, cycle_id: Uuid, week_number: i32) -> Result<Option<Week>> {
        let week = sqlx::query_as::<_, WeekRow>(
            "SELECT id, cycle_id, week_number, day_order FROM weeks WHERE cycle_id = $1 AND week_number = $2",
        )
        .bind(cycle_id)
        .bind(week_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(week.map(Week::from))
    }

    async fn day(&self, id: Uuid) -> Result<Option<Day>> {
        let day = sqlx::query_as::<_, DayRow>(
            "SELECT id, name, slug, metadata, prescription_order FROM days WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(day.map(Day::from))
    }

    async fn prescription(&self, id: Uuid) -> Result<Option<Prescription>> {
        let prescription = sqlx::query_as::<_, PrescriptionRow>(
            "SELECT id, lift_id, load_strategy, set_scheme, position, notes, rest_seconds FROM prescriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(prescription.map(Prescription::from))
    }

    async fn weekly_lookup(&self, id: Uuid) -> Result<Option<WeeklyLookup>> {
        let row = sqlx::query_as::<_, LookupRow>(
            "SELECT id, name, entries FROM weekly_lookups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| WeeklyLookup {
            id: r.id,
            name: r.name,
            entries: r.entries.0,
        }))
    }

    async fn daily_lookup(&self, id: Uuid) -> Result<Option<DailyLookup>> {
        let row = sqlx::query_as::<_, LookupRow>(
            "SELECT id, name, entries FROM daily_lookups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| DailyLookup {
            id: r.id,
            name: r.name,
            entries: r.entries.0,
        }))
    }

    async fn program_lifts(&self, program_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT p.lift_id
            FROM programs pr
            JOIN weeks w ON w.cycle_id = pr.cycle_id
            JOIN days d ON d.id = ANY(w.day_order)
            JOIN prescriptions p ON p.id = ANY(d.prescription_order)
            WHERE pr.id = $1
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl StateRepository for PostgresRepository {
    async fn state_for_user(&self, user_id: Uuid) -> Result<Option<UserProgramState>> {
        let state = sqlx::query_as::<_, UserProgramState>(
            r#"
            SELECT id, user_id, program_id, current_week, current_day_index,
                   current_cycle_iteration, enrollment_status, cycle_status, week_status,
                   enrolled_at, updated_at
            FROM user_program_states
            WHERE user_id = $1 AND enrollment_status <> 'quit'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    async fn state(&self, id: Uuid) -> Result<Option<UserProgramState>> {
        let state = sqlx::query_as::<_, UserProgramState>(
            r#"
            SELECT id, user_id, program_id, current_week, current_day_index,
                   current_cycle_iteration, enrollment_status, cycle_status, week_status,
                   enrolled_at, updated_at
            FROM user_program_states
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    async fn insert_state(&self, state: &UserProgramState) -> Result<()> {
        // The partial unique index turns a second enrollment into a
        // CONFLICT via the From<sqlx::Error> mapping.
        sqlx::query(
            r#"
            INSERT INTO user_program_states (
                id, user_id, program_id, current_week, current_day_index,
                current_cycle_iteration, enrollment_status, cycle_status, week_status,
                enrolled_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(state.id)
        .bind(state.user_id)
        .bind(state.program_id)
        .bind(state.current_week)
        .bind(state.current_day_index)
        .bind(state.current_cycle_iteration)
        .bind(state.enrollment_status)
        .bind(state.cycle_status)
        .bind(state.week_status)
        .bind(state.enrolled_at)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_state(
        &self,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_state(&mut tx, state.id, expected_updated_at).await?;
        Self::write_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn failure_count(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT consecutive_failures FROM lift_failure_counters WHERE user_id = $1 AND lift_id = $2",
        )
        .bind(user_id)
        .bind(lift_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(count,)| count).unwrap_or(0))
    }

    async fn increment_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<i32> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO lift_failure_counters (user_id, lift_id, consecutive_failures)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, lift_id)
            DO UPDATE SET consecutive_failures = lift_failure_counters.consecutive_failures + 1
            RETURNING consecutive_failures
            "#,
        )
        .bind(user_id)
        .bind(lift_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn reset_failures(&self, user_id: Uuid, lift_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM lift_failure_counters WHERE user_id = $1 AND lift_id = $2")
            .bind(user_id)
            .bind(lift_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PostgresRepository {
    async fn session(&self, id: Uuid) -> Result<Option<WorkoutSession>> {
        let session = sqlx::query_as::<_, WorkoutSession>(
            "SELECT id, user_program_state_id, week_number, day_index, status, started_at, finished_at FROM workout_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn in_progress_session(&self, state_id: Uuid) -> Result<Option<WorkoutSession>> {
        let session = sqlx::query_as::<_, WorkoutSession>(
            r#"
            SELECT id, user_program_state_id, week_number, day_index, status, started_at, finished_at
            FROM workout_sessions
            WHERE user_program_state_id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(state_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn create_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_state(&mut tx, state.id, expected_updated_at).await?;
        Self::write_session(&mut tx, session).await?;
        Self::write_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn complete_session(
        &self,
        session: &WorkoutSession,
        state: &UserProgramState,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_state(&mut tx, state.id, expected_updated_at).await?;
        Self::write_session(&mut tx, session).await?;
        Self::write_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_logged_set(&self, set: &LoggedSet) -> Result<LoggedSet> {
        let stored = sqlx::query_as::<_, LoggedSet>(
            r#"
            INSERT INTO logged_sets (
                id, session_id, prescription_id, lift_id, set_number, weight,
                target_reps, reps_performed, is_amrap, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (session_id, prescription_id, set_number)
            DO UPDATE SET weight = $6, target_reps = $7, reps_performed = $8, is_amrap = $9
            RETURNING id, session_id, prescription_id, lift_id, set_number, weight,
                      target_reps, reps_performed, is_amrap, created_at
            "#,
        )
        .bind(set.id)
        .bind(set.session_id)
        .bind(set.prescription_id)
        .bind(set.lift_id)
        .bind(set.set_number)
        .bind(set.weight)
        .bind(set.target_reps)
        .bind(set.reps_performed)
        .bind(set.is_amrap)
        .bind(set.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn logged_sets(&self, session_id: Uuid) -> Result<Vec<LoggedSet>> {
        let sets = sqlx::query_as::<_, LoggedSet>(
            r#"
            SELECT id, session_id, prescription_id, lift_id, set_number, weight,
                   target_reps, reps_performed, is_amrap, created_at
            FROM logged_sets
            WHERE session_id = $1
            ORDER BY created_at, set_number
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sets)
    }
}

#[async_trait]
impl MaxRepository for PostgresRepository {
    async fn current_max(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Option<LiftMax>> {
        let max = sqlx::query_as::<_, LiftMax>(
            r#"
            SELECT id, user_id, lift_id, max_type, value, effective_date, created_at
            FROM lift_maxes
            WHERE user_id = $1 AND lift_id = $2 AND max_type = $3
            ORDER BY effective_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(lift_id)
        .bind(max_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(max)
    }

    async fn insert_max(&self, max: &LiftMax) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lift_maxes (id, user_id, lift_id, max_type, value, effective_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(max.id)
        .bind(max.user_id)
        .bind(max.lift_id)
        .bind(max.max_type)
        .bind(max.value)
        .bind(max.effective_date)
        .bind(max.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn max_history(
        &self,
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    ) -> Result<Vec<LiftMax>> {
        let history = sqlx::query_as::<_, LiftMax>(
            r#"
            SELECT id, user_id, lift_id, max_type, value, effective_date, created_at
            FROM lift_maxes
            WHERE user_id = $1 AND lift_id = $2 AND max_type = $3
            ORDER BY effective_date, created_at
            "#,
        )
        .bind(user_id)
        .bind(lift_id)
        .bind(max_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}

#[async_trait]
impl ProgressionRepository for PostgresRepository {
    async fn progression(&self, id: Uuid) -> Result<Option<Progression>> {
        let progression = sqlx::query_as::<_, Progression>(
            "SELECT id, name, progression_type, parameters, trigger, max_type, created_at FROM progressions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(progression)
    }

    async fn program_progressions(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<(ProgramProgression, Progression)>> {
        #[derive(FromRow)]
        struct JoinedRow {
            id: Uuid,
            program_id: Uuid,
            progression_id: Uuid,
            lift_id: Option<Uuid>,
            priority: i32,
            enabled: bool,
            override_increment: Option<f64>,
            created_at: DateTime<Utc>,
            p_name: String,
            p_type: crate::models::ProgressionType,
            p_parameters: serde_json::Value,
            p_trigger: TriggerType,
            p_max_type: MaxType,
            p_created_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, JoinedRow>(
            r#"
            SELECT pp.id, pp.program_id, pp.progression_id, pp.lift_id, pp.priority,
                   pp.enabled, pp.override_increment, pp.created_at,
                   p.name AS p_name, p.progression_type AS p_type, p.parameters AS p_parameters,
                   p.trigger AS p_trigger, p.max_type AS p_max_type, p.created_at AS p_created_at
            FROM program_progressions pp
            JOIN progressions p ON p.id = pp.progression_id
            WHERE pp.program_id = $1 AND pp.enabled
            ORDER BY pp.priority, pp.created_at
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    ProgramProgression {
                        id: row.id,
                        program_id: row.program_id,
                        progression_id: row.progression_id,
                        lift_id: row.lift_id,
                        priority: row.priority,
                        enabled: row.enabled,
                        override_increment: row.override_increment,
                        created_at: row.created_at,
                    },
                    Progression {
                        id: row.progression_id,
                        name: row.p_name,
                        progression_type: row.p_type,
                        parameters: row.p_parameters,
                        trigger: row.p_trigger,
                        max_type: row.p_max_type,
                        created_at: row.p_created_at,
                    },
                )
            })
            .collect())
    }

    async fn log_exists(
        &self,
        user_id: Uuid,
        progression_id: Uuid,
        lift_id: Uuid,
        trigger_type: TriggerType,
        trigger_instance_key: &str,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1::BIGINT FROM progression_logs
            WHERE user_id = $1 AND progression_id = $2 AND lift_id = $3
              AND trigger_type = $4 AND trigger_instance_key = $5
            "#,
        )
        .bind(user_id)
        .bind(progression_id)
        .bind(lift_id)
        .bind(trigger_type)
        .bind(trigger_instance_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn apply(&self, log: &ProgressionLog, new_max: Option<&LiftMax>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO progression_logs (
                id, user_id, progression_id, lift_id, previous_value, new_value, delta,
                trigger_type, trigger_instance_key, trigger_context, error, applied_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id, progression_id, lift_id, trigger_type, trigger_instance_key)
            DO NOTHING
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.progression_id)
        .bind(log.lift_id)
        .bind(log.previous_value)
        .bind(log.new_value)
        .bind(log.delta)
        .bind(log.trigger_type)
        .bind(&log.trigger_instance_key)
        .bind(&log.trigger_context)
        .bind(&log.error)
        .bind(log.applied_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(max) = new_max {
            sqlx::query(
                r#"
                INSERT INTO lift_maxes (id, user_id, lift_id, max_type, value, effective_date, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(max.id)
            .bind(max.user_id)
            .bind(max.lift_id)
            .bind(max.max_type)
            .bind(max.value)
            .bind(max.effective_date)
            .bind(max.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProgressionLog>, i64)> {
        let logs = sqlx::query_as::<_, ProgressionLog>(
            r#"
            SELECT id, user_id, progression_id, lift_id, previous_value, new_value, delta,
                   trigger_type, trigger_instance_key, trigger_context, error, applied_at
            FROM progression_logs
            WHERE user_id = $1
            ORDER BY applied_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM progression_logs WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((logs, total))
    }
}

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{EffectiveSchedule, Workout};
use crate::repository::Store;

use super::resolver::PrescriptionResolver;
use super::schedule::Scheduler;

/// Produces the one correct workout for a user's position: the day's
/// prescriptions resolved in order against current maxes. Pure with respect
/// to (state row, maxes, catalog); identical inputs give identical output.
#[derive(Clone)]
pub struct WorkoutBuilder {
    store: Store,
    scheduler: Scheduler,
    resolver: PrescriptionResolver,
}

impl WorkoutBuilder {
    pub fn new(store: Store) -> Self {
        let scheduler = Scheduler::new(store.catalog.clone());
        let resolver = PrescriptionResolver::new(store.catalog.clone(), store.maxes.clone());
        Self {
            store,
            scheduler,
            resolver,
        }
    }

    /// The workout at the user's current position.
    pub async fn current_workout(&self, user_id: Uuid) -> Result<Workout> {
        let state = self
            .store
            .states
            .state_for_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("enrollment", user_id))?;
        let program = self
            .store
            .catalog
            .program(state.program_id)
            .await?
            .ok_or_else(|| Error::not_found("program", state.program_id))?;
        let schedule = self
            .scheduler
            .effective_schedule(&program, &state, Utc::now().date_naive())
            .await?;
        self.build(
            user_id,
            &program,
            state.current_cycle_iteration,
            &schedule,
            state.current_day_index,
        )
        .await
    }

    /// The workout at explicit (cycle-relative week, day index) coordinates,
    /// bypassing the user's stored position.
    pub async fn workout_for_day(
        &self,
        user_id: Uuid,
        week_number: i32,
        day_index: i32,
    ) -> Result<Workout> {
        let state = self
            .store
            .states
            .state_for_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("enrollment", user_id))?;
        let program = self
            .store
            .catalog
            .program(state.program_id)
            .await?
            .ok_or_else(|| Error::not_found("program", state.program_id))?;
        let schedule = EffectiveSchedule::rotation(week_number);
        self.build(
            user_id,
            &program,
            state.current_cycle_iteration,
            &schedule,
            day_index,
        )
        .await
    }

    async fn build(
        &self,
        user_id: Uuid,
        program: &crate::models::Program,
        cycle_iteration: i32,
        schedule: &EffectiveSchedule,
        day_index: i32,
    ) -> Result<Workout> {
        let (_, day) = self
            .scheduler
            .day_for(program, schedule.week_number, day_index)
            .await?;
        let context = self
            .scheduler
            .lookup_context(program, schedule, day_index, Some(&day.slug))
            .await?;

        // The builder is strict: a day that cannot fully resolve is an
        // error, unlike the batch resolver's partial contract. Batch order
        // is the day's prescription order.
        let outcome = self
            .resolver
            .resolve_batch(user_id, &day.prescription_order, &context)
            .await?;
        if let Some(failure) = outcome.failures.into_iter().next() {
            return Err(failure.error);
        }

        Ok(Workout {
            user_id,
            program_id: program.id,
            cycle_iteration,
            week_number: schedule.week_number,
            day_slug: day.slug,
            date: Utc::now(),
            exercises: outcome.resolved,
        })
    }
}

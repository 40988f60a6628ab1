use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    days_between, days_out_schedule, rotation_week, EffectiveSchedule, LookupEntry, LookupValue,
    PhaseDurations, Program, ScheduleType, UserProgramState,
};
use crate::repository::CatalogRepository;

/// Lookup keys a load strategy can name.
pub const WEEKLY_LOOKUP_KEY: &str = "weekly";
pub const DAILY_LOOKUP_KEY: &str = "daily";

/// Resolved lookup values for one (effective week, day) coordinate, keyed
/// by the name a strategy's `lookup_key` uses.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    values: HashMap<String, LookupValue>,
}

impl LookupContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: LookupValue) {
        self.values.insert(key.into(), value);
    }

    /// Missing keys resolve to the neutral value, leaving the strategy's
    /// base percentage in effect.
    pub fn value_for(&self, key: &str) -> LookupValue {
        self.values.get(key).copied().unwrap_or_default()
    }
}

/// Maps a user's position to the effective week and resolves the program's
/// lookup tables for that coordinate.
#[derive(Clone)]
pub struct Scheduler {
    catalog: Arc<dyn CatalogRepository>,
}

impl Scheduler {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// The effective week for workout generation. ROTATION wraps the user's
    /// absolute week into the cycle; DAYS_OUT derives it from the peaking
    /// calendar.
    pub async fn effective_schedule(
        &self,
        program: &Program,
        state: &UserProgramState,
        today: NaiveDate,
    ) -> Result<EffectiveSchedule> {
        match program.schedule_type {
            ScheduleType::Rotation => {
                let cycle = self
                    .catalog
                    .cycle(program.cycle_id)
                    .await?
                    .ok_or_else(|| Error::not_found("cycle", program.cycle_id))?;
                Ok(EffectiveSchedule::rotation(rotation_week(
                    state.current_week,
                    cycle.length_weeks,
                )))
            }
            ScheduleType::DaysOut => {
                let meet_date = program.meet_date.ok_or_else(|| {
                    Error::Internal(anyhow::anyhow!(
                        "DAYS_OUT program {} has no meet date",
                        program.id
                    ))
                })?;
                let days_out = days_between(today, meet_date);
                Ok(days_out_schedule(days_out, PhaseDurations::default()))
            }
        }
    }

    /// Resolve the program's lookups for one (effective week, day)
    /// coordinate. The weekly lookup is keyed by effective week; the daily
    /// lookup by `week:dayIndex` with the day slug as fallback.
    pub async fn lookup_context(
        &self,
        program: &Program,
        schedule: &EffectiveSchedule,
        day_index: i32,
        day_slug: Option<&str>,
    ) -> Result<LookupContext> {
        let mut context = LookupContext::empty();

        if let Some(lookup_id) = program.weekly_lookup_id {
            if let Some(lookup) = self.catalog.weekly_lookup(lookup_id).await? {
                if let Some(entry) = lookup.entries.get(&schedule.week_number.to_string()) {
                    context.insert(WEEKLY_LOOKUP_KEY, lookup_value(entry));
                }
            }
        }

        if let Some(lookup_id) = program.daily_lookup_id {
            if let Some(lookup) = self.catalog.daily_lookup(lookup_id).await? {
                let coordinate_key = format!("{}:{day_index}", schedule.week_number);
                let entry = lookup
                    .entries
                    .get(&coordinate_key)
                    .or_else(|| day_slug.and_then(|slug| lookup.entries.get(slug)));
                if let Some(entry) = entry {
                    context.insert(DAILY_LOOKUP_KEY, lookup_value(entry));
                }
            }
        }

        Ok(context)
    }

    pub async fn day_for(&self, program: &Program, week_number: i32, day_index: i32) -> Result<(crate::models::Week, crate::models::Day)> {
        let week = self
            .catalog
            .week(program.cycle_id, week_number)
            .await?
            .ok_or_else(|| Error::not_found("week", format!("{}:{week_number}", program.cycle_id)))?;
        let day_id = week
            .day_order
            .get(day_index as usize)
            .copied()
            .ok_or_else(|| Error::not_found("day", format!("index {day_index}")))?;
        let day = self
            .catalog
            .day(day_id)
            .await?
            .ok_or_else(|| Error::not_found("day", day_id))?;
        Ok((week, day))
    }
}

fn lookup_value(entry: &LookupEntry) -> LookupValue {
    LookupValue {
        percentage: entry.top_percentage(),
        modifier: entry.modifier,
    }
}

/// Days in the effective week of the program's cycle; advancement needs it
/// to detect week boundaries.
pub async fn days_in_week(
    catalog: &Arc<dyn CatalogRepository>,
    cycle_id: Uuid,
    week_number: i32,
) -> Result<i32> {
    let week = catalog
        .week(cycle_id, week_number)
        .await?
        .ok_or_else(|| Error::not_found("week", format!("{cycle_id}:{week_number}")))?;
    Ok(week.day_order.len() as i32)
}

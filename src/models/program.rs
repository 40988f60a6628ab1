use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::validation::{validate_non_empty, validate_positive, validate_slug, ValidationErrors};

/// How a program maps a user's position to an effective week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "schedule_type", rename_all = "snake_case")]
pub enum ScheduleType {
    /// Weeks rotate through the cycle; week N+1 follows week N.
    Rotation,
    /// Weeks count down to a meet date through peaking phases.
    DaysOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub cycle_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_lookup_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_lookup_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rounding: Option<f64>,
    pub schedule_type: ScheduleType,
    /// Required iff `schedule_type` is DAYS_OUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meet_date: Option<NaiveDate>,
}

impl Program {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_non_empty(&mut errors, "name", &self.name);
        validate_slug(&mut errors, "slug", &self.slug);
        if let Some(rounding) = self.default_rounding {
            validate_positive(&mut errors, "default_rounding", rounding);
        }
        match (self.schedule_type, self.meet_date) {
            (ScheduleType::DaysOut, None) => {
                errors.add("meet_date", "required for DAYS_OUT scheduling")
            }
            (ScheduleType::Rotation, Some(_)) => {
                errors.add("meet_date", "only valid for DAYS_OUT scheduling")
            }
            _ => {}
        }
        errors.into_result()
    }
}

/// Peaking phases of a days-out program, furthest from the meet first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Prep1,
    Prep2,
    Competition,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prep1 => write!(f, "PREP1"),
            Phase::Prep2 => write!(f, "PREP2"),
            Phase::Competition => write!(f, "COMPETITION"),
        }
    }
}

/// Phase lengths in weeks. The defaults give a 13-week peaking calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
    pub prep1: i32,
    pub prep2: i32,
    pub competition: i32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            prep1: 4,
            prep2: 4,
            competition: 5,
        }
    }
}

impl PhaseDurations {
    pub fn total_weeks(&self) -> i32 {
        self.prep1 + self.prep2 + self.competition
    }

    fn start_week(&self, phase: Phase) -> i32 {
        match phase {
            Phase::Prep1 => 1,
            Phase::Prep2 => self.prep1 + 1,
            Phase::Competition => self.prep1 + self.prep2 + 1,
        }
    }
}

/// The cycle-relative position used to select days and resolve lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectiveSchedule {
    pub week_number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_within_phase: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_out: Option<i64>,
    pub is_peaking: bool,
}

impl EffectiveSchedule {
    pub fn rotation(week_number: i32) -> Self {
        Self {
            week_number,
            phase: None,
            week_within_phase: None,
            days_out: None,
            is_peaking: false,
        }
    }
}

/// ROTATION mapping: the user's absolute week wrapped into the cycle,
/// 1-based.
pub fn rotation_week(current_week: i32, cycle_length_weeks: i32) -> i32 {
    ((current_week - 1).rem_euclid(cycle_length_weeks.max(1))) + 1
}

/// DAYS_OUT mapping. Week 1 is the start of the program (furthest from the
/// meet); the meet date itself falls in the final week. Days before the
/// program starts clamp to week 1 and days after the meet clamp to the last
/// week.
pub fn days_out_schedule(days_out: i64, durations: PhaseDurations) -> EffectiveSchedule {
    let total_days = i64::from(durations.total_weeks()) * 7;
    let clamped = days_out.clamp(0, total_days - 1);
    let day_into_program = total_days - 1 - clamped;
    let week_number = (day_into_program / 7) as i32 + 1;

    let prep2_boundary = i64::from(durations.competition) * 7;
    let prep1_boundary = i64::from(durations.competition + durations.prep2) * 7;
    let phase = if clamped >= prep1_boundary {
        Phase::Prep1
    } else if clamped >= prep2_boundary {
        Phase::Prep2
    } else {
        Phase::Competition
    };

    EffectiveSchedule {
        week_number,
        phase: Some(phase),
        week_within_phase: Some(week_number - durations.start_week(phase) + 1),
        days_out: Some(days_out),
        is_peaking: phase == Phase::Competition,
    }
}

/// Calendar days from `today` to the meet, truncated to day boundaries.
/// Zero on the meet day, one the day before, negative afterwards.
pub fn days_between(today: NaiveDate, meet_date: NaiveDate) -> i64 {
    (meet_date - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rotation_wraps_one_based() {
        assert_eq!(rotation_week(1, 4), 1);
        assert_eq!(rotation_week(4, 4), 4);
        assert_eq!(rotation_week(5, 4), 1);
        assert_eq!(rotation_week(9, 4), 1);
    }

    #[test]
    fn ninety_days_out_is_prep1_week_one() {
        let schedule = days_out_schedule(90, PhaseDurations::default());
        assert_eq!(schedule.week_number, 1);
        assert_eq!(schedule.phase, Some(Phase::Prep1));
        assert_eq!(schedule.week_within_phase, Some(1));
        assert!(!schedule.is_peaking);
    }

    #[test]
    fn meet_day_is_final_competition_week() {
        let schedule = days_out_schedule(0, PhaseDurations::default());
        assert_eq!(schedule.week_number, 13);
        assert_eq!(schedule.phase, Some(Phase::Competition));
        assert_eq!(schedule.week_within_phase, Some(5));
        assert!(schedule.is_peaking);
    }

    #[test]
    fn phase_boundaries_fall_at_0_35_63() {
        let durations = PhaseDurations::default();
        assert_eq!(days_out_schedule(0, durations).phase, Some(Phase::Competition));
        assert_eq!(days_out_schedule(34, durations).phase, Some(Phase::Competition));
        assert_eq!(days_out_schedule(35, durations).phase, Some(Phase::Prep2));
        assert_eq!(days_out_schedule(62, durations).phase, Some(Phase::Prep2));
        assert_eq!(days_out_schedule(63, durations).phase, Some(Phase::Prep1));
    }

    #[test]
    fn far_out_clamps_to_week_one() {
        let schedule = days_out_schedule(91, PhaseDurations::default());
        assert_eq!(schedule.week_number, 1);
        assert_eq!(schedule.phase, Some(Phase::Prep1));
        assert_eq!(schedule.week_within_phase, Some(1));
        let schedule = days_out_schedule(400, PhaseDurations::default());
        assert_eq!(schedule.week_number, 1);
    }

    #[test]
    fn after_meet_clamps_to_last_week() {
        let schedule = days_out_schedule(-3, PhaseDurations::default());
        assert_eq!(schedule.week_number, 13);
        assert_eq!(schedule.days_out, Some(-3));
    }

    #[test]
    fn days_between_counts_clock_days() {
        let meet = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(days_between(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), meet), 0);
        assert_eq!(days_between(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(), meet), 1);
        assert_eq!(days_between(NaiveDate::from_ymd_opt(2024, 6, 16).unwrap(), meet), -1);
        assert_eq!(days_between(NaiveDate::from_ymd_opt(2024, 3, 17).unwrap(), meet), 90);
    }

    #[test]
    fn days_out_program_requires_meet_date() {
        let program = Program {
            id: Uuid::new_v4(),
            name: "Peaking".to_string(),
            slug: "peaking".to_string(),
            cycle_id: Uuid::new_v4(),
            weekly_lookup_id: None,
            daily_lookup_id: None,
            default_rounding: None,
            schedule_type: ScheduleType::DaysOut,
            meet_date: None,
        };
        assert!(program.validate().is_err());
    }
}

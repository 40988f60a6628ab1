// Shared fixtures: an in-memory store seeded with a small catalog and the
// engine wired the way production wires it. Not every binary uses every
// helper.
#![allow(dead_code)]

use std::sync::Arc;

use powerpro::engine::{
    EnrollmentService, ProgressionEngine, SessionService, WorkoutBuilder,
};
use powerpro::events::EventBus;
use powerpro::models::{
    Cycle, Day, Lift, LoadStrategy, MaxType, Prescription, Program, Progression,
    ProgramProgression, ProgressionType, ScheduleType, SetScheme, TriggerType, Week,
};
use powerpro::repository::{MemoryRepository, Store};
use chrono::Utc;
use uuid::Uuid;

pub struct TestEngine {
    pub repo: Arc<MemoryRepository>,
    pub store: Store,
    pub bus: EventBus,
    pub enrollment: EnrollmentService,
    pub sessions: SessionService,
    pub workouts: WorkoutBuilder,
    pub progressions: ProgressionEngine,
}

/// Engine wired like production: the progression engine subscribes to the
/// bus every other component publishes into.
pub fn engine() -> TestEngine {
    let (store, repo) = Store::in_memory();
    let bus = EventBus::new();
    let progressions = ProgressionEngine::new(store.clone());
    bus.subscribe(Arc::new(progressions.clone()));

    TestEngine {
        repo,
        store: store.clone(),
        bus: bus.clone(),
        enrollment: EnrollmentService::new(store.clone(), bus.clone()),
        sessions: SessionService::new(store.clone(), bus),
        workouts: WorkoutBuilder::new(store),
        progressions,
    }
}

pub fn lift(repo: &MemoryRepository, name: &str, slug: &str) -> Lift {
    let lift = Lift::new(name, slug);
    repo.insert_lift(lift.clone());
    lift
}

pub fn percent_rx(
    repo: &MemoryRepository,
    lift: &Lift,
    max_type: MaxType,
    percentage: f64,
    set_scheme: SetScheme,
) -> Prescription {
    let prescription = Prescription {
        id: Uuid::new_v4(),
        lift_id: lift.id,
        load_strategy: LoadStrategy::PercentOf {
            max_type,
            percentage,
            lookup_key: None,
            round_to: Some(5.0),
        },
        set_scheme,
        order: 0,
        notes: None,
        rest_seconds: Some(180),
    };
    repo.insert_prescription(prescription.clone());
    prescription
}

/// Seed a program whose cycle repeats the same day layout every week. Each
/// inner vec is one day's prescriptions, in order.
pub fn seed_program(
    repo: &MemoryRepository,
    slug: &str,
    cycle_weeks: i32,
    day_prescriptions: &[Vec<Prescription>],
) -> Program {
    let cycle = Cycle {
        id: Uuid::new_v4(),
        name: format!("{slug} cycle"),
        length_weeks: cycle_weeks,
    };
    repo.insert_cycle(cycle.clone());

    let mut day_ids = Vec::new();
    for (i, prescriptions) in day_prescriptions.iter().enumerate() {
        let day = Day {
            id: Uuid::new_v4(),
            name: format!("Day {}", i + 1),
            slug: format!("day-{}", i + 1),
            metadata: serde_json::json!({}),
            prescription_order: prescriptions.iter().map(|p| p.id).collect(),
        };
        repo.insert_day(day.clone());
        day_ids.push(day.id);
    }

    for week_number in 1..=cycle_weeks {
        repo.insert_week(Week {
            id: Uuid::new_v4(),
            cycle_id: cycle.id,
            week_number,
            day_order: day_ids.clone(),
        });
    }

    let program = Program {
        id: Uuid::new_v4(),
        name: slug.to_string(),
        slug: slug.to_string(),
        cycle_id: cycle.id,
        weekly_lookup_id: None,
        daily_lookup_id: None,
        default_rounding: Some(5.0),
        schedule_type: ScheduleType::Rotation,
        meet_date: None,
    };
    repo.insert_program(program.clone());
    program
}

pub fn progression(
    repo: &MemoryRepository,
    name: &str,
    progression_type: ProgressionType,
    trigger: TriggerType,
    max_type: MaxType,
    parameters: serde_json::Value,
) -> Progression {
    let progression = Progression {
        id: Uuid::new_v4(),
        name: name.to_string(),
        progression_type,
        parameters,
        trigger,
        max_type,
        created_at: Utc::now(),
    };
    repo.insert_progression(progression.clone());
    progression
}

pub fn attach_progression(
    repo: &MemoryRepository,
    program: &Program,
    progression: &Progression,
    lift_id: Option<Uuid>,
    override_increment: Option<f64>,
) -> ProgramProgression {
    let attachment = ProgramProgression {
        id: Uuid::new_v4(),
        program_id: program.id,
        progression_id: progression.id,
        lift_id,
        priority: 0,
        enabled: true,
        override_increment,
        created_at: Utc::now(),
    };
    repo.insert_program_progression(attachment.clone());
    attachment
}

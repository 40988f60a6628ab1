// End-to-end engine scenarios driven through the public services against
// the in-memory store.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use powerpro::engine::{LogSetInput, Scheduler};
use powerpro::error::Error;
use powerpro::models::{
    EnrollmentStatus, CycleStatus, EventType, LiftMax, MaxType, Phase, ProgressionType,
    ScheduleType, SetScheme, StateEvent, TriggerType, UserProgramState, WeekStatus,
    WorkoutPayload, Program,
};
use powerpro::repository::{MaxRepository, ProgressionRepository};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use common::*;

/// Starting Strength LP, week 1 day 1: 3x5 at 85% of a 200 one-rep max.
#[tokio::test]
async fn linear_program_week_one_day_one() {
    let t = engine();
    let user_id = Uuid::new_v4();
    let squat = lift(&t.repo, "Squat", "squat");
    let rx = percent_rx(
        &t.repo,
        &squat,
        MaxType::OneRm,
        85.0,
        SetScheme::Fixed { sets: 3, reps: 5, is_amrap: false },
    );
    let program = seed_program(&t.repo, "starting-strength", 1, &[vec![rx]]);
    t.store
        .maxes
        .insert_max(&LiftMax::new(user_id, squat.id, MaxType::OneRm, 200.0))
        .await
        .unwrap();

    t.enrollment.enroll(user_id, program.id).await.unwrap();
    let workout = t.workouts.current_workout(user_id).await.unwrap();

    assert_eq!(workout.week_number, 1);
    assert_eq!(workout.day_slug, "day-1");
    assert_eq!(workout.exercises.len(), 1);
    let sets = &workout.exercises[0].sets;
    assert_eq!(sets.len(), 3);
    for set in sets {
        assert_eq!(set.weight, 170.0);
        assert_eq!(set.target_reps, 5);
        assert!(set.is_work_set);
    }
}

/// LINEAR AFTER_SESSION: finishing the session adds 5 to the squat max,
/// exactly once, keyed by the session id.
#[tokio::test]
async fn linear_progression_after_session_is_idempotent() {
    let t = engine();
    let user_id = Uuid::new_v4();
    let squat = lift(&t.repo, "Squat", "squat");
    let rx = percent_rx(
        &t.repo,
        &squat,
        MaxType::OneRm,
        85.0,
        SetScheme::Fixed { sets: 3, reps: 5, is_amrap: false },
    );
    let program = seed_program(&t.repo, "starting-strength", 1, &[vec![rx.clone()]]);
    let linear = progression(
        &t.repo,
        "lp",
        ProgressionType::Linear,
        TriggerType::AfterSession,
        MaxType::OneRm,
        json!({"increment": 5.0}),
    );
    attach_progression(&t.repo, &program, &linear, Some(squat.id), None);
    t.store
        .maxes
        .insert_max(&LiftMax::new(user_id, squat.id, MaxType::OneRm, 200.0))
        .await
        .unwrap();

    t.enrollment.enroll(user_id, program.id).await.unwrap();
    let session = t.sessions.start_session(user_id).await.unwrap();
    for set_number in 1..=3 {
        t.sessions
            .log_set(
                user_id,
                session.id,
                LogSetInput {
                    prescription_id: rx.id,
                    set_number,
                    weight: 170.0,
                    target_reps: 5,
                    reps_performed: 5,
                    is_amrap: false,
                },
            )
            .await
            .unwrap();
    }
    t.sessions.finish_current(user_id).await.unwrap();

    let max = t
        .store
        .maxes
        .current_max(user_id, squat.id, MaxType::OneRm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(max.value, 205.0);

    let (logs, total) = t
        .store
        .progressions
        .logs_for_user(user_id, 50, 0)
        .await
        .unwrap();
    let session_rows: Vec<_> = logs
        .iter()
        .filter(|log| log.trigger_type == TriggerType::AfterSession)
        .collect();
    assert_eq!(session_rows.len(), 1);
    assert_eq!(session_rows[0].delta, 5.0);
    assert_eq!(session_rows[0].trigger_instance_key, session.id.to_string());
    let total_before = total;

    // Duplicate delivery of the same event: same state, no new rows.
    let replay = StateEvent::new(
        EventType::WorkoutCompleted,
        user_id,
        program.id,
        &WorkoutPayload {
            session_id: session.id,
            week_number: 1,
            day_index: 0,
            cycle_iteration: 1,
            lift_ids: vec![squat.id],
        },
    );
    let applied = t.progressions.handle_event(&replay).await.unwrap();
    assert!(applied.is_empty());

    let max = t
        .store
        .maxes
        .current_max(user_id, squat.id, MaxType::OneRm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(max.value, 205.0);
    let (_, total_after) = t
        .store
        .progressions
        .logs_for_user(user_id, 50, 0)
        .await
        .unwrap();
    assert_eq!(total_after, total_before);
}

/// 5/3/1-style cycle completion: finishing week 4 parks the enrollment
/// between cycles, the CYCLE rule fires once per lift with per-lift
/// increments, and next-cycle resets the position.
#[tokio::test]
async fn cycle_completion_and_next_cycle() {
    let t = engine();
    let user_id = Uuid::new_v4();
    let bench = lift(&t.repo, "Bench Press", "bench-press");
    let squat = lift(&t.repo, "Squat", "squat");
    let bench_rx = percent_rx(
        &t.repo,
        &bench,
        MaxType::TrainingMax,
        65.0,
        SetScheme::Fixed { sets: 5, reps: 5, is_amrap: false },
    );
    let squat_rx = percent_rx(
        &t.repo,
        &squat,
        MaxType::TrainingMax,
        65.0,
        SetScheme::Fixed { sets: 5, reps: 5, is_amrap: false },
    );
    let program = seed_program(&t.repo, "five-three-one-bbb", 4, &[vec![bench_rx, squat_rx]]);
    let cycle_rule = progression(
        &t.repo,
        "tm bump",
        ProgressionType::Cycle,
        TriggerType::AfterCycle,
        MaxType::TrainingMax,
        json!({"increment": 5.0}),
    );
    // Upper-body lifts get 5, lower-body 10, via per-lift overrides.
    attach_progression(&t.repo, &program, &cycle_rule, Some(bench.id), Some(5.0));
    attach_progression(&t.repo, &program, &cycle_rule, Some(squat.id), Some(10.0));
    t.store
        .maxes
        .insert_max(&LiftMax::new(user_id, bench.id, MaxType::TrainingMax, 150.0))
        .await
        .unwrap();
    t.store
        .maxes
        .insert_max(&LiftMax::new(user_id, squat.id, MaxType::TrainingMax, 300.0))
        .await
        .unwrap();

    t.enrollment.enroll(user_id, program.id).await.unwrap();
    for _ in 0..4 {
        t.sessions.start_session(user_id).await.unwrap();
        t.sessions.finish_current(user_id).await.unwrap();
    }

    let (state, _) = t.enrollment.enrollment_info(user_id).await.unwrap();
    assert_eq!(state.enrollment_status, EnrollmentStatus::BetweenCycles);
    assert_eq!(state.cycle_status, CycleStatus::Completed);
    assert_eq!(state.week_status, WeekStatus::Completed);

    let bench_max = t
        .store
        .maxes
        .current_max(user_id, bench.id, MaxType::TrainingMax)
        .await
        .unwrap()
        .unwrap();
    let squat_max = t
        .store
        .maxes
        .current_max(user_id, squat.id, MaxType::TrainingMax)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bench_max.value, 155.0);
    assert_eq!(squat_max.value, 310.0);

    let next = t.enrollment.start_next_cycle(user_id).await.unwrap();
    assert_eq!(next.enrollment_status, EnrollmentStatus::Active);
    assert_eq!(next.cycle_status, CycleStatus::Pending);
    assert_eq!(next.week_status, WeekStatus::Pending);
    assert_eq!(next.current_week, 1);
    assert_eq!(next.current_day_index, 0);
    assert_eq!(next.current_cycle_iteration, 2);
}

/// AMRAP progression thresholds: 12 reps -> +5, 7 reps -> +2.5, 3 reps ->
/// unchanged.
#[tokio::test]
async fn amrap_progression_thresholds() {
    for (reps, expected) in [(12, 205.0), (7, 202.5), (3, 200.0)] {
        let t = engine();
        let user_id = Uuid::new_v4();
        let squat = lift(&t.repo, "Squat", "squat");
        let rx = percent_rx(
            &t.repo,
            &squat,
            MaxType::OneRm,
            85.0,
            SetScheme::Fixed { sets: 1, reps: 5, is_amrap: true },
        );
        let program = seed_program(&t.repo, "amrap-lp", 1, &[vec![rx.clone()]]);
        let amrap = progression(
            &t.repo,
            "amrap bump",
            ProgressionType::Amrap,
            TriggerType::AfterSet,
            MaxType::OneRm,
            json!({"threshold1": 5, "small_increment": 2.5, "threshold2": 10, "large_increment": 5.0}),
        );
        attach_progression(&t.repo, &program, &amrap, Some(squat.id), None);
        t.store
            .maxes
            .insert_max(&LiftMax::new(user_id, squat.id, MaxType::OneRm, 200.0))
            .await
            .unwrap();

        t.enrollment.enroll(user_id, program.id).await.unwrap();
        let session = t.sessions.start_session(user_id).await.unwrap();
        t.sessions
            .log_set(
                user_id,
                session.id,
                LogSetInput {
                    prescription_id: rx.id,
                    set_number: 1,
                    weight: 170.0,
                    target_reps: 5,
                    reps_performed: reps,
                    is_amrap: true,
                },
            )
            .await
            .unwrap();

        let max = t
            .store
            .maxes
            .current_max(user_id, squat.id, MaxType::OneRm)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(max.value, expected, "reps={reps}");
    }
}

/// Days-out scheduling maps calendar distance to phase and week.
#[tokio::test]
async fn days_out_scheduling() {
    let t = engine();
    let program = Program {
        id: Uuid::new_v4(),
        name: "Meet Prep".to_string(),
        slug: "meet-prep".to_string(),
        cycle_id: Uuid::new_v4(),
        weekly_lookup_id: None,
        daily_lookup_id: None,
        default_rounding: None,
        schedule_type: ScheduleType::DaysOut,
        meet_date: Some(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()),
    };
    let state = UserProgramState::enroll(Uuid::new_v4(), program.id);
    let scheduler = Scheduler::new(t.store.catalog.clone());

    let ninety_out = scheduler
        .effective_schedule(&program, &state, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap())
        .await
        .unwrap();
    assert_eq!(ninety_out.week_number, 1);
    assert_eq!(ninety_out.phase, Some(Phase::Prep1));
    assert_eq!(ninety_out.week_within_phase, Some(1));
    assert_eq!(ninety_out.days_out, Some(90));
    assert!(!ninety_out.is_peaking);

    let meet_day = scheduler
        .effective_schedule(&program, &state, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
        .await
        .unwrap();
    assert_eq!(meet_day.week_number, 13);
    assert_eq!(meet_day.phase, Some(Phase::Competition));
    assert_eq!(meet_day.week_within_phase, Some(5));
    assert_eq!(meet_day.days_out, Some(0));
    assert!(meet_day.is_peaking);
}

/// Starting a second session conflicts and names the open session; after
/// finishing, a new start succeeds with a fresh id.
#[tokio::test]
async fn workout_conflict_surfaces_open_session() {
    let t = engine();
    let user_id = Uuid::new_v4();
    let squat = lift(&t.repo, "Squat", "squat");
    let rx = percent_rx(
        &t.repo,
        &squat,
        MaxType::OneRm,
        85.0,
        SetScheme::Fixed { sets: 3, reps: 5, is_amrap: false },
    );
    let program = seed_program(&t.repo, "lp", 2, &[vec![rx]]);
    t.store
        .maxes
        .insert_max(&LiftMax::new(user_id, squat.id, MaxType::OneRm, 200.0))
        .await
        .unwrap();

    t.enrollment.enroll(user_id, program.id).await.unwrap();
    let first = t.sessions.start_session(user_id).await.unwrap();

    let err = t.sessions.start_session(user_id).await.unwrap_err();
    assert_matches!(err, Error::WorkoutAlreadyInProgress { session_id } if session_id == first.id);

    t.sessions.finish_current(user_id).await.unwrap();
    let second = t.sessions.start_session(user_id).await.unwrap();
    assert_ne!(second.id, first.id);
}

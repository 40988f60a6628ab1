use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_session, JwtService};
use crate::engine::{EnrollmentService, ProgressionEngine, SessionService, WorkoutBuilder};
use crate::events::EventBus;
use crate::repository::Store;

use super::enrollment;
use super::health::health_check;
use super::maxes;
use super::progressions;
use super::sessions;
use super::workout;

#[derive(Clone)]
pub struct AppState {
    pub enrollment: EnrollmentService,
    pub sessions: SessionService,
    pub workouts: WorkoutBuilder,
    pub progressions: ProgressionEngine,
    pub store: Store,
    pub jwt: JwtService,
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> JwtService {
        state.jwt.clone()
    }
}

/// Wire the engine onto a store: the progression engine subscribes to the
/// bus, every other component publishes into it.
pub fn build_state(store: Store, jwt: JwtService) -> AppState {
    let bus = EventBus::new();
    let progressions = ProgressionEngine::new(store.clone());
    bus.subscribe(Arc::new(progressions.clone()));

    AppState {
        enrollment: EnrollmentService::new(store.clone(), bus.clone()),
        sessions: SessionService::new(store.clone(), bus),
        workouts: WorkoutBuilder::new(store.clone()),
        progressions,
        store,
        jwt,
    }
}

pub fn create_routes(store: Store, jwt: JwtService) -> Router {
    let state = build_state(store, jwt);

    let protected = Router::new()
        .route(
            "/users/:user_id/enrollment",
            post(enrollment::enroll)
                .delete(enrollment::quit)
                .get(enrollment::get_enrollment),
        )
        .route(
            "/users/:user_id/enrollment/next-cycle",
            post(enrollment::next_cycle),
        )
        .route(
            "/users/:user_id/enrollment/advance-week",
            post(enrollment::advance_week),
        )
        .route("/users/:user_id/workout", get(workout::get_workout))
        .route(
            "/users/:user_id/workout-sessions/start",
            post(sessions::start_session),
        )
        .route(
            "/users/:user_id/workout-sessions/finish",
            post(sessions::finish_session),
        )
        .route(
            "/users/:user_id/workout-sessions/abandon",
            post(sessions::abandon_session),
        )
        .route(
            "/users/:user_id/workout-sessions/current",
            get(sessions::current_session),
        )
        .route(
            "/users/:user_id/workout-sessions/:session_id/sets",
            get(sessions::list_sets).post(sessions::log_set),
        )
        .route("/users/:user_id/lift-maxes/current", get(maxes::current_max))
        .route(
            "/users/:user_id/progression-history",
            get(progressions::progression_history),
        )
        .route(
            "/users/:user_id/progressions/trigger",
            post(progressions::trigger_progression),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

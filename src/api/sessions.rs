use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{ensure_same_user, CurrentUser};
use crate::engine::LogSetInput;
use crate::error::Error;
use crate::models::{LoggedSet, UserProgramState, WorkoutSession};

use super::response::{ApiResponse, ListResponse};
use super::routes::AppState;

#[derive(Debug, Serialize)]
pub struct FinishedSession {
    pub session: WorkoutSession,
    pub state: UserProgramState,
}

#[derive(Debug, Deserialize)]
pub struct LogSetRequest {
    pub prescription_id: Uuid,
    pub set_number: i32,
    pub weight: f64,
    pub target_reps: i32,
    pub reps_performed: i32,
    #[serde(default)]
    pub is_amrap: bool,
}

pub async fn start_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<WorkoutSession>>), Error> {
    ensure_same_user(&current, user_id)?;
    let session = state.sessions.start_session(user_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(session))))
}

pub async fn finish_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FinishedSession>>, Error> {
    ensure_same_user(&current, user_id)?;
    let (session, program_state) = state.sessions.finish_current(user_id).await?;
    Ok(Json(ApiResponse::new(FinishedSession {
        session,
        state: program_state,
    })))
}

pub async fn abandon_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkoutSession>>, Error> {
    ensure_same_user(&current, user_id)?;
    let session = state.sessions.abandon_current(user_id).await?;
    Ok(Json(ApiResponse::new(session)))
}

pub async fn current_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkoutSession>>, Error> {
    ensure_same_user(&current, user_id)?;
    let session = state
        .sessions
        .current_session(user_id)
        .await?
        .ok_or_else(|| Error::not_found("workout session", user_id))?;
    Ok(Json(ApiResponse::new(session)))
}

pub async fn list_sets(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((user_id, session_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ListResponse<LoggedSet>>, Error> {
    ensure_same_user(&current, user_id)?;
    let sets = state.sessions.logged_sets(user_id, session_id).await?;
    Ok(Json(ListResponse::unpaginated(sets)))
}

pub async fn log_set(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((user_id, session_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<LogSetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoggedSet>>), Error> {
    ensure_same_user(&current, user_id)?;
    let logged = state
        .sessions
        .log_set(
            user_id,
            session_id,
            LogSetInput {
                prescription_id: body.prescription_id,
                set_number: body.set_number,
                weight: body.weight,
                target_reps: body.target_reps,
                reps_performed: body.reps_performed,
                is_amrap: body.is_amrap,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(logged))))
}

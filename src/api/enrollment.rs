use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{ensure_same_user, CurrentUser};
use crate::error::Error;
use crate::models::{UserProgramState, WorkoutSession};

use super::response::ApiResponse;
use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub program_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentInfo {
    pub state: UserProgramState,
    pub current_session: Option<WorkoutSession>,
}

pub async fn enroll(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProgramState>>), Error> {
    ensure_same_user(&current, user_id)?;
    let enrolled = state.enrollment.enroll(user_id, body.program_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(enrolled))))
}

pub async fn quit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserProgramState>>, Error> {
    ensure_same_user(&current, user_id)?;
    let quit = state.enrollment.quit(user_id).await?;
    Ok(Json(ApiResponse::new(quit)))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<EnrollmentInfo>>, Error> {
    ensure_same_user(&current, user_id)?;
    let (program_state, current_session) = state.enrollment.enrollment_info(user_id).await?;
    Ok(Json(ApiResponse::new(EnrollmentInfo {
        state: program_state,
        current_session,
    })))
}

pub async fn next_cycle(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserProgramState>>, Error> {
    ensure_same_user(&current, user_id)?;
    let next = state.enrollment.start_next_cycle(user_id).await?;
    Ok(Json(ApiResponse::new(next)))
}

pub async fn advance_week(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserProgramState>>, Error> {
    ensure_same_user(&current, user_id)?;
    let advanced = state.enrollment.advance_week(user_id).await?;
    Ok(Json(ApiResponse::new(advanced)))
}

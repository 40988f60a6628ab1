use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ensure_same_user, CurrentUser};
use crate::engine::AppliedProgression;
use crate::error::Error;
use crate::models::ProgressionLog;

use super::response::{ApiResponse, ListResponse, PaginationQuery};
use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub progression_id: Uuid,
    pub lift_id: Option<Uuid>,
    #[serde(default)]
    pub force: bool,
}

pub async fn progression_history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<ListResponse<ProgressionLog>>, Error> {
    ensure_same_user(&current, user_id)?;
    let (limit, offset) = (page.limit(), page.offset());
    let (logs, total) = state
        .store
        .progressions
        .logs_for_user(user_id, limit, offset)
        .await?;
    Ok(Json(ListResponse::new(logs, total, limit, offset)))
}

pub async fn trigger_progression(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<TriggerRequest>,
) -> Result<Json<ApiResponse<Vec<AppliedProgression>>>, Error> {
    ensure_same_user(&current, user_id)?;
    let results = state
        .progressions
        .trigger(user_id, body.progression_id, body.lift_id, body.force)
        .await?;
    Ok(Json(ApiResponse::new(results)))
}

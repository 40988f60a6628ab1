use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ensure_same_user, CurrentUser};
use crate::error::Error;
use crate::models::{LiftMax, MaxType};

use super::response::ApiResponse;
use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CurrentMaxQuery {
    /// Lift id or slug.
    pub lift: String,
    #[serde(rename = "type")]
    pub max_type: String,
}

pub async fn current_max(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<CurrentMaxQuery>,
) -> Result<Json<ApiResponse<LiftMax>>, Error> {
    ensure_same_user(&current, user_id)?;
    let max_type: MaxType = query.max_type.parse()?;

    let lift = match Uuid::parse_str(&query.lift) {
        Ok(id) => state.store.catalog.lift(id).await?,
        Err(_) => state.store.catalog.lift_by_slug(&query.lift).await?,
    }
    .ok_or_else(|| Error::not_found("lift", &query.lift))?;

    let max = state
        .store
        .maxes
        .current_max(user_id, lift.id, max_type)
        .await?
        .ok_or_else(|| Error::not_found("lift max", &lift.slug))?;
    Ok(Json(ApiResponse::new(max)))
}

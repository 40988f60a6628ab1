use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ensure_same_user, CurrentUser};
use crate::error::Error;
use crate::models::Workout;

use super::response::ApiResponse;
use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct WorkoutQuery {
    pub week: Option<i32>,
    #[serde(alias = "dayIndex")]
    pub day_index: Option<i32>,
}

/// Current workout, or a specific one when both coordinates are given.
pub async fn get_workout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<WorkoutQuery>,
) -> Result<Json<ApiResponse<Workout>>, Error> {
    ensure_same_user(&current, user_id)?;
    let workout = match (query.week, query.day_index) {
        (Some(week), Some(day_index)) => {
            state.workouts.workout_for_day(user_id, week, day_index).await?
        }
        _ => state.workouts.current_workout(user_id).await?,
    };
    Ok(Json(ApiResponse::new(workout)))
}

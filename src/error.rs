use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EnrollmentStatus, MaxType, ValidationErrors};

/// Error taxonomy surfaced by the execution engine. Each variant maps to a
/// stable error code and an HTTP status in the API layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid {machine} transition from {from} to {to}")]
    InvalidTransition {
        machine: &'static str,
        from: String,
        to: String,
    },
    #[error("A workout session is already in progress")]
    WorkoutAlreadyInProgress { session_id: Uuid },
    #[error("No active workout session")]
    NoActiveSession,
    #[error("No {max_type} max recorded for lift {lift_id}")]
    MaxNotFound {
        user_id: Uuid,
        lift_id: Uuid,
        max_type: MaxType,
    },
    #[error("Enrollment status {status} does not permit this operation")]
    InvalidEnrollmentState { status: EnrollmentStatus },
    #[error("Progression {progression_id} failed: {reason}")]
    ProgressionFailed { progression_id: Uuid, reason: String },
    #[error("Missing or expired session")]
    Unauthorized,
    #[error("Session is not valid for this resource")]
    Forbidden,
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::WorkoutAlreadyInProgress { .. } => "WORKOUT_ALREADY_IN_PROGRESS",
            Error::NoActiveSession => "NO_ACTIVE_SESSION",
            Error::MaxNotFound { .. } => "MAX_NOT_FOUND",
            Error::InvalidEnrollmentState { .. } => "INVALID_ENROLLMENT_STATE",
            Error::ProgressionFailed { .. } => "PROGRESSION_FAILED",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::Forbidden => "FORBIDDEN",
            Error::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict(_)
            | Error::InvalidTransition { .. }
            | Error::WorkoutAlreadyInProgress { .. }
            | Error::NoActiveSession
            | Error::InvalidEnrollmentState { .. } => StatusCode::CONFLICT,
            Error::MaxNotFound { .. } | Error::ProgressionFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation(errors) => Some(json!({ "violations": errors.violations() })),
            Error::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Error::InvalidTransition { machine, from, to } => {
                Some(json!({ "machine": machine, "from": from, "to": to }))
            }
            Error::WorkoutAlreadyInProgress { session_id } => {
                Some(json!({ "session_id": session_id }))
            }
            Error::MaxNotFound {
                lift_id, max_type, ..
            } => Some(json!({ "lift_id": lift_id, "max_type": max_type })),
            Error::InvalidEnrollmentState { status } => Some(json!({ "status": status })),
            Error::ProgressionFailed { progression_id, .. } => {
                Some(json!({ "progression_id": progression_id }))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(db.message().to_string())
            }
            _ => Error::Internal(anyhow::Error::from(err)),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let message = match &self {
            // Do not leak internal error chains to clients.
            Error::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
                "details": self.details(),
            }
        }));
        (status, body).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

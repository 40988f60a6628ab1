use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::Error;

use super::{extract_bearer_token, AuthError, CurrentUser, JwtService};

/// Bearer-session middleware: validates the token and stashes the
/// `CurrentUser` in request extensions for handlers.
pub async fn require_session(
    State(jwt): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;
    let token = extract_bearer_token(auth_header)?;
    let user = jwt.current_user(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// A session is valid only for its own user's resources.
pub fn ensure_same_user(current: &CurrentUser, path_user_id: Uuid) -> Result<(), Error> {
    if current.user_id == path_user_id {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

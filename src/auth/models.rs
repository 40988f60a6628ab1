use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;

/// JWT claims carried by a bearer session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiration, seconds since epoch.
    pub exp: usize,
    /// Issued at, seconds since epoch.
    pub iat: usize,
    /// Token id.
    pub jti: String,
}

/// The authenticated identity the core scopes operations by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
}

impl CurrentUser {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self { user_id })
    }
}

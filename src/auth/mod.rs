// Session identity the core consumes to scope operations.

pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;

pub use errors::AuthError;
pub use jwt::{extract_bearer_token, JwtService};
pub use middleware::{ensure_same_user, require_session};
pub use models::{Claims, CurrentUser};

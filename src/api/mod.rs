// HTTP surface: thin pass-throughs over the engine.

pub mod enrollment;
pub mod health;
pub mod maxes;
pub mod progressions;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod workout;

pub use routes::{build_state, create_routes, AppState};

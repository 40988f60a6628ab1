pub mod app;
pub mod database;

pub use app::{AppConfig, Environment};
pub use database::{run_migrations, DatabaseConfig};

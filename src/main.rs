use chrono::Duration;
use powerpro::api::create_routes;
use powerpro::auth::JwtService;
use powerpro::config::{run_migrations, AppConfig, DatabaseConfig};
use powerpro::repository::Store;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;

    let pool = db_config.connect().await?;
    run_migrations(&pool).await?;

    let store = Store::postgres(pool);
    let jwt = JwtService::new(
        &config.jwt_secret,
        Duration::hours(config.session_ttl_hours),
    );
    let app = create_routes(store, jwt);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("PowerPro server listening on http://{}", config.bind_addr);
    info!("Health check available at http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::{bail, Context, Result};
use std::env;
use std::net::SocketAddr;

const DEV_JWT_SECRET: &str = "powerpro-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Server and session settings, read once at startup. Bad values fail the
/// boot instead of being silently replaced; only missing values fall back
/// to development defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("POWERPRO_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000")
            .parse()
            .context("BIND_ADDR must be a host:port address")?;

        // A baked-in secret is acceptable for local development only.
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == Environment::Production => {
                bail!("JWT_SECRET is required in production")
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let session_ttl_hours: i64 = env_or("SESSION_TTL_HOURS", "12")
            .parse()
            .context("SESSION_TTL_HOURS must be an integer")?;
        if session_ttl_hours < 1 {
            bail!("SESSION_TTL_HOURS must be at least 1");
        }

        Ok(Self {
            bind_addr,
            environment,
            jwt_secret,
            session_ttl_hours,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_local_development() {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert!(config.session_ttl_hours >= 1);
        assert!(!config.jwt_secret.is_empty());
    }
}

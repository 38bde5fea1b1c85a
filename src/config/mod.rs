use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::{apply_security_headers, SecurityHeaders};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/encore";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_PAYMENT_SERVICE_URL: &str = "http://localhost:8082";
const DEFAULT_SEAT_CREATION_QUEUE: &str = "seat_creation_queue";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub payment_service_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub booking_ttl: Duration,
    pub reaper_interval: Duration,
    pub seat_creation_queue: String,
    pub rate_limit_max_requests: u64,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: var_or("REDIS_URL", DEFAULT_REDIS_URL),
            payment_service_url: var_or("PAYMENT_SERVICE_URL", DEFAULT_PAYMENT_SERVICE_URL),
            jwt_secret,
            port: parse_or("PORT", 8081),
            booking_ttl: Duration::from_secs(parse_or("BOOKING_TTL_SECS", 900)),
            reaper_interval: Duration::from_secs(parse_or("REAPER_INTERVAL_SECS", 30)),
            seat_creation_queue: var_or("SEAT_CREATION_QUEUE", DEFAULT_SEAT_CREATION_QUEUE),
            rate_limit_max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", 100),
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 60)),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Config: invalid {}='{}', using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("ENCORE_TEST_PORT", "not-a-port");
        assert_eq!(parse_or::<u16>("ENCORE_TEST_PORT", 8081), 8081);
        env::set_var("ENCORE_TEST_PORT", " 9000 ");
        assert_eq!(parse_or::<u16>("ENCORE_TEST_PORT", 8081), 9000);
        env::remove_var("ENCORE_TEST_PORT");
    }

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        env::remove_var("ENCORE_TEST_UNSET");
        assert_eq!(parse_or::<u64>("ENCORE_TEST_UNSET", 30), 30);
    }
}

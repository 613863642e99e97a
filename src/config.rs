// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub quiz_api_url: Url,
    pub bind_addr: SocketAddr,
    pub api_timeout_secs: u64,
    pub rust_log: String,
    pub cors_origins: Vec<String>,
    /// How long a finished session stays readable after its last request.
    pub session_retention_secs: u64,
    /// Sessions with no request for this long are closed.
    pub session_idle_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://player.db?mode=rwc".to_string());

        let quiz_api_url = env::var("QUIZ_API_URL")
            .expect("QUIZ_API_URL must be set")
            .parse::<Url>()
            .expect("QUIZ_API_URL must be a valid URL");

        let bind_addr = env::var("PLAYER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .expect("PLAYER_ADDR must be a socket address");

        let api_timeout_secs = env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let session_retention_secs = env::var("SESSION_RETENTION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        let session_idle_secs = env::var("SESSION_IDLE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4 * 3600);

        Self {
            database_url,
            quiz_api_url,
            bind_addr,
            api_timeout_secs,
            rust_log,
            cors_origins,
            session_retention_secs,
            session_idle_secs,
        }
    }
}

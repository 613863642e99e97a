// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use quiz_player::config::Config;
use quiz_player::routes;
use quiz_player::services::{
    api::HttpQuizApi, deadline::SqliteDeadlineStore, player::PlayerDeps,
};
use quiz_player::state::{AppState, SessionRegistry};
use quiz_player::utils::clock::SystemClock;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "player.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected, running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let api = HttpQuizApi::new(
        config.quiz_api_url.clone(),
        Duration::from_secs(config.api_timeout_secs),
    )
    .expect("Failed to build quiz API client");
    tracing::info!("Quiz API at {}", config.quiz_api_url);

    let deps = PlayerDeps {
        api: Arc::new(api),
        deadlines: Arc::new(SqliteDeadlineStore::new(pool.clone())),
        clock: Arc::new(SystemClock),
    };

    let sessions = SessionRegistry::default();
    sessions.spawn_sweeper(
        Duration::from_secs(config.session_retention_secs),
        Duration::from_secs(config.session_idle_secs),
    );

    let state = AppState {
        pool,
        config: config.clone(),
        sessions,
        deps,
    };

    let app = routes::create_router(state);

    tracing::info!("Quiz player listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

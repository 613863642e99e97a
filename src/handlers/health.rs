// src/handlers/health.rs

use axum::{Json, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{error::AppError, state::SessionRegistry};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub sessions: usize,
}

/// Liveness check: the deadline database answers and the registry is readable.
pub async fn health_check(
    State(pool): State<SqlitePool>,
    State(sessions): State<SessionRegistry>,
) -> Result<Json<HealthStatus>, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&pool)
        .await?;

    Ok(Json(HealthStatus {
        status: "ok",
        sessions: sessions.len(),
    }))
}

// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{health, player},
    state::AppState,
};

/// Assembles the application router.
///
/// * Player session routes under `/api/player`.
/// * Health check (database + live session count).
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let session_routes = Router::new()
        .route("/{id}", get(player::get_session).delete(player::close_session))
        .route("/{id}/answer", put(player::set_answer))
        .route("/{id}/next", post(player::next_question))
        .route("/{id}/previous", post(player::previous_question))
        .route("/{id}/goto/{index}", post(player::go_to_question))
        .route("/{id}/submit", post(player::submit))
        .route("/{id}/signals", post(player::report_signal))
        .route("/{id}/result", get(player::get_result))
        .route("/{id}/notices/{notice_id}", delete(player::dismiss_notice));

    Router::new()
        .route("/api/player/health", get(health::health_check))
        .route(
            "/api/player/quizzes/{quiz_id}/sessions",
            post(player::create_session),
        )
        .nest("/api/player/sessions", session_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

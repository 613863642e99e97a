// tests/common/mod.rs
//
// Spawns a mock quiz API and the player service on random ports.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use quiz_player::{
    config::Config,
    routes,
    services::{api::HttpQuizApi, deadline::SqliteDeadlineStore, player::PlayerDeps},
    state::{AppState, SessionRegistry},
    utils::clock::SystemClock,
};
use serde_json::{Value, json};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub const ATTEMPT_ID: i64 = 41;
/// Untimed: mcq, short, code.
pub const UNTIMED_QUIZ: i64 = 1;
/// 60 second limit: mcq, short.
pub const TIMED_QUIZ: i64 = 2;

#[derive(Default)]
pub struct Upstream {
    pub answers: Mutex<Vec<(i64, Value)>>,
    pub submitted: Mutex<HashSet<i64>>,
    pub submit_calls: Mutex<usize>,
    pub attempts_started: Mutex<HashMap<i64, usize>>,
}

impl Upstream {
    pub fn answers(&self) -> Vec<(i64, Value)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        *self.submit_calls.lock().unwrap()
    }

    pub fn mark_submitted(&self, attempt_id: i64) {
        self.submitted.lock().unwrap().insert(attempt_id);
    }
}

fn quiz_json(id: i64) -> Option<Value> {
    match id {
        UNTIMED_QUIZ => Some(json!({
            "id": 1,
            "title": "Geography",
            "description": "Capitals and code",
            "timeLimitSeconds": null,
            "questions": [
                {"id": 12, "quizId": 1, "type": "short", "prompt": "Capital of France?", "position": 1},
                {"id": 11, "quizId": 1, "type": "mcq", "prompt": "<b>Largest</b> ocean?", "options": ["Pacific", "Atlantic"], "position": 0},
                {"id": 13, "quizId": 1, "type": "code", "prompt": "Print hello", "position": 2}
            ]
        })),
        TIMED_QUIZ => Some(json!({
            "id": 2,
            "title": "Timed",
            "timeLimitSeconds": 60,
            "questions": [
                {"id": 21, "quizId": 2, "type": "mcq", "prompt": "Q1", "options": ["A", "B"], "position": 0},
                {"id": 22, "quizId": 2, "type": "short", "prompt": "Q2", "position": 1}
            ]
        })),
        _ => None,
    }
}

fn result_json() -> Value {
    json!({
        "score": 2,
        "details": [
            {"questionId": 11, "correct": true},
            {"questionId": 12, "correct": true},
            {"questionId": 13, "correct": null}
        ]
    })
}

async fn get_quiz(Path(id): Path<i64>) -> Response {
    match quiz_json(id) {
        Some(quiz) => Json(quiz).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_attempt(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> Response {
    let quiz_id = body["quizId"].as_i64().unwrap_or_default();
    *upstream
        .attempts_started
        .lock()
        .unwrap()
        .entry(quiz_id)
        .or_default() += 1;
    Json(json!({
        "id": ATTEMPT_ID,
        "quizId": quiz_id,
        "startedAt": "2025-01-01T00:00:00Z"
    }))
    .into_response()
}

async fn upsert_answer(
    State(upstream): State<Arc<Upstream>>,
    Path(attempt_id): Path<i64>,
    Json(body): Json<Value>,
) -> StatusCode {
    upstream.answers.lock().unwrap().push((attempt_id, body));
    StatusCode::OK
}

async fn submit_attempt(State(upstream): State<Arc<Upstream>>, Path(attempt_id): Path<i64>) -> Response {
    *upstream.submit_calls.lock().unwrap() += 1;
    if !upstream.submitted.lock().unwrap().insert(attempt_id) {
        return (StatusCode::CONFLICT, Json(json!({"error": "already submitted"}))).into_response();
    }
    Json(result_json()).into_response()
}

async fn get_result(State(upstream): State<Arc<Upstream>>, Path(attempt_id): Path<i64>) -> Response {
    if upstream.submitted.lock().unwrap().contains(&attempt_id) {
        Json(result_json()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let api = Router::new()
        .route("/quizzes/{id}", get(get_quiz))
        .route("/attempts", post(start_attempt))
        .route("/attempts/{id}/answer", post(upsert_answer))
        .route("/attempts/{id}/submit", post(submit_attempt))
        .route("/attempts/{id}/result", get(get_result))
        .with_state(upstream);
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}/api", port)
}

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub upstream: Arc<Upstream>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Opens a session and returns its id with the initial view.
    pub async fn open_session(&self, quiz_id: i64) -> (String, Value) {
        let response = self
            .client
            .post(self.url(&format!("/api/player/quizzes/{}/sessions", quiz_id)))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        let id = body["sessionId"].as_str().unwrap().to_string();
        (id, body)
    }

    pub async fn post(&self, session_id: &str, action: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/player/sessions/{}/{}", session_id, action)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn answer(&self, session_id: &str, value: Value) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/api/player/sessions/{}/answer", session_id)))
            .json(&json!({ "value": value }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn view(&self, session_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/player/sessions/{}", session_id)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Fetches the score report of a completed session.
    pub async fn result(&self, session_id: &str) -> Value {
        let response = self
            .client
            .get(self.url(&format!("/api/player/sessions/{}/result", session_id)))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }

    /// Waits until the upstream has received `count` answer upserts.
    pub async fn wait_for_answers(&self, count: usize) -> Vec<(i64, Value)> {
        for _ in 0..50 {
            let answers = self.upstream.answers();
            if answers.len() >= count {
                return answers;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("upstream never received {} answers", count);
    }

    pub async fn stored_deadline(&self, quiz_id: i64) -> Option<i64> {
        sqlx::query_scalar::<_, i64>("SELECT deadline_ms FROM quiz_deadlines WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap()
    }
}

pub async fn spawn_app() -> TestApp {
    let upstream = Arc::new(Upstream::default());
    let upstream_url = spawn_upstream(upstream.clone()).await;

    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        quiz_api_url: upstream_url.parse().unwrap(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        api_timeout_secs: 5,
        rust_log: "error".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        session_retention_secs: 900,
        session_idle_secs: 3600,
    };

    let api = HttpQuizApi::new(
        config.quiz_api_url.clone(),
        Duration::from_secs(config.api_timeout_secs),
    )
    .unwrap();

    let deps = PlayerDeps {
        api: Arc::new(api),
        deadlines: Arc::new(SqliteDeadlineStore::new(pool.clone())),
        clock: Arc::new(SystemClock),
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        sessions: SessionRegistry::default(),
        deps,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        upstream,
        client: reqwest::Client::new(),
    }
}

// src/handlers/player.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::session::{AnswerRequest, CreatedSession, ResultView, SessionView, SignalRequest},
    services::{
        player::{AttemptPlayer, Navigation, PlayerDeps},
        signals::SignalResponse,
    },
    state::SessionRegistry,
};

fn find_session(sessions: &SessionRegistry, id: &Uuid) -> Result<Arc<AttemptPlayer>, AppError> {
    sessions
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
}

/// Creates a session for a quiz and loads it.
///
/// * Fetches the quiz and starts an attempt upstream.
/// * Starts proctoring and, for timed quizzes, the countdown.
///
/// A session that fails to load is discarded; the caller gets the error.
pub async fn create_session(
    State(sessions): State<SessionRegistry>,
    State(deps): State<PlayerDeps>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let player = AttemptPlayer::new(quiz_id, deps);
    if let Err(e) = player.load().await {
        player.teardown();
        return Err(e.into());
    }

    // Registered only once loaded: a dropped request leaves nothing behind.
    let session_id = sessions.insert(player.clone());

    tracing::info!("Session {} opened for quiz {}", session_id, quiz_id);
    let body = CreatedSession {
        session_id,
        view: player.view(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let player = find_session(&sessions, &id)?;
    Ok(Json(player.view()))
}

/// Stores the answer for the question currently shown.
pub async fn set_answer(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let player = find_session(&sessions, &id)?;
    player.set_answer(payload.value)?;
    Ok(Json(player.view()))
}

fn navigated(player: &AttemptPlayer, nav: Navigation) -> Json<SessionView> {
    // The outgoing answer keeps uploading in the background.
    if nav.flush.is_some() {
        tracing::debug!("Answer flush in flight, moved to question {}", nav.index + 1);
    }
    Json(player.view())
}

pub async fn next_question(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let player = find_session(&sessions, &id)?;
    let nav = player.next()?;
    Ok(navigated(&player, nav))
}

pub async fn previous_question(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let player = find_session(&sessions, &id)?;
    let nav = player.previous()?;
    Ok(navigated(&player, nav))
}

/// Jumps to a question by its 0-based index.
pub async fn go_to_question(
    State(sessions): State<SessionRegistry>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let player = find_session(&sessions, &id)?;
    let nav = player.go_to(index)?;
    Ok(navigated(&player, nav))
}

/// Submits the attempt. Submitting a completed session returns the same
/// view without contacting the quiz API again.
pub async fn submit(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let player = find_session(&sessions, &id)?;
    player.submit().await?;
    Ok(Json(player.view()))
}

pub async fn report_signal(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SignalRequest>,
) -> Result<Json<SignalResponse>, AppError> {
    let player = find_session(&sessions, &id)?;
    Ok(Json(player.events().emit(payload.signal)))
}

pub async fn get_result(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultView>, AppError> {
    let player = find_session(&sessions, &id)?;
    let report = player
        .report()
        .ok_or_else(|| AppError::NotFound("Attempt not completed yet".to_string()))?;
    Ok(Json(ResultView::from(report)))
}

pub async fn dismiss_notice(
    State(sessions): State<SessionRegistry>,
    Path((id, notice_id)): Path<(Uuid, u64)>,
) -> Result<StatusCode, AppError> {
    let player = find_session(&sessions, &id)?;
    if !player.notices().dismiss(notice_id) {
        return Err(AppError::NotFound(format!("Notice {} not found", notice_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Closes a session. The quiz deadline is kept, so a new session for the same
/// quiz resumes the running countdown.
pub async fn close_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let player = sessions
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
    player.teardown();
    tracing::info!("Session {} closed", id);
    Ok(StatusCode::NO_CONTENT)
}

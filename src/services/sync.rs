// src/services/sync.rs

use std::sync::{Arc, Mutex};

use crate::{
    error::PlayerError,
    models::{
        attempt::{AnswerPayload, Attempt},
        quiz::AnswerValue,
    },
    services::api::QuizApi,
};

pub type AttemptCache = Arc<Mutex<Option<Attempt>>>;
pub type SyncErrorCallback = Arc<dyn Fn(&PlayerError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No attempt exists yet; nothing was sent and nothing is queued.
    Skipped,
    Saved,
    /// Reported through the error callback.
    Failed,
}

/// Upserts single answers to the quiz API.
#[derive(Clone)]
pub struct AnswerSynchronizer {
    api: Arc<dyn QuizApi>,
    cache: AttemptCache,
    on_error: SyncErrorCallback,
}

impl AnswerSynchronizer {
    pub fn new(api: Arc<dyn QuizApi>, cache: AttemptCache, on_error: SyncErrorCallback) -> Self {
        Self {
            api,
            cache,
            on_error,
        }
    }

    /// Sends the canonical form of `value` for one question.
    ///
    /// Never fails: a missing attempt is a no-op and API errors go to the error
    /// callback.
    pub async fn upsert(
        &self,
        attempt_id: Option<i64>,
        question_id: i64,
        value: &AnswerValue,
    ) -> SyncOutcome {
        let attempt_id = match attempt_id {
            Some(id) if id > 0 => id,
            _ => {
                tracing::debug!("No attempt yet, answer for question {} not sent", question_id);
                return SyncOutcome::Skipped;
            }
        };

        let payload = AnswerPayload {
            question_id,
            value: value.canonical(),
        };

        match self.api.upsert_answer(attempt_id, &payload).await {
            Ok(()) => {
                self.refresh_cache(attempt_id, payload);
                SyncOutcome::Saved
            }
            Err(e) => {
                let err = PlayerError::AnswerSyncFailure {
                    question_id,
                    reason: e.to_string(),
                };
                tracing::warn!("Attempt {}: {}", attempt_id, err);
                (self.on_error)(&err);
                SyncOutcome::Failed
            }
        }
    }

    fn refresh_cache(&self, attempt_id: i64, payload: AnswerPayload) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(attempt) = cache.as_mut().filter(|a| a.id == attempt_id) {
            // A late acknowledgement must not touch a submitted attempt.
            if let Err(e) = attempt.record_answer(payload.question_id, payload.value) {
                tracing::debug!("Ignoring acknowledgement: {}", e);
            }
        }
    }
}

// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Response of the quiz API when an attempt is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAttempt {
    #[serde(alias = "attemptId")]
    pub id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
}

/// Body of an answer upsert. `value` is always the canonical string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub question_id: i64,
    pub value: String,
}

/// Grading outcome for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: i64,
    /// `None` for questions that need manual review.
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

/// Response of the quiz API on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub score: f64,
    #[serde(default)]
    pub details: Vec<QuestionOutcome>,
}

/// The player's cached view of an attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub answers: BTreeMap<i64, String>,
    pub score: Option<f64>,
    #[serde(skip)]
    question_ids: Vec<i64>,
}

impl Attempt {
    pub fn new(started: &StartedAttempt, question_ids: Vec<i64>) -> Self {
        Self {
            id: started.id,
            quiz_id: started.quiz_id,
            started_at: started.started_at,
            submitted_at: None,
            answers: BTreeMap::new(),
            score: None,
            question_ids,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// Records an acknowledged answer. Rejects foreign questions and any change
    /// after submission.
    pub fn record_answer(&mut self, question_id: i64, value: String) -> Result<(), PlayerError> {
        if self.is_submitted() {
            return Err(PlayerError::AttemptFrozen(self.id));
        }
        if !self.question_ids.contains(&question_id) {
            return Err(PlayerError::UnknownQuestion(question_id));
        }
        self.answers.insert(question_id, value);
        Ok(())
    }

    /// Freezes the attempt. Only the first call has an effect.
    pub fn finalize(&mut self, score: f64, at: DateTime<Utc>) {
        if self.is_submitted() {
            return;
        }
        self.score = Some(score);
        self.submitted_at = Some(at);
    }
}

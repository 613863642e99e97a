// src/models/session.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    quiz::{AnswerInput, AnswerValue, Question},
    report::ScoreReport,
    violation::ViolationCounts,
};
use crate::{
    services::{notice::Notice, player::Phase, signals::Signal},
    utils::html::clean_html,
};

/// Question as rendered for the learner. Prompt and options are sanitized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub prompt: String,
    #[serde(flatten)]
    pub input: AnswerInput,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        let input = match question.kind.input() {
            AnswerInput::Choice { options } => AnswerInput::Choice {
                options: options.iter().map(|o| clean_html(o)).collect(),
            },
            other => other,
        };

        Self {
            id: question.id,
            question_type: question.kind.type_name(),
            prompt: clean_html(&question.prompt),
            input,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Position {
    /// 1-based.
    pub current: usize,
    pub total: usize,
}

/// Everything the front-end needs to render one session.
///
/// While the attempt runs `question` is set; once completed it is replaced by
/// `report`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub quiz_id: i64,
    #[serde(flatten)]
    pub phase: Phase,
    pub title: Option<String>,
    pub time_limit: String,
    pub position: Option<Position>,
    pub question: Option<QuestionView>,
    pub answer: Option<AnswerValue>,
    pub remaining_seconds: Option<i64>,
    pub remaining_label: Option<String>,
    pub notices: Vec<Notice>,
    pub violations: ViolationCounts,
    pub report: Option<ScoreReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub view: SessionView,
}

/// Score report plus its rendered text lines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub headline: String,
    pub violation_lines: Vec<String>,
    #[serde(flatten)]
    pub report: ScoreReport,
}

impl From<ScoreReport> for ResultView {
    fn from(report: ScoreReport) -> Self {
        Self {
            headline: report.headline(),
            violation_lines: report.violation_lines(),
            report,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(custom(function = validate_answer_value))]
    pub value: AnswerValue,
}

fn validate_answer_value(value: &AnswerValue) -> Result<(), validator::ValidationError> {
    if let AnswerValue::Text(text) = value {
        if text.chars().count() > MAX_ANSWER_CHARS {
            return Err(validator::ValidationError::new("answer_too_long"));
        }
    }
    Ok(())
}

pub const MAX_ANSWER_CHARS: usize = 20_000;

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    pub signal: Signal,
}

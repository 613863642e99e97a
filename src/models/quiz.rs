// src/models/quiz.rs

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// A quiz as served by the quiz API. Read-only for the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub time_limit_seconds: Option<i64>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    /// Orders questions by their authored position.
    pub fn sorted(mut self) -> Self {
        self.questions.sort_by_key(|q| q.position);
        self
    }

    /// Number of questions that are graded automatically (mcq and short).
    pub fn auto_gradable_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.kind.is_auto_gradable())
            .count()
    }
}

/// A single question. Correct answers are never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    pub position: i32,
    pub kind: QuestionKind,
}

/// One variant per question type. Each variant knows how its answer is
/// entered, validated and normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    Mcq { options: Vec<String> },
    Short,
    Code,
}

/// How the learner enters an answer for a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "input", rename_all = "camelCase")]
pub enum AnswerInput {
    /// Pick one of the options.
    Choice { options: Vec<String> },
    /// Single line of text.
    Line,
    /// Multi-line monospace editor.
    Editor,
}

/// Wire shape of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRecord {
    id: i64,
    quiz_id: i64,
    #[serde(rename = "type")]
    question_type: String,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default)]
    position: i32,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = String;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        let kind = match record.question_type.as_str() {
            "mcq" => match record.options {
                Some(options) if !options.is_empty() => QuestionKind::Mcq { options },
                _ => return Err(format!("mcq question {} has no options", record.id)),
            },
            "short" => QuestionKind::Short,
            "code" => QuestionKind::Code,
            other => return Err(format!("unknown question type '{}'", other)),
        };

        Ok(Question {
            id: record.id,
            quiz_id: record.quiz_id,
            prompt: record.prompt,
            position: record.position,
            kind,
        })
    }
}

impl From<Question> for QuestionRecord {
    fn from(q: Question) -> Self {
        let (question_type, options) = match q.kind {
            QuestionKind::Mcq { options } => ("mcq", Some(options)),
            QuestionKind::Short => ("short", None),
            QuestionKind::Code => ("code", None),
        };
        QuestionRecord {
            id: q.id,
            quiz_id: q.quiz_id,
            question_type: question_type.to_string(),
            prompt: q.prompt,
            options,
            position: q.position,
        }
    }
}

/// A learner's raw input: free text or a numeric option index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(usize),
    Text(String),
}

impl Default for AnswerValue {
    fn default() -> Self {
        AnswerValue::Text(String::new())
    }
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Choice(_) => false,
            AnswerValue::Text(text) => text.is_empty(),
        }
    }

    /// The string form sent to the quiz API, whatever the source type.
    pub fn canonical(&self) -> String {
        match self {
            AnswerValue::Choice(index) => index.to_string(),
            AnswerValue::Text(text) => text.clone(),
        }
    }
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::Short => "short",
            QuestionKind::Code => "code",
        }
    }

    pub fn input(&self) -> AnswerInput {
        match self {
            QuestionKind::Mcq { options } => AnswerInput::Choice {
                options: options.clone(),
            },
            QuestionKind::Short => AnswerInput::Line,
            QuestionKind::Code => AnswerInput::Editor,
        }
    }

    /// Code questions need manual review and are left out of the score ratio.
    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self, QuestionKind::Code)
    }

    /// Checks the value against this question type and returns the form that
    /// is stored for it.
    pub fn normalize(&self, value: AnswerValue) -> Result<AnswerValue, PlayerError> {
        match (self, value) {
            (QuestionKind::Mcq { options }, AnswerValue::Choice(index)) => {
                if index < options.len() {
                    Ok(AnswerValue::Choice(index))
                } else {
                    Err(PlayerError::InvalidAnswer(format!(
                        "option {} out of range (0..{})",
                        index,
                        options.len()
                    )))
                }
            }
            (QuestionKind::Mcq { options }, AnswerValue::Text(text)) => {
                if text.is_empty() || options.contains(&text) {
                    Ok(AnswerValue::Text(text))
                } else {
                    Err(PlayerError::InvalidAnswer(format!(
                        "'{}' is not one of the options",
                        text
                    )))
                }
            }
            (QuestionKind::Short, AnswerValue::Text(text)) => {
                Ok(AnswerValue::Text(text.trim().to_string()))
            }
            (QuestionKind::Short, AnswerValue::Choice(_)) => Err(PlayerError::InvalidAnswer(
                "short answers must be text".to_string(),
            )),
            (QuestionKind::Code, AnswerValue::Text(text)) => Ok(AnswerValue::Text(text)),
            (QuestionKind::Code, AnswerValue::Choice(_)) => Err(PlayerError::InvalidAnswer(
                "code answers must be text".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(value: serde_json::Value) -> Result<Question, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_decode_question_variants() {
        let mcq = decode(serde_json::json!({
            "id": 1, "quizId": 9, "type": "mcq", "prompt": "Pick",
            "options": ["A", "B"], "position": 0
        }))
        .unwrap();
        assert_eq!(
            mcq.kind,
            QuestionKind::Mcq {
                options: vec!["A".to_string(), "B".to_string()]
            }
        );

        let code = decode(serde_json::json!({
            "id": 2, "quizId": 9, "type": "code", "prompt": "Write", "options": null, "position": 1
        }))
        .unwrap();
        assert_eq!(code.kind, QuestionKind::Code);
    }

    #[test]
    fn test_mcq_without_options_is_rejected() {
        let result = decode(serde_json::json!({
            "id": 1, "quizId": 9, "type": "mcq", "prompt": "Pick", "position": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = decode(serde_json::json!({
            "id": 1, "quizId": 9, "type": "essay", "prompt": "?", "position": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_quiz_sorted_and_auto_gradable_count() {
        let quiz: QuizDefinition = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "T",
            "description": "",
            "timeLimitSeconds": 60,
            "questions": [
                {"id": 3, "quizId": 1, "type": "code", "prompt": "c", "position": 2},
                {"id": 1, "quizId": 1, "type": "mcq", "prompt": "a", "options": ["x"], "position": 0},
                {"id": 2, "quizId": 1, "type": "short", "prompt": "b", "position": 1}
            ]
        }))
        .unwrap();
        let quiz = quiz.sorted();

        let ids: Vec<i64> = quiz.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(quiz.auto_gradable_count(), 2);
        assert_eq!(quiz.time_limit_seconds, Some(60));
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(AnswerValue::Choice(2).canonical(), "2");
        assert_eq!(AnswerValue::Text("fn main() {}".into()).canonical(), "fn main() {}");
        assert!(AnswerValue::default().is_empty());
    }

    #[test]
    fn test_normalize_per_kind() {
        let mcq = QuestionKind::Mcq {
            options: vec!["A".into(), "B".into()],
        };
        assert_eq!(
            mcq.normalize(AnswerValue::Choice(1)).unwrap(),
            AnswerValue::Choice(1)
        );
        assert!(mcq.normalize(AnswerValue::Choice(2)).is_err());
        assert!(mcq.normalize(AnswerValue::Text("C".into())).is_err());

        assert_eq!(
            QuestionKind::Short
                .normalize(AnswerValue::Text("  Paris \n".into()))
                .unwrap(),
            AnswerValue::Text("Paris".into())
        );
        assert_eq!(
            QuestionKind::Code
                .normalize(AnswerValue::Text("  x = 1\n".into()))
                .unwrap(),
            AnswerValue::Text("  x = 1\n".into())
        );
        assert!(QuestionKind::Code.normalize(AnswerValue::Choice(0)).is_err());
    }
}

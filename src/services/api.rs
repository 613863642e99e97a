// src/services/api.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use crate::models::{
    attempt::{AnswerPayload, AttemptResult, StartedAttempt},
    quiz::QuizDefinition,
};

/// Failure of a single call to the quiz API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    /// The attempt was submitted before; the server refused to grade it again.
    #[error("attempt already submitted")]
    AlreadySubmitted,

    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The quiz management / grading service the player talks to.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<QuizDefinition, ApiError>;

    async fn start_attempt(&self, quiz_id: i64) -> Result<StartedAttempt, ApiError>;

    async fn upsert_answer(&self, attempt_id: i64, answer: &AnswerPayload) -> Result<(), ApiError>;

    /// A second submission of the same attempt yields `ApiError::AlreadySubmitted`.
    async fn submit_attempt(&self, attempt_id: i64) -> Result<AttemptResult, ApiError>;

    /// The stored result of an already submitted attempt.
    async fn fetch_result(&self, attempt_id: i64) -> Result<AttemptResult, ApiError>;
}

fn default_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    headers
}

/// `QuizApi` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpQuizApi {
    client: Client,
    base_url: Url,
}

impl HttpQuizApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// `Url::join` drops the last segment unless the base ends with a slash.
fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        StatusCode::CONFLICT => Err(ApiError::AlreadySubmitted),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<QuizDefinition, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("quizzes/{}", quiz_id))?)
            .send()
            .await
            .map_err(transport)?;
        let quiz: QuizDefinition = Self::read(response).await?;
        Ok(quiz.sorted())
    }

    async fn start_attempt(&self, quiz_id: i64) -> Result<StartedAttempt, ApiError> {
        let response = self
            .client
            .post(self.url("attempts")?)
            .json(&serde_json::json!({ "quizId": quiz_id }))
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn upsert_answer(&self, attempt_id: i64, answer: &AnswerPayload) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("attempts/{}/answer", attempt_id))?)
            .json(answer)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: i64) -> Result<AttemptResult, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("attempts/{}/submit", attempt_id))?)
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn fetch_result(&self, attempt_id: i64) -> Result<AttemptResult, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("attempts/{}/result", attempt_id))?)
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }
}

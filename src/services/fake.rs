// src/services/fake.rs
//
// In-memory QuizApi used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::models::{
    attempt::{AnswerPayload, AttemptResult, QuestionOutcome, StartedAttempt},
    quiz::QuizDefinition,
};
use crate::services::api::{ApiError, QuizApi};

pub struct FakeQuizApi {
    quiz: QuizDefinition,
    attempt_id: i64,
    fetch_failures: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    start_error: Mutex<Option<ApiError>>,
    upsert_error: Mutex<Option<ApiError>>,
    upsert_gate: Mutex<Option<Arc<Semaphore>>>,
    upsert_started: AtomicUsize,
    upserts: Mutex<Vec<(i64, AnswerPayload)>>,
    submit_errors: Mutex<VecDeque<ApiError>>,
    submit_calls: AtomicUsize,
    submitted: AtomicBool,
    result_available: AtomicBool,
    result: AttemptResult,
}

impl FakeQuizApi {
    pub fn new(quiz: QuizDefinition) -> Self {
        let details = quiz
            .questions
            .iter()
            .map(|q| QuestionOutcome {
                question_id: q.id,
                correct: q.kind.is_auto_gradable().then_some(true),
                expected: None,
            })
            .collect();

        Self {
            quiz,
            attempt_id: 100,
            fetch_failures: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fetch_gate: Mutex::new(None),
            start_error: Mutex::new(None),
            upsert_error: Mutex::new(None),
            upsert_gate: Mutex::new(None),
            upsert_started: AtomicUsize::new(0),
            upserts: Mutex::new(Vec::new()),
            submit_errors: Mutex::new(VecDeque::new()),
            submit_calls: AtomicUsize::new(0),
            submitted: AtomicBool::new(false),
            result_available: AtomicBool::new(true),
            result: AttemptResult {
                score: 1.0,
                details,
            },
        }
    }

    /// Quiz with one mcq (options A, B, C) and one short question.
    pub fn sample_quiz(id: i64, time_limit_seconds: Option<i64>) -> QuizDefinition {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": "Sample",
            "description": "Two questions",
            "timeLimitSeconds": time_limit_seconds,
            "questions": [
                {"id": 1, "quizId": id, "type": "mcq", "prompt": "Q1", "options": ["A", "B", "C"], "position": 0},
                {"id": 2, "quizId": id, "type": "short", "prompt": "Q2", "position": 1}
            ]
        }))
        .expect("sample quiz")
    }

    pub fn fail_fetches(&self, times: usize) {
        self.fetch_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_start(&self, err: ApiError) {
        *self.start_error.lock().unwrap() = Some(err);
    }

    pub fn fail_upserts(&self, err: ApiError) {
        *self.upsert_error.lock().unwrap() = Some(err);
    }

    /// Quiz fetches wait for a permit from the returned semaphore.
    pub fn gate_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Upserts wait for a permit from the returned semaphore.
    pub fn gate_upserts(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.upsert_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn fail_next_submit(&self, err: ApiError) {
        self.submit_errors.lock().unwrap().push_back(err);
    }

    pub fn mark_submitted(&self, result_available: bool) {
        self.submitted.store(true, Ordering::SeqCst);
        self.result_available
            .store(result_available, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_started(&self) -> usize {
        self.upsert_started.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> Vec<(i64, AnswerPayload)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizApi for FakeQuizApi {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<QuizDefinition, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self
            .fetch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ApiError::Transport("connection refused".into()));
        }
        if quiz_id != self.quiz.id {
            return Err(ApiError::NotFound);
        }
        Ok(self.quiz.clone())
    }

    async fn start_attempt(&self, quiz_id: i64) -> Result<StartedAttempt, ApiError> {
        if let Some(err) = self.start_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(StartedAttempt {
            id: self.attempt_id,
            quiz_id,
            started_at: chrono::Utc::now(),
        })
    }

    async fn upsert_answer(&self, attempt_id: i64, answer: &AnswerPayload) -> Result<(), ApiError> {
        self.upsert_started.fetch_add(1, Ordering::SeqCst);
        let gate = self.upsert_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(err) = self.upsert_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.upserts
            .lock()
            .unwrap()
            .push((attempt_id, answer.clone()));
        Ok(())
    }

    async fn submit_attempt(&self, _attempt_id: i64) -> Result<AttemptResult, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.submitted.swap(true, Ordering::SeqCst) {
            return Err(ApiError::AlreadySubmitted);
        }
        Ok(self.result.clone())
    }

    async fn fetch_result(&self, _attempt_id: i64) -> Result<AttemptResult, ApiError> {
        if self.submitted.load(Ordering::SeqCst) && self.result_available.load(Ordering::SeqCst) {
            Ok(self.result.clone())
        } else {
            Err(ApiError::NotFound)
        }
    }
}

// src/services/player.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    error::PlayerError,
    models::{
        attempt::{Attempt, AttemptResult},
        quiz::{AnswerValue, QuizDefinition},
        report::ScoreReport,
        session::{Position, QuestionView, SessionView},
    },
    services::{
        api::{ApiError, QuizApi},
        deadline::DeadlineStore,
        notice::NoticeBoard,
        proctor::ProctorMonitor,
        signals::IntegrityEvents,
        sync::{AnswerSynchronizer, AttemptCache, SyncOutcome},
        timer::CountdownTimer,
    },
    utils::{clock::Clock, format::format_duration},
};

/// Retries of the initial quiz fetch before the session is blocked.
const FETCH_RETRIES: usize = 1;

const SUBMITTED_NOTICE: &str = "Quiz submitted";
const ALREADY_SUBMITTED_NOTICE: &str = "Quiz already submitted";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    InProgress,
    Submitting,
    Completed,
    /// A fatal error; the session must be restarted.
    Blocked { reason: String },
}

impl Phase {
    fn name(&self) -> String {
        match self {
            Phase::Idle => "idle".into(),
            Phase::Loading => "loading".into(),
            Phase::InProgress => "in progress".into(),
            Phase::Submitting => "submitting".into(),
            Phase::Completed => "completed".into(),
            Phase::Blocked { .. } => "blocked".into(),
        }
    }
}

/// Shared collaborators handed to every player.
#[derive(Clone)]
pub struct PlayerDeps {
    pub api: Arc<dyn QuizApi>,
    pub deadlines: Arc<dyn DeadlineStore>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a navigation. `flush` is the upsert of the outgoing answer; it was
/// started before the index moved but is not awaited.
#[derive(Debug)]
pub struct Navigation {
    pub index: usize,
    pub flush: Option<JoinHandle<SyncOutcome>>,
}

#[derive(Default)]
struct Session {
    phase: Phase,
    quiz: Option<Arc<QuizDefinition>>,
    attempt_id: Option<i64>,
    current: usize,
    answers: BTreeMap<i64, AnswerValue>,
    report: Option<ScoreReport>,
    time_expired: bool,
    torn_down: bool,
}

/// Runs one timed attempt: Idle → Loading → InProgress → Submitting →
/// Completed.
pub struct AttemptPlayer {
    quiz_id: i64,
    deps: PlayerDeps,
    session: Mutex<Session>,
    attempt: AttemptCache,
    sync: AnswerSynchronizer,
    events: IntegrityEvents,
    notices: NoticeBoard,
    proctor: ProctorMonitor,
    timer: Mutex<Option<Arc<CountdownTimer>>>,
    phase_tx: watch::Sender<Phase>,
}

impl AttemptPlayer {
    pub fn new(quiz_id: i64, deps: PlayerDeps) -> Arc<Self> {
        let notices = NoticeBoard::new();
        let events = IntegrityEvents::new();
        let attempt: AttemptCache = Arc::new(Mutex::new(None));

        let proctor = ProctorMonitor::new(events.clone(), deps.clock.clone(), notices.clone());
        let (phase_tx, _) = watch::channel(Phase::Idle);

        Arc::new_cyclic(|player: &Weak<Self>| {
            let player = player.clone();
            let sync = AnswerSynchronizer::new(
                deps.api.clone(),
                attempt.clone(),
                Arc::new(move |err: &PlayerError| match player.upgrade() {
                    Some(player) if !player.is_finished() => {
                        player.notices.warn(err.to_string());
                    }
                    _ => tracing::debug!("Ignoring late sync failure: {}", err),
                }),
            );

            Self {
                quiz_id,
                deps,
                session: Mutex::new(Session::default()),
                attempt,
                sync,
                events,
                notices,
                proctor,
                timer: Mutex::new(None),
                phase_tx,
            }
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, session: &mut Session, phase: Phase) {
        tracing::info!(
            "Quiz {} session: {} -> {}",
            self.quiz_id,
            session.phase.name(),
            phase.name()
        );
        session.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    pub fn quiz_id(&self) -> i64 {
        self.quiz_id
    }

    pub fn phase(&self) -> Phase {
        self.session().phase.clone()
    }

    /// Completed, blocked or torn down. Nothing changes the session any more.
    pub fn is_finished(&self) -> bool {
        let session = self.session();
        session.torn_down || matches!(session.phase, Phase::Completed | Phase::Blocked { .. })
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Source of integrity signals for this session.
    pub fn events(&self) -> &IntegrityEvents {
        &self.events
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn proctor(&self) -> &ProctorMonitor {
        &self.proctor
    }

    pub fn current_index(&self) -> usize {
        self.session().current
    }

    pub fn attempt(&self) -> Option<Attempt> {
        self.attempt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn report(&self) -> Option<ScoreReport> {
        self.session().report.clone()
    }

    fn running_timer(&self) -> Option<Arc<CountdownTimer>> {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .filter(|t| t.is_enabled())
    }

    pub fn remaining_seconds(&self) -> Option<i64> {
        self.running_timer().map(|t| t.remaining())
    }

    /// Fetches the quiz, starts an attempt, then starts proctoring and the
    /// countdown.
    pub async fn load(self: &Arc<Self>) -> Result<(), PlayerError> {
        {
            let mut session = self.session();
            if session.phase != Phase::Idle {
                return Err(PlayerError::InvalidTransition {
                    action: "load",
                    phase: session.phase.name(),
                });
            }
            self.set_phase(&mut session, Phase::Loading);
        }

        let quiz = match self.fetch_quiz().await {
            Ok(quiz) => Arc::new(quiz),
            Err(e) => return Err(self.block(e)),
        };

        let started = match self.deps.api.start_attempt(self.quiz_id).await {
            Ok(started) if started.id > 0 => started,
            Ok(_) => {
                return Err(self.block(PlayerError::AttemptStartFailure(
                    "no attempt id in response".to_string(),
                )));
            }
            Err(e) => return Err(self.block(PlayerError::AttemptStartFailure(e.to_string()))),
        };

        {
            let mut session = self.session();
            if session.torn_down {
                return Ok(());
            }
            session.quiz = Some(quiz.clone());
            session.attempt_id = Some(started.id);
            session.current = 0;
            session.answers = quiz
                .questions
                .iter()
                .map(|q| (q.id, AnswerValue::default()))
                .collect();

            let question_ids = quiz.questions.iter().map(|q| q.id).collect();
            *self.attempt.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(Attempt::new(&started, question_ids));

            tracing::info!("Attempt {} started for quiz {}", started.id, self.quiz_id);
            self.set_phase(&mut session, Phase::InProgress);
        }

        self.proctor.enable();
        self.start_timer(&quiz).await;
        Ok(())
    }

    async fn fetch_quiz(&self) -> Result<QuizDefinition, PlayerError> {
        let mut retries = 0;
        loop {
            match self.deps.api.fetch_quiz(self.quiz_id).await {
                Ok(quiz) => return Ok(quiz.sorted()),
                Err(ApiError::NotFound) => {
                    return Err(PlayerError::FetchFailure(format!(
                        "quiz {} not found",
                        self.quiz_id
                    )));
                }
                Err(e) if retries < FETCH_RETRIES => {
                    retries += 1;
                    tracing::warn!("Fetching quiz {} failed, retrying: {}", self.quiz_id, e);
                }
                Err(e) => return Err(PlayerError::FetchFailure(e.to_string())),
            }
        }
    }

    async fn start_timer(self: &Arc<Self>, quiz: &QuizDefinition) {
        let Some(limit) = quiz.time_limit_seconds else {
            return;
        };

        let timer = CountdownTimer::new(
            quiz.id,
            limit,
            self.deps.deadlines.clone(),
            self.deps.clock.clone(),
        );
        let player = Arc::downgrade(self);
        timer.set_on_time_up(Arc::new(move || {
            let player = player.clone();
            tokio::spawn(async move {
                if let Some(player) = player.upgrade() {
                    if let Err(e) = player.submit_on_timeout().await {
                        tracing::warn!("Automatic submission failed: {}", e);
                    }
                }
            });
        }));

        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(timer.clone());

        if let Err(e) = timer.activate().await {
            tracing::error!("Countdown for quiz {} unavailable: {}", quiz.id, e);
            self.notices.warn(e.to_string());
        }

        if self.session().torn_down {
            timer.stop();
        }
    }

    fn block(&self, err: PlayerError) -> PlayerError {
        tracing::error!("Quiz {} session blocked: {}", self.quiz_id, err);
        let mut session = self.session();
        if !session.torn_down {
            self.set_phase(
                &mut session,
                Phase::Blocked {
                    reason: err.to_string(),
                },
            );
        }
        err
    }

    fn require_in_progress(session: &Session, action: &'static str) -> Result<(), PlayerError> {
        if session.phase != Phase::InProgress || session.torn_down {
            return Err(PlayerError::InvalidTransition {
                action,
                phase: session.phase.name(),
            });
        }
        Ok(())
    }

    /// Stores the learner's answer for the current question after checking it
    /// against the question type.
    pub fn set_answer(&self, value: AnswerValue) -> Result<(), PlayerError> {
        let mut session = self.session();
        Self::require_in_progress(&session, "answering")?;

        let quiz = session
            .quiz
            .clone()
            .ok_or(PlayerError::NoSuchQuestion(session.current))?;
        let question = quiz
            .questions
            .get(session.current)
            .ok_or(PlayerError::NoSuchQuestion(session.current))?;

        let value = question.kind.normalize(value)?;
        session.answers.insert(question.id, value);
        Ok(())
    }

    /// Starts the upsert of the current answer, if there is one. The caller
    /// may move on without awaiting the handle; the upsert has been attempted
    /// either way.
    pub fn flush_current_answer(&self) -> Option<JoinHandle<SyncOutcome>> {
        let session = self.session();
        self.flush_locked(&session)
    }

    fn flush_locked(&self, session: &Session) -> Option<JoinHandle<SyncOutcome>> {
        let question = session.quiz.as_ref()?.questions.get(session.current)?;
        let value = session.answers.get(&question.id)?.clone();
        if value.is_empty() {
            return None;
        }

        let sync = self.sync.clone();
        let attempt_id = session.attempt_id;
        let question_id = question.id;
        Some(tokio::spawn(async move {
            sync.upsert(attempt_id, question_id, &value).await
        }))
    }

    /// Moves to `index`, flushing the outgoing answer first.
    pub fn go_to(&self, index: usize) -> Result<Navigation, PlayerError> {
        let mut session = self.session();
        Self::require_in_progress(&session, "navigation")?;

        let total = session.quiz.as_ref().map_or(0, |q| q.questions.len());
        if index >= total {
            return Err(PlayerError::NoSuchQuestion(index));
        }

        let flush = self.flush_locked(&session);
        session.current = index;
        Ok(Navigation { index, flush })
    }

    pub fn next(&self) -> Result<Navigation, PlayerError> {
        let target = self.session().current + 1;
        self.go_to(target)
    }

    pub fn previous(&self) -> Result<Navigation, PlayerError> {
        let current = self.session().current;
        let target = current
            .checked_sub(1)
            .ok_or(PlayerError::NoSuchQuestion(current))?;
        self.go_to(target)
    }

    /// Learner submission. Allowed from the last question, or from anywhere
    /// once time has run out and an automatic submission needs a retry.
    pub async fn submit(&self) -> Result<ScoreReport, PlayerError> {
        {
            let session = self.session();
            if session.phase == Phase::InProgress && !session.time_expired {
                let last = session
                    .quiz
                    .as_ref()
                    .map_or(0, |q| q.questions.len().saturating_sub(1));
                if session.current != last {
                    return Err(PlayerError::InvalidTransition {
                        action: "submit",
                        phase: "not on the last question".to_string(),
                    });
                }
            }
        }
        self.finalize("learner").await
    }

    /// Submission triggered by the countdown, from whichever question is open.
    pub async fn submit_on_timeout(&self) -> Result<ScoreReport, PlayerError> {
        self.session().time_expired = true;
        self.finalize("timeout").await
    }

    async fn finalize(&self, trigger: &'static str) -> Result<ScoreReport, PlayerError> {
        let attempt_id = {
            let mut session = self.session();
            // Submitting twice never reaches the server.
            if session.phase == Phase::Completed && !session.torn_down {
                if let Some(report) = session.report.clone() {
                    return Ok(report);
                }
            }
            Self::require_in_progress(&session, "submit")?;

            let attempt_id = session.attempt_id.ok_or(PlayerError::InvalidTransition {
                action: "submit",
                phase: "no attempt".to_string(),
            })?;

            // Not awaited: the submission does not wait for the upsert.
            let _flush = self.flush_locked(&session);
            tracing::info!("Submitting attempt {} ({})", attempt_id, trigger);
            self.set_phase(&mut session, Phase::Submitting);
            attempt_id
        };

        match self.deps.api.submit_attempt(attempt_id).await {
            Ok(result) => {
                let report = self.complete(attempt_id, result).await?;
                self.notices.warn(SUBMITTED_NOTICE);
                Ok(report)
            }
            Err(ApiError::AlreadySubmitted) => {
                tracing::warn!("Attempt {} was already submitted", attempt_id);
                let result = self.deps.api.fetch_result(attempt_id).await;
                self.notices.warn(ALREADY_SUBMITTED_NOTICE);
                match result {
                    Ok(result) => self.complete(attempt_id, result).await,
                    Err(e) => {
                        tracing::warn!("Prior result of attempt {} unavailable: {}", attempt_id, e);
                        Err(self.block(PlayerError::AlreadySubmitted { attempt_id }))
                    }
                }
            }
            Err(e) => {
                let err = PlayerError::SubmissionNetwork(e.to_string());
                tracing::warn!("Attempt {}: {}", attempt_id, err);
                {
                    let mut session = self.session();
                    if !session.torn_down && session.phase == Phase::Submitting {
                        self.set_phase(&mut session, Phase::InProgress);
                    }
                }
                self.notices.warn(err.to_string());
                Err(err)
            }
        }
    }

    async fn complete(
        &self,
        attempt_id: i64,
        result: AttemptResult,
    ) -> Result<ScoreReport, PlayerError> {
        let report = {
            let mut session = self.session();
            if session.torn_down {
                tracing::debug!("Dropping late result for attempt {}", attempt_id);
                return Err(PlayerError::InvalidTransition {
                    action: "complete",
                    phase: "torn down".to_string(),
                });
            }
            if let Some(report) = session.report.clone() {
                return Ok(report);
            }
            let quiz = session.quiz.clone().ok_or(PlayerError::InvalidTransition {
                action: "complete",
                phase: session.phase.name(),
            })?;

            let score = result.score;
            let report = ScoreReport::new(attempt_id, &quiz, result, self.proctor.snapshot());
            if let Some(attempt) = self
                .attempt
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_mut()
            {
                attempt.finalize(score, self.deps.clock.now());
            }
            session.report = Some(report.clone());
            self.set_phase(&mut session, Phase::Completed);
            report
        };

        self.proctor.disable();
        let timer = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(timer) = timer {
            timer.stop();
            if let Err(e) = timer.clear_deadline().await {
                tracing::warn!("Failed to clear deadline for quiz {}: {}", self.quiz_id, e);
            }
        }

        tracing::info!("Attempt {} completed: {}", attempt_id, report.headline());
        Ok(report)
    }

    /// Stops the countdown and proctoring. Responses arriving afterwards are
    /// ignored. The persisted deadline stays so a new session resumes it.
    pub fn teardown(&self) {
        self.session().torn_down = true;
        self.proctor.disable();
        if let Some(timer) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            timer.stop();
        }
        tracing::info!("Quiz {} session torn down", self.quiz_id);
    }

    pub fn view(&self) -> SessionView {
        let session = self.session();
        let quiz = session.quiz.as_deref();
        let in_progress = session.report.is_none();

        let question = quiz
            .filter(|_| in_progress)
            .and_then(|q| q.questions.get(session.current));

        let timer = self.running_timer();

        SessionView {
            quiz_id: self.quiz_id,
            phase: session.phase.clone(),
            title: quiz.map(|q| q.title.clone()),
            time_limit: format_duration(quiz.and_then(|q| q.time_limit_seconds)),
            position: quiz.filter(|_| in_progress).map(|q| Position {
                current: session.current + 1,
                total: q.questions.len(),
            }),
            question: question.map(QuestionView::from),
            answer: question.and_then(|q| session.answers.get(&q.id).cloned()),
            remaining_seconds: timer.as_ref().map(|t| t.remaining()),
            remaining_label: timer.as_ref().map(|t| t.remaining_label()),
            notices: self.notices.pending(),
            violations: self.proctor.counts(),
            report: session.report.clone(),
        }
    }
}

impl Drop for AttemptPlayer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            timer.stop();
        }
    }
}

// src/services/timer.rs

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    error::PlayerError,
    services::deadline::DeadlineStore,
    utils::{clock::Clock, format::format_clock},
};

pub type TimeUpCallback = Arc<dyn Fn() + Send + Sync>;

/// Whole seconds left until `deadline_ms`, never negative.
pub fn remaining_seconds(now_ms: i64, deadline_ms: i64) -> i64 {
    deadline_ms.saturating_sub(now_ms).div_euclid(1000).max(0)
}

/// Countdown towards a per-quiz deadline that survives restarts.
///
/// The deadline is computed once (`now + duration`) and persisted in the
/// [`DeadlineStore`]; every later activation reuses the stored value and the
/// requested duration is ignored. Remaining time is always derived from the
/// wall clock, so a suspended process does not drift.
pub struct CountdownTimer {
    quiz_id: i64,
    duration_secs: i64,
    store: Arc<dyn DeadlineStore>,
    clock: Arc<dyn Clock>,
    deadline: Mutex<Option<i64>>,
    remaining: AtomicI64,
    fired: AtomicBool,
    stopped: AtomicBool,
    on_time_up: Mutex<Option<TimeUpCallback>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl CountdownTimer {
    pub fn new(
        quiz_id: i64,
        duration_secs: i64,
        store: Arc<dyn DeadlineStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            quiz_id,
            duration_secs,
            store,
            clock,
            deadline: Mutex::new(None),
            remaining: AtomicI64::new(duration_secs.max(0)),
            fired: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            on_time_up: Mutex::new(None),
            ticker: Mutex::new(None),
        })
    }

    /// A non-positive duration disables the timer entirely.
    pub fn is_enabled(&self) -> bool {
        self.duration_secs > 0
    }

    /// Replaces the time-up callback. The most recent one is always used.
    pub fn set_on_time_up(&self, callback: TimeUpCallback) {
        *self.on_time_up.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn remaining_label(&self) -> String {
        format_clock(self.remaining())
    }

    pub fn deadline(&self) -> Option<i64> {
        *self.deadline.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Loads the persisted deadline, or computes and persists a new one.
    async fn resolve_deadline(&self) -> Result<Option<i64>, PlayerError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        if let Some(deadline) = self.deadline() {
            return Ok(Some(deadline));
        }

        let deadline = match self.store.get(self.quiz_id).await? {
            Some(stored) => stored,
            None => {
                let computed = self
                    .clock
                    .now_millis()
                    .saturating_add(self.duration_secs.saturating_mul(1000));
                let stored = self.store.set_if_absent(self.quiz_id, computed).await?;
                if stored != computed {
                    // Another session got there first; its deadline stands.
                    let conflict = PlayerError::TimerConflict {
                        quiz_id: self.quiz_id,
                        stored,
                        computed,
                    };
                    tracing::warn!("{}", conflict);
                }
                stored
            }
        };

        let deadline = *self
            .deadline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_or_insert(deadline);
        self.remaining.store(
            remaining_seconds(self.clock.now_millis(), deadline),
            Ordering::SeqCst,
        );
        Ok(Some(deadline))
    }

    /// Resolves the deadline and starts the one-second ticker.
    ///
    /// Repeated activation is harmless: the deadline is resolved once and only
    /// one ticker ever runs. Returns the remaining seconds.
    pub async fn activate(self: &Arc<Self>) -> Result<i64, PlayerError> {
        if !self.is_enabled() || self.stopped.load(Ordering::SeqCst) {
            return Ok(self.remaining());
        }

        let Some(deadline) = self.resolve_deadline().await? else {
            return Ok(0);
        };

        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.is_none() {
            tracing::info!(
                "Timer for quiz {} running, deadline {} ({}s left)",
                self.quiz_id,
                deadline,
                self.remaining()
            );
            let weak = Arc::downgrade(self);
            *ticker = Some(tokio::spawn(run_ticker(weak)));
        }

        Ok(self.remaining())
    }

    /// Recomputes the remaining time from the wall clock. Fires the time-up
    /// callback the first time it reaches zero, then clears the stored
    /// deadline.
    pub async fn tick(&self) -> i64 {
        let Some(deadline) = self.deadline() else {
            return self.remaining();
        };
        if self.stopped.load(Ordering::SeqCst) {
            return self.remaining();
        }

        let remaining = remaining_seconds(self.clock.now_millis(), deadline);
        self.remaining.store(remaining, Ordering::SeqCst);

        if remaining == 0 && !self.fired.swap(true, Ordering::SeqCst) {
            let callback = self
                .on_time_up
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();

            if !self.stopped.load(Ordering::SeqCst) {
                tracing::info!("Time is up for quiz {}", self.quiz_id);
                if let Some(callback) = callback {
                    callback();
                }
            }

            if let Err(e) = self.store.clear(self.quiz_id).await {
                tracing::warn!("Failed to clear deadline for quiz {}: {}", self.quiz_id, e);
            }
        }

        remaining
    }

    /// Stops ticking. No callback fires after this returns.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }

    /// Removes the persisted deadline for this quiz.
    pub async fn clear_deadline(&self) -> Result<(), PlayerError> {
        if self.is_enabled() {
            self.store.clear(self.quiz_id).await?;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.has_fired()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if let Some(handle) = self
            .ticker
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

async fn run_ticker(timer: Weak<CountdownTimer>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let Some(timer) = timer.upgrade() else {
            break;
        };
        timer.tick().await;
        if timer.is_finished() {
            break;
        }
    }
}

// src/services/proctor.rs

use std::sync::{Arc, Mutex};

use crate::{
    models::violation::{ViolationCounts, ViolationEntry, ViolationLog},
    services::{
        notice::NoticeBoard,
        signals::{IntegrityEvents, Signal, SignalResponse, Subscription},
    },
    utils::clock::Clock,
};

#[derive(Default)]
struct LogState {
    log: ViolationLog,
    last_millis: i64,
}

struct Recorder {
    clock: Arc<dyn Clock>,
    notices: NoticeBoard,
    state: Mutex<LogState>,
}

impl Recorder {
    fn record(&self, signal: Signal) -> SignalResponse {
        let kind = signal.violation();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            // Keep the log non-decreasing even if the clock steps back.
            let millis = self.clock.now_millis().max(state.last_millis);
            state.last_millis = millis;
            let at = chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default();
            state.log.push(kind, ViolationEntry::at(at));
        }

        tracing::warn!("Integrity violation recorded: {:?}", kind);
        self.notices.warn(kind.warning());

        SignalResponse {
            recorded: true,
            confirm_leave: signal == Signal::BeforeUnload,
        }
    }
}

/// Records integrity violations while enabled.
///
/// Enabling subscribes one listener per signal; disabling (or dropping the
/// monitor) drops the subscriptions, which removes the listeners. The log is
/// kept in memory only and is surfaced through the score report.
pub struct ProctorMonitor {
    events: IntegrityEvents,
    recorder: Arc<Recorder>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ProctorMonitor {
    pub fn new(events: IntegrityEvents, clock: Arc<dyn Clock>, notices: NoticeBoard) -> Self {
        Self {
            events,
            recorder: Arc::new(Recorder {
                clock,
                notices,
                state: Mutex::new(LogState::default()),
            }),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Does nothing when already enabled.
    pub fn enable(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
        if !subscriptions.is_empty() {
            return;
        }
        for signal in Signal::ALL {
            let recorder = self.recorder.clone();
            subscriptions.push(
                self.events
                    .subscribe(signal, Arc::new(move |s: Signal| recorder.record(s))),
            );
        }
        tracing::debug!("Proctoring enabled");
    }

    pub fn disable(&self) {
        let removed: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        if !removed.is_empty() {
            tracing::debug!("Proctoring disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn snapshot(&self) -> ViolationLog {
        self.recorder
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log
            .clone()
    }

    pub fn counts(&self) -> ViolationCounts {
        self.recorder
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log
            .counts()
    }
}

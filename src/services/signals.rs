// src/services/signals.rs

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::models::violation::ViolationKind;

/// Integrity signals as raised by the learner's browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Copy,
    Paste,
    /// Window lost focus.
    Blur,
    /// The page is about to be left or reloaded.
    BeforeUnload,
}

impl Signal {
    pub const ALL: [Signal; 4] = [Signal::Copy, Signal::Paste, Signal::Blur, Signal::BeforeUnload];

    pub fn violation(&self) -> ViolationKind {
        match self {
            Signal::Copy => ViolationKind::Copy,
            Signal::Paste => ViolationKind::Paste,
            Signal::Blur => ViolationKind::TabSwitch,
            Signal::BeforeUnload => ViolationKind::ExitAttempt,
        }
    }
}

/// What listeners asked the browser to do in response to a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalResponse {
    pub recorded: bool,
    /// Best-effort "leave this page?" prompt. Browsers may ignore it.
    pub confirm_leave: bool,
}

pub type SignalHandler = Arc<dyn Fn(Signal) -> SignalResponse + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Signal, SignalHandler)>,
}

/// Per-session signal source. Listeners stay registered for as long as the
/// returned [`Subscription`] lives.
#[derive(Clone, Default)]
pub struct IntegrityEvents {
    listeners: Arc<Mutex<Listeners>>,
}

impl IntegrityEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, signal: Signal, handler: SignalHandler) -> Subscription {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, signal, handler));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers a signal to every matching listener.
    pub fn emit(&self, signal: Signal) -> SignalResponse {
        let handlers: Vec<SignalHandler> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .filter(|(_, s, _)| *s == signal)
            .map(|(_, _, h)| h.clone())
            .collect();

        handlers
            .iter()
            .map(|handler| handler(signal))
            .fold(SignalResponse::default(), |acc, r| SignalResponse {
                recorded: acc.recorded || r.recorded,
                confirm_leave: acc.confirm_leave || r.confirm_leave,
            })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }
}

/// Deregisters its listener when dropped.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entries
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

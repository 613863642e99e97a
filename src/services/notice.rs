// src/services/notice.rs

use std::sync::{Arc, Mutex};

use serde::Serialize;

/// A dismissible, non-blocking warning shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

#[derive(Debug, Default)]
struct Notices {
    next_id: u64,
    items: Vec<Notice>,
}

/// Shared list of pending warnings for one session.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    inner: Arc<Mutex<Notices>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, message: impl Into<String>) -> u64 {
        let mut notices = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        notices.next_id += 1;
        let id = notices.next_id;
        notices.items.push(Notice {
            id,
            message: message.into(),
        });
        id
    }

    /// Returns false when no notice with this id is pending.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut notices = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = notices.items.len();
        notices.items.retain(|n| n.id != id);
        notices.items.len() != before
    }

    pub fn pending(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .items
            .clone()
    }
}

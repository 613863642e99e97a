// src/models/violation.rs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Integrity signal categories tracked during a proctored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    Copy,
    Paste,
    /// Loss of window focus.
    TabSwitch,
    /// An attempt to navigate away from the player.
    ExitAttempt,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 4] = [
        ViolationKind::Copy,
        ViolationKind::Paste,
        ViolationKind::TabSwitch,
        ViolationKind::ExitAttempt,
    ];

    pub fn warning(&self) -> &'static str {
        match self {
            ViolationKind::Copy => "Copy action detected!",
            ViolationKind::Paste => "Paste action detected!",
            ViolationKind::TabSwitch => "Tab switch detected!",
            ViolationKind::ExitAttempt => "Exit attempt detected!",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::Copy => "Copy",
            ViolationKind::Paste => "Paste",
            ViolationKind::TabSwitch => "Tab switch",
            ViolationKind::ExitAttempt => "Exit attempt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEntry {
    /// ISO-8601, UTC, millisecond precision.
    pub timestamp: String,
}

impl ViolationEntry {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            timestamp: time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Append-only, per-category violation log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationLog {
    pub copy: Vec<ViolationEntry>,
    pub paste: Vec<ViolationEntry>,
    pub tab_switch: Vec<ViolationEntry>,
    pub exit_attempt: Vec<ViolationEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCounts {
    pub copy: usize,
    pub paste: usize,
    pub tab_switch: usize,
    pub exit_attempt: usize,
}

impl ViolationLog {
    pub fn entries(&self, kind: ViolationKind) -> &[ViolationEntry] {
        match kind {
            ViolationKind::Copy => &self.copy,
            ViolationKind::Paste => &self.paste,
            ViolationKind::TabSwitch => &self.tab_switch,
            ViolationKind::ExitAttempt => &self.exit_attempt,
        }
    }

    pub(crate) fn push(&mut self, kind: ViolationKind, entry: ViolationEntry) {
        let list = match kind {
            ViolationKind::Copy => &mut self.copy,
            ViolationKind::Paste => &mut self.paste,
            ViolationKind::TabSwitch => &mut self.tab_switch,
            ViolationKind::ExitAttempt => &mut self.exit_attempt,
        };
        list.push(entry);
    }

    pub fn counts(&self) -> ViolationCounts {
        ViolationCounts {
            copy: self.copy.len(),
            paste: self.paste.len(),
            tab_switch: self.tab_switch.len(),
            exit_attempt: self.exit_attempt.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ViolationKind::ALL.iter().all(|k| self.entries(*k).is_empty())
    }
}

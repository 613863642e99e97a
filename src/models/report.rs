// src/models/report.rs

use serde::Serialize;

use super::{
    attempt::{AttemptResult, QuestionOutcome},
    quiz::QuizDefinition,
    violation::{ViolationCounts, ViolationKind, ViolationLog},
};

/// Final score report shown once an attempt is completed.
///
/// Built once from the submission result and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub attempt_id: i64,
    pub score: f64,
    /// Only auto-gradable questions (mcq, short) count towards the ratio.
    pub total: usize,
    pub details: Vec<QuestionOutcome>,
    pub violation_counts: ViolationCounts,
    pub violations: ViolationLog,
}

impl ScoreReport {
    pub fn new(
        attempt_id: i64,
        quiz: &QuizDefinition,
        result: AttemptResult,
        violations: ViolationLog,
    ) -> Self {
        Self {
            attempt_id,
            score: result.score,
            total: quiz.auto_gradable_count(),
            details: result.details,
            violation_counts: violations.counts(),
            violations,
        }
    }

    /// "2 / 3" style headline.
    pub fn headline(&self) -> String {
        if self.score.fract() == 0.0 {
            format!("{} / {}", self.score as i64, self.total)
        } else {
            format!("{:.1} / {}", self.score, self.total)
        }
    }

    /// One line per recorded violation, e.g. `Copy detected: 1 (10:15:02)`.
    pub fn violation_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in ViolationKind::ALL {
            for (idx, entry) in self.violations.entries(kind).iter().enumerate() {
                let time = entry
                    .time()
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| entry.timestamp.clone());
                lines.push(format!("{} detected: {} ({})", kind.label(), idx + 1, time));
            }
        }
        lines
    }
}

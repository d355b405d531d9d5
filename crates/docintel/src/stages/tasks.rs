use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TaskPattern;
use crate::error::StageError;

use super::{Stage, StageOutcome};

/// Upper bound on tasks reported per document.
pub const MAX_TASKS: usize = 5;

/// Characters of context kept on each side of a match.
const CONTEXT_RADIUS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

struct CompiledPattern {
    re: Regex,
    title: String,
    kind: String,
}

/// Deadline-phrase scanner. Matches are reported pattern by pattern in
/// match order, capped at [`MAX_TASKS`].
pub struct TaskExtractor {
    patterns: Vec<CompiledPattern>,
    invalid: Option<StageError>,
}

impl TaskExtractor {
    pub fn new(patterns: &[TaskPattern]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        let mut invalid = None;

        for (index, pattern) in patterns.iter().enumerate() {
            match Regex::new(&pattern.pattern) {
                Ok(re) => compiled.push(CompiledPattern {
                    re,
                    title: pattern.title.clone(),
                    kind: pattern.kind.clone(),
                }),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Invalid task pattern");
                    invalid.get_or_insert(StageError::InvalidPattern {
                        name: format!("task_patterns[{}]", index),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Self {
            patterns: compiled,
            invalid,
        }
    }

    pub fn extract(&self, text: &str) -> StageOutcome<Vec<Task>> {
        if let Some(err) = &self.invalid {
            return StageOutcome::degraded(Vec::new(), Stage::TaskExtraction, err.to_string());
        }

        let tasks = self
            .patterns
            .iter()
            .flat_map(|pattern| {
                pattern.re.captures_iter(text).map(move |caps| {
                    // Group 0 always exists for a successful match.
                    let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                    Task {
                        title: pattern.title.clone(),
                        description: context_window(text, whole.0, whole.1, CONTEXT_RADIUS)
                            .trim()
                            .to_string(),
                        due_date: caps.get(1).map(|m| m.as_str().to_string()),
                        kind: pattern.kind.clone(),
                    }
                })
            })
            .take(MAX_TASKS)
            .collect();

        StageOutcome::ok(tasks)
    }
}

/// Slice of `text` spanning `radius` characters before `start` and after
/// `end` (byte offsets on char boundaries).
fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = if radius == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

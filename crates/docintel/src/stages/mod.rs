//! The extraction stages run after text extraction.
//!
//! Each stage returns a [`StageOutcome`]: the value the pipeline continues
//! with, plus the [`Fallback`] taken when the stage could not do its normal
//! work. Fallbacks never abort a job; they are collected into the record's
//! processing metadata.

pub mod department;
pub mod language;
pub mod metadata;
pub mod summary;
pub mod tasks;

use serde::{Deserialize, Serialize};

pub use department::{DepartmentClassifier, Department};
pub use language::{resolve_language, Language, LanguageDetector, WhatlangDetector};
pub use metadata::MetadataExtractor;
pub use summary::{
    summarize, ExtractiveSummarizer, HttpSummarizer, Summarizer, SummaryBounds,
    SUMMARY_FAILED_MARKER,
};
pub use tasks::{Task, TaskExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LanguageDetection,
    Summarization,
    MetadataExtraction,
    DepartmentClassification,
    TaskExtraction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageDetection => "language_detection",
            Self::Summarization => "summarization",
            Self::MetadataExtraction => "metadata_extraction",
            Self::DepartmentClassification => "department_classification",
            Self::TaskExtraction => "task_extraction",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage substituted its fallback value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallback {
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: T,
    pub fallback: Option<Fallback>,
}

impl<T> StageOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            fallback: None,
        }
    }

    pub fn degraded(value: T, stage: Stage, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(stage = %stage, reason = %reason, "Stage fell back");
        Self {
            value,
            fallback: Some(Fallback { stage, reason }),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }

    /// Splits the outcome, appending any fallback to `fallbacks`.
    pub fn record(self, fallbacks: &mut Vec<Fallback>) -> T {
        if let Some(fallback) = self.fallback {
            fallbacks.push(fallback);
        }
        self.value
    }
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StageError;

use super::{Stage, StageOutcome};

/// Language used when detection fails.
pub const DEFAULT_LANGUAGE: Language = Language::English;

/// Minimum number of non-blank characters needed for a detection attempt.
const MIN_DETECTION_CHARS: usize = 20;

/// Version of the `whatlang` models this detector was built against.
const WHATLANG_VERSION: &str = "whatlang-0.16";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Malayalam,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Malayalam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Malayalam => "malayalam",
        }
    }

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Malayalam => "ml",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language '{0}' (expected english or malayalam)")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(Self::English),
            "ml" | "mal" | "malayalam" => Ok(Self::Malayalam),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<Language, StageError>;

    /// Identifier reported in the record's processing metadata.
    fn version(&self) -> &str;
}

/// Statistical detector backed by `whatlang`. Malayalam is recognised as
/// such; every other detected language is treated as English.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<Language, StageError> {
        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        if visible < MIN_DETECTION_CHARS {
            return Err(StageError::Detection(format!(
                "text too short for detection ({} characters, need {})",
                visible, MIN_DETECTION_CHARS
            )));
        }

        let info = whatlang::detect(text).ok_or_else(|| {
            StageError::Detection("no language could be identified".to_string())
        })?;
        tracing::trace!(
            lang = info.lang().code(),
            confidence = info.confidence(),
            "Language detected"
        );

        match info.lang() {
            whatlang::Lang::Mal => Ok(Language::Malayalam),
            _ => Ok(Language::English),
        }
    }

    fn version(&self) -> &str {
        WHATLANG_VERSION
    }
}

/// Uses the declared language when present, otherwise runs detection.
/// Detection failures resolve to [`DEFAULT_LANGUAGE`].
pub fn resolve_language(
    declared: Option<Language>,
    text: &str,
    detector: &dyn LanguageDetector,
) -> StageOutcome<Language> {
    if let Some(language) = declared {
        return StageOutcome::ok(language);
    }

    match detector.detect(text) {
        Ok(language) => StageOutcome::ok(language),
        Err(e) => StageOutcome::degraded(DEFAULT_LANGUAGE, Stage::LanguageDetection, e.to_string()),
    }
}

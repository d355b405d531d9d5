use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stages::{Department, Fallback, Language, Task};

/// Structured output of a completed job. Field names follow the JSON the
/// document backend consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(rename = "ocr_text")]
    pub raw_text: String,
    pub language: Language,
    /// Summary in the resolved language.
    pub summary_text: String,
    #[serde(rename = "summary_bilingual")]
    pub summary: BTreeMap<Language, String>,
    pub metadata: BTreeMap<String, String>,
    #[serde(rename = "department_suggested")]
    pub department: Department,
    pub tasks: Vec<Task>,
    pub processing_metadata: ProcessingMetadata,
}

/// Diagnostics only; nothing downstream branches on these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub model_versions: BTreeMap<String, String>,
    /// Fixed per-stage estimates, not measurements.
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub fallbacks: Vec<Fallback>,
}

pub const OCR_CONFIDENCE: f64 = 0.95;
pub const LANGUAGE_DETECTION_CONFIDENCE: f64 = 0.9;
pub const DEPARTMENT_CLASSIFICATION_CONFIDENCE: f64 = 0.85;

impl ProcessingMetadata {
    pub fn new(
        ocr_version: &str,
        summarizer_model: &str,
        language_detector: &str,
        fallbacks: Vec<Fallback>,
    ) -> Self {
        let model_versions = [
            ("ocr", ocr_version),
            ("summarizer", summarizer_model),
            ("language_detector", language_detector),
        ]
        .into_iter()
        .map(|(stage, version)| (stage.to_string(), version.to_string()))
        .collect();

        let confidence_scores = [
            ("ocr", OCR_CONFIDENCE),
            ("language_detection", LANGUAGE_DETECTION_CONFIDENCE),
            ("department_classification", DEPARTMENT_CLASSIFICATION_CONFIDENCE),
        ]
        .into_iter()
        .map(|(stage, score)| (stage.to_string(), score))
        .collect();

        Self {
            model_versions,
            confidence_scores,
            fallbacks,
        }
    }
}

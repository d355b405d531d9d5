#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use docintel::error::StageError;
use docintel::pipeline::{ProgressEvent, ProgressReporter};
use docintel::stages::Summarizer;
use docintel::Language;

/// Summarizer whose backend is always down.
pub struct UnavailableSummarizer;

#[async_trait]
impl Summarizer for UnavailableSummarizer {
    async fn summarize(&self, _text: &str, _language: Language) -> Result<String, StageError> {
        Err(StageError::Summarization("503 Service Unavailable".to_string()))
    }

    fn model(&self) -> &str {
        "unavailable"
    }
}

/// Summarizer that panics, standing in for a crashing model runtime.
pub struct PanickingSummarizer;

#[async_trait]
impl Summarizer for PanickingSummarizer {
    async fn summarize(&self, _text: &str, _language: Language) -> Result<String, StageError> {
        panic!("model runtime crashed");
    }

    fn model(&self) -> &str {
        "panicking"
    }
}

/// Records terminal events per job id.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, ProgressEvent)>>,
}

impl RecordingProgress {
    pub fn terminal_events(&self) -> Vec<(String, ProgressEvent)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| !matches!(e, ProgressEvent::Phase { .. }))
            .cloned()
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, job_id: &str, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap()
            .push((job_id.to_string(), event.clone()));
    }
}

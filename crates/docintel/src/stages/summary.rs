//! Summarization stage.
//!
//! The document text is cut to [`MAX_INPUT_CHARS`] before it reaches the
//! model, so long documents are summarized from their opening only. The
//! same summary is stored under every [`Language`] key; there is no
//! translation step.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::StageError;

use super::{Language, Stage, StageOutcome};

/// Character budget of the text handed to the summarizer.
pub const MAX_INPUT_CHARS: usize = 1024;

/// Stored under every language key when summarization fails.
pub const SUMMARY_FAILED_MARKER: &str = "Summary generation failed";

/// Requested length band of the summary, in model tokens (words for the
/// extractive summarizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBounds {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for SummaryBounds {
    fn default() -> Self {
        Self {
            min_length: 50,
            max_length: 150,
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, language: Language) -> Result<String, StageError>;

    /// Model identifier reported in the record's processing metadata.
    fn model(&self) -> &str;
}

/// Runs the summarizer and spreads its output over every language key.
pub async fn summarize(
    summarizer: &dyn Summarizer,
    text: &str,
    language: Language,
) -> StageOutcome<BTreeMap<Language, String>> {
    let input = truncate_chars(text, MAX_INPUT_CHARS);

    match summarizer.summarize(input, language).await {
        Ok(summary) if !summary.trim().is_empty() => {
            StageOutcome::ok(for_all_languages(summary.trim()))
        }
        Ok(_) => StageOutcome::degraded(
            for_all_languages(SUMMARY_FAILED_MARKER),
            Stage::Summarization,
            "summarizer returned an empty summary",
        ),
        Err(e) => StageOutcome::degraded(
            for_all_languages(SUMMARY_FAILED_MARKER),
            Stage::Summarization,
            e.to_string(),
        ),
    }
}

fn for_all_languages(summary: &str) -> BTreeMap<Language, String> {
    Language::ALL
        .iter()
        .map(|language| (*language, summary.to_string()))
        .collect()
}

/// Returns the prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Client for a hosted sequence-to-sequence summarization endpoint.
///
/// Sends `{"inputs", "parameters": {min_length, max_length, do_sample}}` and
/// accepts either `[{"summary_text": ..}]` or `{"summary_text": ..}` back.
pub struct HttpSummarizer {
    http: Client,
    url: String,
    token: Option<SecretString>,
    model: String,
    bounds: SummaryBounds,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryResponse {
    Batch(Vec<SummaryText>),
    Single(SummaryText),
}

#[derive(Debug, Deserialize)]
struct SummaryText {
    summary_text: String,
}

impl HttpSummarizer {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent("docintel/summarizer")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            token,
            model: model.into(),
            bounds: SummaryBounds::default(),
        })
    }

    pub fn with_bounds(mut self, bounds: SummaryBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str, language: Language) -> Result<String, StageError> {
        let payload = json!({
            "inputs": text,
            "parameters": {
                "min_length": self.bounds.min_length,
                "max_length": self.bounds.max_length,
                "do_sample": false,
            }
        });

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        tracing::debug!(language = %language, chars = text.chars().count(), "Requesting summary");

        let response = request.send().await.map_err(|e| {
            StageError::Summarization(format!("failed to reach summarizer: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Summarization(format!(
                "summarizer returned {}: {}",
                status, body
            )));
        }

        let body: SummaryResponse = response.json().await.map_err(|e| {
            StageError::Summarization(format!("malformed summarizer response: {}", e))
        })?;

        let summary = match body {
            SummaryResponse::Batch(items) => items.into_iter().next().map(|s| s.summary_text),
            SummaryResponse::Single(item) => Some(item.summary_text),
        };

        summary
            .map(|s| s.trim().to_string())
            .ok_or_else(|| StageError::Summarization("summarizer returned no summary".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Picks leading sentences until the word budget is spent. Used when no
/// summarization endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveSummarizer {
    bounds: SummaryBounds,
}

impl ExtractiveSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&self, text: &str) -> String {
        let mut picked: Vec<&str> = Vec::new();
        let mut used_words = 0usize;

        for sentence in sentences(text) {
            let words = sentence.split_whitespace().count();
            if !picked.is_empty() && used_words + words > self.bounds.max_length {
                break;
            }
            picked.push(sentence);
            used_words += words;
            if used_words >= self.bounds.max_length {
                break;
            }
        }

        let summary = picked.join(" ");
        if used_words > self.bounds.max_length {
            summary
                .split_whitespace()
                .take(self.bounds.max_length)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            summary
        }
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str, _language: Language) -> Result<String, StageError> {
        let summary = self.build(text);
        if summary.is_empty() {
            return Err(StageError::Summarization(
                "no sentences to summarize".to_string(),
            ));
        }
        Ok(summary)
    }

    fn model(&self) -> &str {
        "extractive-lead-1.0"
    }
}

/// Splits on sentence terminators and line breaks, dropping empty pieces.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().any(char::is_alphanumeric))
}

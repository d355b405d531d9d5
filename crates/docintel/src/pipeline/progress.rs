use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::task::JoinSet;

use crate::sanitize;

use super::record::ExtractionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Fetching,
    ExtractingText,
    ResolvingLanguage,
    Summarizing,
    ExtractingMetadata,
    Classifying,
    ExtractingTasks,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::ExtractingText => "extracting_text",
            Self::ResolvingLanguage => "resolving_language",
            Self::Summarizing => "summarizing",
            Self::ExtractingMetadata => "extracting_metadata",
            Self::Classifying => "classifying",
            Self::ExtractingTasks => "extracting_tasks",
        }
    }
}

/// Events emitted while a job runs. Phase events come from the pipeline;
/// terminal events from the worker once the ledger has been updated.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    Completed {
        document_id: String,
        record: Box<ExtractionRecord>,
    },
    Failed {
        document_id: String,
        error: String,
    },
}

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    fn report(&self, job_id: &str, event: &ProgressEvent);

    /// Waits for deliveries still in flight. Called once on shutdown.
    async fn flush(&self) {}
}

/// No-op reporter for tests and deployments without a webhook.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _job_id: &str, _event: &ProgressEvent) {}
}

/// Posts terminal events to a completion webhook.
///
/// Delivery runs on a spawned task and is best effort: failures are logged
/// and never touch the job's state. Pending deliveries are awaited by
/// [`ProgressReporter::flush`]. Must be used inside a tokio runtime.
pub struct WebhookProgress {
    http: Client,
    url: String,
    deliveries: Mutex<JoinSet<()>>,
}

/// Upper bound for one delivery, so a hung endpoint cannot stall shutdown.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

impl WebhookProgress {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent("docintel/webhook")
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            deliveries: Mutex::new(JoinSet::new()),
        })
    }

    fn deliveries(&self) -> MutexGuard<'_, JoinSet<()>> {
        match self.deliveries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Webhook delivery set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Deliveries spawned and not yet finished.
    pub fn pending(&self) -> usize {
        let mut deliveries = self.deliveries();
        while deliveries.try_join_next().is_some() {}
        deliveries.len()
    }

    fn payload(job_id: &str, event: &ProgressEvent) -> Option<serde_json::Value> {
        match event {
            ProgressEvent::Phase { .. } => None,
            ProgressEvent::Completed {
                document_id,
                record,
            } => Some(json!({
                "job_id": job_id,
                "document_id": document_id,
                "status": "completed",
                "result": record,
            })),
            ProgressEvent::Failed { document_id, error } => Some(json!({
                "job_id": job_id,
                "document_id": document_id,
                "status": "failed",
                "error": error,
            })),
        }
    }
}

#[async_trait]
impl ProgressReporter for WebhookProgress {
    fn report(&self, job_id: &str, event: &ProgressEvent) {
        let Some(payload) = Self::payload(job_id, event) else {
            return;
        };

        let request = self.http.post(&self.url).json(&payload);
        let target = sanitize::redact_url(&self.url);
        let job_id = job_id.to_string();

        let mut deliveries = self.deliveries();
        // Reap finished deliveries so the set does not grow with every job
        while deliveries.try_join_next().is_some() {}
        deliveries.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(job_id = %job_id, "Completion webhook delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        job_id = %job_id,
                        target = %target,
                        status = %response.status(),
                        "Completion webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        target = %target,
                        error = %e.without_url(),
                        "Completion webhook failed"
                    );
                }
            }
        });
    }

    async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.deliveries());
        if !pending.is_empty() {
            tracing::debug!(pending = pending.len(), "Waiting for webhook deliveries");
        }
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Webhook delivery task aborted");
            }
        }
    }
}

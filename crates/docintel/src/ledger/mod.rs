//! Job ledger: the lifecycle of every submitted job.
//!
//! A job is one JSON record under `job:{id}` in a [`LedgerStore`]. Every
//! write restarts the record's retention window ([`DEFAULT_TTL`]); once it
//! lapses the job reads exactly like an id that was never issued. Submitted
//! ids are also appended to the [`JOB_QUEUE_LIST`] list for bookkeeping.
//!
//! Transitions are checked against [`JobStatus::can_transition_to`]. Only
//! the worker executing a job writes to it after submission, so a
//! read-check-write per transition is sufficient.

pub mod error;
pub mod job;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::pipeline::ExtractionRecord;

pub use error::LedgerError;
pub use job::{JobInput, JobRecord, JobStatus};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::LedgerStore;

/// Retention window of job records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Append-only list of submitted job ids.
pub const JOB_QUEUE_LIST: &str = "document_processing_jobs";

fn job_key(id: &str) -> String {
    format!("job:{}", id)
}

#[derive(Clone)]
pub struct JobLedger {
    store: Arc<dyn LedgerStore>,
    ttl: Duration,
}

impl JobLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a `queued` job with a fresh id.
    pub async fn submit(&self, input: JobInput) -> Result<JobRecord, LedgerError> {
        let record = JobRecord::queued(Uuid::new_v4().to_string(), input);
        self.write(&record).await?;
        self.store
            .push(JOB_QUEUE_LIST, record.id.clone())
            .await?;

        tracing::info!(job_id = %record.id, "Job queued");
        Ok(record)
    }

    /// `queued → processing`.
    pub async fn start(&self, id: &str) -> Result<JobRecord, LedgerError> {
        self.transition(id, JobStatus::Processing, |_| {}).await
    }

    /// `processing → completed`, attaching the extraction record.
    pub async fn complete(
        &self,
        id: &str,
        result: ExtractionRecord,
    ) -> Result<JobRecord, LedgerError> {
        self.transition(id, JobStatus::Completed, move |record| {
            record.result = Some(result);
            record.error = None;
        })
        .await
    }

    /// `processing → failed`, attaching the error message.
    pub async fn fail(&self, id: &str, error: impl Into<String>) -> Result<JobRecord, LedgerError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, move |record| {
            record.result = None;
            record.error = Some(error);
        })
        .await
    }

    /// Read-only lookup. `None` for unknown and expired ids alike.
    pub async fn get(&self, id: &str) -> Result<Option<JobRecord>, LedgerError> {
        match self.store.get(&job_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn status(&self, id: &str) -> Result<Option<JobStatus>, LedgerError> {
        Ok(self.get(id).await?.map(|record| record.status))
    }

    /// Number of jobs ever submitted to this ledger's store.
    pub async fn queued_total(&self) -> Result<usize, LedgerError> {
        self.store.list_len(JOB_QUEUE_LIST).await
    }

    async fn transition<F>(
        &self,
        id: &str,
        next: JobStatus,
        apply: F,
    ) -> Result<JobRecord, LedgerError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::UnknownJob(id.to_string()))?;

        if !record.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                job_id: id.to_string(),
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.updated_at = Utc::now();
        apply(&mut record);
        self.write(&record).await?;

        tracing::debug!(job_id = %id, status = %next, "Job status changed");
        Ok(record)
    }

    async fn write(&self, record: &JobRecord) -> Result<(), LedgerError> {
        let raw = serde_json::to_string(record)?;
        self.store
            .set_with_ttl(&job_key(&record.id), raw, self.ttl)
            .await
    }
}

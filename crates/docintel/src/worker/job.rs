use crate::error::WorkerError;
use crate::ledger::{JobInput, JobRecord};

/// A queued job handed to the worker pool.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub input: JobInput,
}

impl From<&JobRecord> for Job {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id.clone(),
            input: record.input.clone(),
        }
    }
}

/// How a worker left a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// The ledger refused to start the job (expired or already picked up).
    Skipped(String),
    /// The ledger could not be reached when starting the job; it stays
    /// `queued` until its record expires.
    LedgerUnavailable(String),
}

/// Accepts jobs for background execution.
pub trait JobExecutor: Send + Sync {
    fn submit(&self, job: Job) -> Result<(), WorkerError>;
}

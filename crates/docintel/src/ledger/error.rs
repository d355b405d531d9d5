use std::path::PathBuf;
use thiserror::Error;

use super::JobStatus;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Failed to encode job record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Unknown or expired job: {0}")]
    UnknownJob(String),

    #[error("Ledger lock poisoned")]
    LockPoisoned,

    #[error("Ledger backend task failed: {0}")]
    Backend(String),
}

use thiserror::Error;

/// Failures that abort a job. The `Display` text becomes the failed job's
/// error message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to fetch document: {0}")]
    Fetch(#[from] crate::error::StorageError),

    #[error("Text extraction failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Internal error during {step}")]
    Internal { step: &'static str },
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocintelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Failed to read rules file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules YAML: {0}")]
    ParseRules(#[from] serde_yaml::Error),

    #[error("Rules validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process DOCX: {0}")]
    DocxProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),
}

/// Failures of the fail-soft stages. These never abort a job; the stage
/// substitutes its fallback value and records the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("language detection failed: {0}")]
    Detection(String),

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("invalid pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Failed to read object '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object storage request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Job execution aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job ledger unavailable: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Job could not be scheduled: {0}")]
    Schedule(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, DocintelError>;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod stages;
pub mod storage;
pub mod worker;

pub use config::{load_rules, ExtractionRules, Settings};
pub use dispatch::{DispatchFront, StatusView, SubmitReceipt, SubmitRequest};
pub use error::{
    ConfigError, DispatchError, DocintelError, ProcessError, Result, StageError, StorageError,
    WorkerError,
};
pub use ledger::{JobInput, JobLedger, JobRecord, JobStatus, LedgerError};
pub use pipeline::{ExtractionRecord, Pipeline};
pub use stages::{Department, Language};
pub use worker::WorkerPool;

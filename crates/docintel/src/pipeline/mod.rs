pub mod context;
pub mod error;
pub mod progress;
pub mod record;
pub mod runner;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use progress::{JobPhase, NoopProgress, ProgressEvent, ProgressReporter, WebhookProgress};
pub use record::{ExtractionRecord, ProcessingMetadata};
pub use runner::Pipeline;

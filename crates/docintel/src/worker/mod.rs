pub mod job;
pub mod pool;

pub use job::{Job, JobExecutor, JobOutcome};
pub use pool::WorkerPool;

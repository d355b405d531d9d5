use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::ledger::{JobLedger, LedgerError};
use crate::pipeline::{Pipeline, ProgressEvent, ProgressReporter};
use crate::sanitize;
use crate::worker::job::{Job, JobExecutor, JobOutcome};

/// Fixed set of async workers draining one job queue.
///
/// Each job's pipeline runs in its own task, so a panic inside a stage
/// fails that job and leaves the worker running.
pub struct WorkerPool {
    job_sender: Mutex<Option<UnboundedSender<Job>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
    progress: Arc<dyn ProgressReporter>,
    worker_count: usize,
}

struct WorkerContext {
    ledger: JobLedger,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
    in_flight: Arc<InFlight>,
}

/// Ids of jobs currently executing. A job id is claimed at most once at a time.
#[derive(Default)]
struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("In-flight set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn claim(&self, id: &str) -> bool {
        self.ids().insert(id.to_string())
    }

    fn release(&self, id: &str) {
        self.ids().remove(id);
    }

    fn len(&self) -> usize {
        self.ids().len()
    }
}

impl WorkerPool {
    /// Spawns `worker_count` workers (at least one) on the current runtime.
    pub fn start(
        worker_count: usize,
        ledger: JobLedger,
        pipeline: Arc<Pipeline>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded_channel::<Job>();
        let job_receiver = Arc::new(tokio::sync::Mutex::new(job_receiver));
        let in_flight = Arc::new(InFlight::default());

        let ctx = Arc::new(WorkerContext {
            ledger,
            pipeline,
            progress: Arc::clone(&progress),
            in_flight: Arc::clone(&in_flight),
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let rx = Arc::clone(&job_receiver);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(run_worker(worker_id, rx, ctx))
            })
            .collect();

        info!("Started {} workers", worker_count);

        Self {
            job_sender: Mutex::new(Some(job_sender)),
            workers: tokio::sync::Mutex::new(workers),
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight,
            progress,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Jobs currently executing.
    pub fn active_jobs(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stops accepting jobs, lets queued ones drain, waits for every
    /// worker to exit and then for pending progress deliveries.
    pub async fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);

        // Dropping the sender ends each worker's receive loop once the queue is empty
        match self.job_sender.lock() {
            Ok(mut sender) => drop(sender.take()),
            Err(poisoned) => {
                warn!("Job sender lock was poisoned, recovering");
                drop(poisoned.into_inner().take());
            }
        }

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for (i, result) in join_all(handles).await.into_iter().enumerate() {
            match result {
                Ok(()) => debug!("Worker {} finished", i),
                Err(e) => error!("Worker {} panicked: {}", i, e),
            }
        }

        self.progress.flush().await;
        info!("All workers have stopped");
    }
}

impl JobExecutor for WorkerPool {
    fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        let guard = match self.job_sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Job sender lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        guard
            .as_ref()
            .ok_or(WorkerError::ChannelClosed)?
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

async fn run_worker(
    worker_id: usize,
    job_receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<Job>>>,
    ctx: Arc<WorkerContext>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = job_receiver.lock().await.recv().await;
        let Some(job) = next else {
            debug!("Worker {} job channel closed", worker_id);
            break;
        };

        debug!("Worker {} processing job {}", worker_id, job.id);
        let outcome = execute_job(&ctx, job).await;
        debug!("Worker {} finished job: {:?}", worker_id, outcome);
    }

    debug!("Worker {} stopped", worker_id);
}

async fn execute_job(ctx: &WorkerContext, job: Job) -> JobOutcome {
    if !ctx.in_flight.claim(&job.id) {
        warn!("Job {} is already running", job.id);
        return JobOutcome::Skipped("already running".to_string());
    }

    let outcome = run_claimed(ctx, &job).await;
    ctx.in_flight.release(&job.id);
    outcome
}

async fn run_claimed(ctx: &WorkerContext, job: &Job) -> JobOutcome {
    match ctx.ledger.start(&job.id).await {
        Ok(_) => {}
        Err(e @ (LedgerError::InvalidTransition { .. } | LedgerError::UnknownJob(_))) => {
            warn!("Skipping job {}: {}", job.id, e);
            return JobOutcome::Skipped(e.to_string());
        }
        Err(e) => {
            error!("Ledger unavailable, job {} stays queued: {}", job.id, e);
            return JobOutcome::LedgerUnavailable(e.to_string());
        }
    }

    let handle = {
        let pipeline = Arc::clone(&ctx.pipeline);
        let progress = Arc::clone(&ctx.progress);
        let job_id = job.id.clone();
        let input = job.input.clone();
        tokio::spawn(async move { pipeline.run(&job_id, &input, progress.as_ref()).await })
    };

    let result = handle.await;

    let failure = match result {
        Ok(Ok(record)) => match ctx.ledger.complete(&job.id, record.clone()).await {
            Ok(_) => {
                info!("Job {} completed", job.id);
                let event = ProgressEvent::Completed {
                    document_id: job.input.document_id.clone(),
                    record: Box::new(record),
                };
                ctx.progress.report(&job.id, &event);
                return JobOutcome::Completed;
            }
            Err(e) => {
                error!("Failed to record completion of job {}: {}", job.id, e);
                format!("Failed to store extraction result: {}", e)
            }
        },
        Ok(Err(e)) => e.to_string(),
        Err(e) => {
            error!("Pipeline task for job {} aborted: {}", job.id, e);
            WorkerError::Aborted("pipeline task panicked".to_string()).to_string()
        }
    };

    finish_failed(ctx, job, failure).await
}

async fn finish_failed(ctx: &WorkerContext, job: &Job, message: String) -> JobOutcome {
    warn!(
        "Job {} failed: {}",
        job.id,
        sanitize::redact_key_in(&message, &job.input.storage_key)
    );

    if let Err(e) = ctx.ledger.fail(&job.id, message.clone()).await {
        error!("Failed to record failure of job {}: {}", job.id, e);
    }

    ctx.progress.report(
        &job.id,
        &ProgressEvent::Failed {
            document_id: job.input.document_id.clone(),
            error: message.clone(),
        },
    );
    JobOutcome::Failed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionRules;
    use crate::ledger::{JobInput, JobStatus, LedgerStore, MemoryStore};
    use crate::pipeline::NoopProgress;
    use async_trait::async_trait;
    use crate::processor::ProcessorRegistry;
    use crate::stages::{ExtractiveSummarizer, WhatlangDetector};
    use crate::storage::FileStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (JobLedger, Arc<Pipeline>) {
        std::fs::write(
            dir.path().join("budget.txt"),
            "Quarterly budget review. Please submit expense reports before 10/04/2024.",
        )
        .unwrap();

        let ledger = JobLedger::new(Arc::new(MemoryStore::new()));
        let pipeline = Pipeline::new(
            Arc::new(FileStore::new(dir.path())),
            ProcessorRegistry::with_tesseract(300),
            Arc::new(WhatlangDetector::new()),
            Arc::new(ExtractiveSummarizer::new()),
            &ExtractionRules::default(),
        );
        (ledger, Arc::new(pipeline))
    }

    /// Memory store that rejects writes of records in one status.
    struct RefusingStore {
        inner: MemoryStore,
        refused: String,
    }

    impl RefusingStore {
        fn refusing(status: JobStatus) -> Self {
            Self {
                inner: MemoryStore::new(),
                refused: format!(r#""status":"{}""#, status.as_str()),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for RefusingStore {
        async fn set_with_ttl(
            &self,
            key: &str,
            value: String,
            ttl: Duration,
        ) -> Result<(), LedgerError> {
            if value.contains(&self.refused) {
                return Err(LedgerError::Backend("connection reset".to_string()));
            }
            self.inner.set_with_ttl(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
            self.inner.get(key).await
        }

        async fn push(&self, list: &str, value: String) -> Result<(), LedgerError> {
            self.inner.push(list, value).await
        }

        async fn list_len(&self, list: &str) -> Result<usize, LedgerError> {
            self.inner.list_len(list).await
        }
    }

    fn context_with(dir: &TempDir, store: RefusingStore) -> WorkerContext {
        let (_, pipeline) = setup(dir);
        WorkerContext {
            ledger: JobLedger::new(Arc::new(store)),
            pipeline,
            progress: Arc::new(NoopProgress),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    #[derive(Default)]
    struct FlushFlag(AtomicBool);

    #[async_trait]
    impl ProgressReporter for FlushFlag {
        fn report(&self, _job_id: &str, _event: &ProgressEvent) {}

        async fn flush(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn input(key: &str) -> JobInput {
        JobInput {
            document_id: format!("doc-{}", key),
            storage_key: key.to_string(),
            file_name: key.to_string(),
            doc_type: None,
            language: None,
        }
    }

    async fn wait_terminal(ledger: &JobLedger, id: &str) -> JobStatus {
        for _ in 0..200 {
            if let Some(status) = ledger.status(id).await.unwrap() {
                if status.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_reach_terminal_states() {
        let dir = TempDir::new().unwrap();
        let (ledger, pipeline) = setup(&dir);
        let pool = WorkerPool::start(2, ledger.clone(), pipeline, Arc::new(NoopProgress));

        let ok = ledger.submit(input("budget.txt")).await.unwrap();
        let missing = ledger.submit(input("missing.txt")).await.unwrap();
        pool.submit(Job::from(&ok)).unwrap();
        pool.submit(Job::from(&missing)).unwrap();

        assert_eq!(wait_terminal(&ledger, &ok.id).await, JobStatus::Completed);
        assert_eq!(wait_terminal(&ledger, &missing.id).await, JobStatus::Failed);

        let done = ledger.get(&ok.id).await.unwrap().unwrap();
        let record = done.result.unwrap();
        assert_eq!(record.department, crate::stages::Department::Finance);
        assert_eq!(record.tasks.len(), 1);

        let failed = ledger.get(&missing.id).await.unwrap().unwrap();
        assert!(failed.result.is_none());
        assert!(failed
            .error
            .unwrap()
            .starts_with("Failed to fetch document"));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (ledger, pipeline) = setup(&dir);
        let pool = WorkerPool::start(1, ledger.clone(), pipeline, Arc::new(NoopProgress));
        pool.shutdown().await;

        let record = ledger.submit(input("budget.txt")).await.unwrap();
        let err = pool.submit(Job::from(&record)).unwrap_err();
        assert!(matches!(err, WorkerError::ChannelClosed));
        assert!(pool.is_shutdown());
    }

    #[tokio::test]
    async fn test_unknown_job_is_skipped() {
        let dir = TempDir::new().unwrap();
        let (ledger, pipeline) = setup(&dir);
        let ctx = WorkerContext {
            ledger,
            pipeline,
            progress: Arc::new(NoopProgress),
            in_flight: Arc::new(InFlight::default()),
        };

        let outcome = execute_job(
            &ctx,
            Job {
                id: "never-issued".to_string(),
                input: input("budget.txt"),
            },
        )
        .await;
        assert!(matches!(outcome, JobOutcome::Skipped(_)));
        assert_eq!(ctx.in_flight.len(), 0);
    }

    #[tokio::test]
    async fn test_refused_completion_write_fails_job() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(&dir, RefusingStore::refusing(JobStatus::Completed));
        let record = ctx.ledger.submit(input("budget.txt")).await.unwrap();

        let outcome = execute_job(&ctx, Job::from(&record)).await;
        assert!(matches!(outcome, JobOutcome::Failed(_)));

        let stored = ctx.ledger.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.result.is_none());
        assert!(stored
            .error
            .unwrap()
            .starts_with("Failed to store extraction result"));
    }

    #[tokio::test]
    async fn test_ledger_outage_on_start_is_not_a_skip() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(&dir, RefusingStore::refusing(JobStatus::Processing));
        let record = ctx.ledger.submit(input("budget.txt")).await.unwrap();

        let outcome = execute_job(&ctx, Job::from(&record)).await;
        assert!(matches!(outcome, JobOutcome::LedgerUnavailable(_)));
        assert_eq!(
            ctx.ledger.status(&record.id).await.unwrap(),
            Some(JobStatus::Queued)
        );
        assert_eq!(ctx.in_flight.len(), 0);
    }

    #[test]
    fn test_failure_log_hides_key_prefix() {
        let error = crate::pipeline::PipelineError::from(crate::error::StorageError::NotFound {
            key: "tenants/42/uploads/x.pdf".to_string(),
        });
        let logged = sanitize::redact_key_in(&error.to_string(), "tenants/42/uploads/x.pdf");
        assert_eq!(logged, "Failed to fetch document: Object not found: x.pdf");
        assert!(!logged.contains("tenants/42"));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_progress() {
        let dir = TempDir::new().unwrap();
        let (ledger, pipeline) = setup(&dir);
        let progress = Arc::new(FlushFlag::default());
        let pool = WorkerPool::start(1, ledger, pipeline, progress.clone());

        pool.shutdown().await;
        assert!(progress.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_in_flight_claims_once() {
        let in_flight = InFlight::default();
        assert!(in_flight.claim("job-1"));
        assert!(!in_flight.claim("job-1"));
        in_flight.release("job-1");
        assert!(in_flight.claim("job-1"));
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = TempDir::new().unwrap();
            let (ledger, pipeline) = setup(&dir);
            let pool = WorkerPool::start(0, ledger, pipeline, Arc::new(NoopProgress));
            assert_eq!(pool.worker_count(), 1);
            pool.shutdown().await;
        });
    }
}

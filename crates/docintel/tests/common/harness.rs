//! Test harness for isolated end-to-end runs.
//!
//! Documents are written under a temp storage root and submitted through
//! the dispatch front, exactly as the HTTP layer does it.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docintel::ledger::MemoryStore;
use docintel::pipeline::{NoopProgress, ProgressReporter};
use docintel::processor::ProcessorRegistry;
use docintel::stages::{ExtractiveSummarizer, WhatlangDetector, Summarizer};
use docintel::storage::FileStore;
use docintel::{
    DispatchFront, ExtractionRules, JobLedger, JobRecord, Pipeline, SubmitRequest, WorkerPool,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub storage_root: PathBuf,
    pub ledger: JobLedger,
    pub dispatch: DispatchFront,
    pub pool: Arc<WorkerPool>,
}

pub struct HarnessBuilder {
    summarizer: Arc<dyn Summarizer>,
    progress: Arc<dyn ProgressReporter>,
    rules: ExtractionRules,
    ttl: Option<Duration>,
    workers: usize,
}

impl HarnessBuilder {
    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn rules(mut self, rules: ExtractionRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn build(self) -> TestHarness {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("storage");
        std::fs::create_dir_all(&storage_root).expect("Failed to create storage root");

        let mut ledger = JobLedger::new(Arc::new(MemoryStore::new()));
        if let Some(ttl) = self.ttl {
            ledger = ledger.with_ttl(ttl);
        }

        let pipeline = Pipeline::new(
            Arc::new(FileStore::new(storage_root.clone())),
            ProcessorRegistry::with_tesseract(300),
            Arc::new(WhatlangDetector::new()),
            self.summarizer,
            &self.rules,
        );

        let pool = Arc::new(WorkerPool::start(
            self.workers,
            ledger.clone(),
            Arc::new(pipeline),
            self.progress,
        ));
        let dispatch = DispatchFront::new(ledger.clone(), pool.clone());

        TestHarness {
            temp_dir,
            storage_root,
            ledger,
            dispatch,
            pool,
        }
    }
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            summarizer: Arc::new(ExtractiveSummarizer::new()),
            progress: Arc::new(NoopProgress),
            rules: ExtractionRules::default(),
            ttl: None,
            workers: 2,
        }
    }

    /// Must be called from inside a tokio runtime.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Stores a document under `uploads/<file_name>` and returns its key.
    pub fn put(&self, file_name: &str, contents: &str) -> String {
        let dir = self.storage_root.join("uploads");
        std::fs::create_dir_all(&dir).expect("Failed to create uploads dir");
        std::fs::write(dir.join(file_name), contents).expect("Failed to write document");
        format!("uploads/{}", file_name)
    }

    pub fn request(key: &str) -> SubmitRequest {
        SubmitRequest {
            document_id: format!("doc-{}", key.replace('/', "-")),
            storage_key: key.to_string(),
            file_name: key.rsplit('/').next().unwrap_or(key).to_string(),
            doc_type: None,
            language: None,
        }
    }

    pub async fn submit(&self, request: SubmitRequest) -> String {
        self.dispatch
            .submit(request)
            .await
            .expect("submission rejected")
            .job_id
    }

    /// Polls until the job is completed or failed.
    pub async fn wait_terminal(&self, job_id: &str) -> JobRecord {
        for _ in 0..500 {
            if let Some(record) = self.ledger.get(job_id).await.expect("ledger read") {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish in time", job_id);
    }

    pub async fn process(&self, file_name: &str, contents: &str) -> JobRecord {
        let key = self.put(file_name, contents);
        let job_id = self.submit(Self::request(&key)).await;
        self.wait_terminal(&job_id).await
    }
}

//! Submission front: registers jobs in the ledger and hands them to the
//! executor. It holds no business logic of its own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::ledger::{JobInput, JobLedger, JobRecord, JobStatus};
use crate::stages::Language;
use crate::worker::{Job, JobExecutor};

pub const QUEUED_MESSAGE: &str = "Document queued for processing";

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub document_id: String,
    #[serde(alias = "s3_key")]
    pub storage_key: String,
    pub file_name: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Answer to a status query. `status` is `None` for unknown and expired ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: Option<JobStatus>,
}

#[derive(Clone)]
pub struct DispatchFront {
    ledger: JobLedger,
    executor: Arc<dyn JobExecutor>,
}

impl DispatchFront {
    pub fn new(ledger: JobLedger, executor: Arc<dyn JobExecutor>) -> Self {
        Self { ledger, executor }
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    /// Registers the job and schedules it. Returns before execution starts.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, DispatchError> {
        let input = validate(request)?;
        let record = self.ledger.submit(input).await?;

        // A job that never reaches a worker stays queued until it expires
        self.executor.submit(Job::from(&record))?;

        Ok(SubmitReceipt {
            job_id: record.id,
            status: record.status,
            message: QUEUED_MESSAGE.to_string(),
        })
    }

    pub async fn status(&self, job_id: &str) -> Result<StatusView, DispatchError> {
        Ok(StatusView {
            job_id: job_id.to_string(),
            status: self.ledger.status(job_id).await?,
        })
    }

    pub async fn result(&self, job_id: &str) -> Result<Option<JobRecord>, DispatchError> {
        Ok(self.ledger.get(job_id).await?)
    }
}

fn validate(request: SubmitRequest) -> Result<JobInput, DispatchError> {
    for (name, value) in [
        ("document_id", &request.document_id),
        ("storage_key", &request.storage_key),
        ("file_name", &request.file_name),
    ] {
        if value.trim().is_empty() {
            return Err(DispatchError::InvalidRequest(format!("{} must not be empty", name)));
        }
    }

    let language = request
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::parse::<Language>)
        .transpose()
        .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;

    let doc_type = request
        .doc_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(JobInput {
        document_id: request.document_id,
        storage_key: request.storage_key,
        file_name: request.file_name,
        doc_type,
        language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use crate::ledger::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        jobs: Mutex<Vec<Job>>,
        closed: bool,
    }

    impl JobExecutor for RecordingExecutor {
        fn submit(&self, job: Job) -> Result<(), WorkerError> {
            if self.closed {
                return Err(WorkerError::ChannelClosed);
            }
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn front(executor: Arc<RecordingExecutor>) -> DispatchFront {
        DispatchFront::new(JobLedger::new(Arc::new(MemoryStore::new())), executor)
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            document_id: "doc-42".to_string(),
            storage_key: "uploads/doc-42.pdf".to_string(),
            file_name: "doc-42.pdf".to_string(),
            doc_type: Some(" Invoice ".to_string()),
            language: Some("ML".to_string()),
        }
    }

    #[tokio::test]
    async fn test_submit_queues_and_schedules() {
        let executor = Arc::new(RecordingExecutor::default());
        let front = front(Arc::clone(&executor));

        let receipt = front.submit(request()).await.unwrap();
        assert_eq!(receipt.status, JobStatus::Queued);
        assert_eq!(receipt.message, QUEUED_MESSAGE);

        let jobs = executor.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, receipt.job_id);
        assert_eq!(jobs[0].input.language, Some(Language::Malayalam));
        assert_eq!(jobs[0].input.doc_type.as_deref(), Some("Invoice"));
    }

    #[tokio::test]
    async fn test_status_and_result_lookups() {
        let front = front(Arc::new(RecordingExecutor::default()));
        let receipt = front.submit(request()).await.unwrap();

        let view = front.status(&receipt.job_id).await.unwrap();
        assert_eq!(view.job_id, receipt.job_id);
        assert_eq!(view.status, Some(JobStatus::Queued));

        let record = front.result(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(record.input.document_id, "doc-42");
        assert!(record.result.is_none());

        let unknown = front.status("nope").await.unwrap();
        assert_eq!(unknown.job_id, "nope");
        assert!(unknown.status.is_none());
        assert!(front.result("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests() {
        let executor = Arc::new(RecordingExecutor::default());
        let front = front(Arc::clone(&executor));

        let mut blank = request();
        blank.storage_key = "  ".to_string();
        let err = front.submit(blank).await.unwrap_err();
        assert!(err.to_string().contains("storage_key"));

        let mut klingon = request();
        klingon.language = Some("tlh".to_string());
        assert!(matches!(
            front.submit(klingon).await.unwrap_err(),
            DispatchError::InvalidRequest(_)
        ));

        assert!(executor.jobs.lock().unwrap().is_empty());
        assert_eq!(front.ledger().queued_total().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schedule_failure_surfaces() {
        let executor = Arc::new(RecordingExecutor {
            closed: true,
            ..Default::default()
        });
        let front = front(executor);

        let err = front.submit(request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Schedule(WorkerError::ChannelClosed)));
    }

    #[test]
    fn test_request_accepts_s3_key_alias() {
        let request: SubmitRequest = serde_json::from_str(
            r#"{"document_id":"d","s3_key":"k/a.png","file_name":"a.png"}"#,
        )
        .unwrap();
        assert_eq!(request.storage_key, "k/a.png");
        assert!(request.language.is_none());
    }
}

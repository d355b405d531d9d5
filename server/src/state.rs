//! Wires the collaborators described by [`Settings`] into a running service.

use std::sync::Arc;

use anyhow::Context;
use docintel::config::{LedgerBackend, StorageSettings};
use docintel::ledger::{LedgerStore, MemoryStore, SqliteStore};
use docintel::pipeline::{NoopProgress, ProgressReporter, WebhookProgress};
use docintel::processor::ProcessorRegistry;
use docintel::sanitize;
use docintel::stages::{ExtractiveSummarizer, HttpSummarizer, WhatlangDetector, Summarizer};
use docintel::storage::{FileStore, HttpStore, ObjectStore};
use docintel::{
    load_rules, DispatchFront, ExtractionRules, JobLedger, Pipeline, Settings, WorkerPool,
};

pub struct AppState {
    pub dispatch: DispatchFront,
}

/// Everything `main` needs to serve requests and shut down cleanly.
pub struct Service {
    pub state: Arc<AppState>,
    pub pool: Arc<WorkerPool>,
}

/// Builds the service. Must run inside the tokio runtime since it starts
/// the worker pool.
pub fn build(settings: &Settings) -> anyhow::Result<Service> {
    let storage = object_store(&settings.storage)?;
    let ledger = JobLedger::new(ledger_store(&settings.ledger)?);
    let summarizer = summarizer(settings)?;

    let rules = match &settings.rules_path {
        Some(path) => load_rules(path)
            .with_context(|| format!("loading extraction rules from {}", path.display()))?,
        None => ExtractionRules::default(),
    };

    let pipeline = Pipeline::new(
        storage,
        ProcessorRegistry::with_tesseract(settings.ocr_dpi),
        Arc::new(WhatlangDetector::new()),
        summarizer,
        &rules,
    );

    let progress: Arc<dyn ProgressReporter> = match &settings.completion_webhook_url {
        Some(url) => {
            tracing::info!(url = %sanitize::redact_url(url), "Completion webhook enabled");
            Arc::new(WebhookProgress::new(url.clone()).context("building webhook client")?)
        }
        None => Arc::new(NoopProgress),
    };

    let pool = Arc::new(WorkerPool::start(
        settings.worker_count,
        ledger.clone(),
        Arc::new(pipeline),
        progress,
    ));

    let dispatch = DispatchFront::new(ledger, pool.clone());

    Ok(Service {
        state: Arc::new(AppState { dispatch }),
        pool,
    })
}

fn object_store(settings: &StorageSettings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match settings {
        StorageSettings::Filesystem { root } => {
            tracing::info!(root = %root.display(), "Using filesystem object storage");
            Ok(Arc::new(FileStore::new(root.clone())))
        }
        StorageSettings::Http {
            endpoint,
            bucket,
            region,
            token,
        } => {
            tracing::info!(
                endpoint = %sanitize::redact_url(endpoint),
                bucket = %bucket,
                "Using HTTP object storage"
            );
            let store = HttpStore::new(
                endpoint.clone(),
                bucket.clone(),
                region.clone(),
                token.clone(),
            )?;
            Ok(Arc::new(store))
        }
    }
}

fn ledger_store(backend: &LedgerBackend) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let store: Arc<dyn LedgerStore> = match backend {
        LedgerBackend::Memory => Arc::new(MemoryStore::new()),
        LedgerBackend::Sqlite(None) => Arc::new(SqliteStore::open_in_memory()?),
        LedgerBackend::Sqlite(Some(path)) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("opening ledger at {}", path.display()))?,
        ),
    };
    tracing::info!(backend = ?backend, "Job ledger ready");
    Ok(store)
}

fn summarizer(settings: &Settings) -> anyhow::Result<Arc<dyn Summarizer>> {
    let config = &settings.summarizer;
    match &config.url {
        Some(url) => {
            tracing::info!(
                url = %sanitize::redact_url(url),
                model = %config.model,
                "Using hosted summarizer"
            );
            let summarizer = HttpSummarizer::new(
                url.clone(),
                config.token.clone(),
                config.model.clone(),
                config.timeout,
            )
            .context("building summarizer client")?;
            Ok(Arc::new(summarizer))
        }
        None => {
            tracing::info!("No summarizer endpoint configured, using extractive summaries");
            Ok(Arc::new(ExtractiveSummarizer::new()))
        }
    }
}

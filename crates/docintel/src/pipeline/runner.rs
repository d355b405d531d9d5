use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::config::ExtractionRules;
use crate::ledger::JobInput;
use crate::processor::ProcessorRegistry;
use crate::sanitize;
use crate::stages::{
    self, resolve_language, DepartmentClassifier, LanguageDetector, MetadataExtractor,
    Summarizer, TaskExtractor,
};
use crate::storage::ObjectStore;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{JobPhase, ProgressEvent, ProgressReporter};
use super::record::{ExtractionRecord, ProcessingMetadata};

/// Runs the extraction stages for one document.
///
/// Fetching and text extraction are fail-hard; every later stage degrades
/// to a fallback value and the run still produces a record.
pub struct Pipeline {
    storage: Arc<dyn ObjectStore>,
    processor: Arc<ProcessorRegistry>,
    detector: Arc<dyn LanguageDetector>,
    summarizer: Arc<dyn Summarizer>,
    metadata: MetadataExtractor,
    classifier: DepartmentClassifier,
    tasks: TaskExtractor,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        processor: ProcessorRegistry,
        detector: Arc<dyn LanguageDetector>,
        summarizer: Arc<dyn Summarizer>,
        rules: &ExtractionRules,
    ) -> Self {
        Self {
            storage,
            processor: Arc::new(processor),
            detector,
            summarizer,
            metadata: MetadataExtractor::new(&rules.metadata_fields),
            classifier: DepartmentClassifier::new(&rules.departments, &rules.document_types),
            tasks: TaskExtractor::new(&rules.task_patterns),
        }
    }

    /// Run the full pipeline for a single document.
    pub async fn run(
        &self,
        job_id: &str,
        input: &JobInput,
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionRecord, PipelineError> {
        let span = info_span!("pipeline",
            job_id = %job_id,
            file = %sanitize::redact_key(&input.file_name),
        );

        self.run_steps(job_id, PipelineContext::new(input.clone()), progress)
            .instrument(span)
            .await
    }

    async fn run_steps(
        &self,
        job_id: &str,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionRecord, PipelineError> {
        let phase = |phase: JobPhase, message: &str| {
            tracing::debug!(phase = phase.as_str(), "{}", message);
            progress.report(
                job_id,
                &ProgressEvent::Phase {
                    phase,
                    message: message.to_string(),
                },
            );
        };

        // Step 1: Fetch
        phase(JobPhase::Fetching, "Fetching document from storage...");
        self.step_fetch(&mut ctx)
            .instrument(info_span!("fetch"))
            .await?;

        // Step 2: Extract text
        phase(JobPhase::ExtractingText, "Running OCR and text extraction...");
        self.step_extract_text(&mut ctx)
            .instrument(info_span!("extract_text"))
            .await?;

        // Step 3: Resolve language
        {
            let _step = info_span!("resolve_language").entered();
            phase(JobPhase::ResolvingLanguage, "Resolving document language...");
            self.step_resolve_language(&mut ctx);
        }

        // Step 4: Summarize
        phase(JobPhase::Summarizing, "Summarizing document...");
        self.step_summarize(&mut ctx)
            .instrument(info_span!("summarize"))
            .await;

        // Step 5: Metadata
        {
            let _step = info_span!("extract_metadata").entered();
            phase(JobPhase::ExtractingMetadata, "Extracting metadata fields...");
            self.step_extract_metadata(&mut ctx);
        }

        // Step 6: Department
        {
            let _step = info_span!("classify").entered();
            phase(JobPhase::Classifying, "Classifying department...");
            self.step_classify(&mut ctx);
        }

        // Step 7: Tasks
        {
            let _step = info_span!("extract_tasks").entered();
            phase(JobPhase::ExtractingTasks, "Extracting action items...");
            self.step_extract_tasks(&mut ctx);
        }

        Ok(self.assemble(ctx))
    }

    async fn step_fetch(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let bytes = self.storage.get(&ctx.input.storage_key).await?;
        tracing::debug!(bytes = bytes.len(), "Fetched document");
        ctx.bytes = Some(bytes);
        Ok(())
    }

    /// OCR is CPU bound; it runs on the blocking pool.
    async fn step_extract_text(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let bytes = ctx.bytes.take().unwrap_or_default();
        let file_name = ctx.input.file_name.clone();
        let processor = Arc::clone(&self.processor);

        let text = tokio::task::spawn_blocking(move || processor.extract(&file_name, &bytes))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Text extraction task aborted");
                PipelineError::Internal {
                    step: "text extraction",
                }
            })??;

        tracing::debug!(chars = text.chars().count(), "Extracted text");
        ctx.raw_text = Some(text);
        Ok(())
    }

    fn step_resolve_language(&self, ctx: &mut PipelineContext) {
        let outcome = resolve_language(ctx.input.language, ctx.raw_text(), self.detector.as_ref());
        ctx.language = Some(outcome.record(&mut ctx.fallbacks));
    }

    async fn step_summarize(&self, ctx: &mut PipelineContext) {
        let language = ctx.language.unwrap_or(stages::language::DEFAULT_LANGUAGE);
        let outcome = stages::summarize(self.summarizer.as_ref(), ctx.raw_text(), language).await;
        ctx.summary = outcome.record(&mut ctx.fallbacks);
    }

    fn step_extract_metadata(&self, ctx: &mut PipelineContext) {
        let outcome = self.metadata.extract(ctx.raw_text());
        ctx.metadata = outcome.record(&mut ctx.fallbacks);
    }

    fn step_classify(&self, ctx: &mut PipelineContext) {
        let language = ctx.language.unwrap_or(stages::language::DEFAULT_LANGUAGE);
        let outcome = self.classifier.classify(
            ctx.raw_text(),
            ctx.summary_in(language),
            ctx.input.doc_type.as_deref(),
        );
        ctx.department = Some(outcome.record(&mut ctx.fallbacks));
    }

    /// The summary is derived from the raw text, so scanning it as well
    /// would only duplicate deadlines already found.
    fn step_extract_tasks(&self, ctx: &mut PipelineContext) {
        let outcome = self.tasks.extract(ctx.raw_text());
        ctx.tasks = outcome.record(&mut ctx.fallbacks);
    }

    fn assemble(&self, ctx: PipelineContext) -> ExtractionRecord {
        let language = ctx.language.unwrap_or(stages::language::DEFAULT_LANGUAGE);
        let summary_text = ctx.summary_in(language).to_string();

        ExtractionRecord {
            raw_text: ctx.raw_text.unwrap_or_default(),
            language,
            summary_text,
            summary: ctx.summary,
            metadata: ctx.metadata,
            department: ctx.department.unwrap_or(stages::Department::General),
            tasks: ctx.tasks,
            processing_metadata: ProcessingMetadata::new(
                self.processor.ocr_version(),
                self.summarizer.model(),
                self.detector.version(),
                ctx.fallbacks,
            ),
        }
    }
}

//! Core Extractor implementation

use crate::chunking::TextChunker;
use crate::config::{ExtractorConfig, GroupingMode};
use crate::dispatcher::{plan_tasks, GroupDispatcher};
use crate::error::ExtractorError;
use crate::merger::merge;
use crate::retry::RetryPolicy;
use crate::types::{ExtractionRecord, ExtractionStats};
use omx_domain::{FieldGroup, LlmProvider, SchemaRegistry, TokenUsage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The Extractor turns document text into an [`ExtractionRecord`]
///
/// Holds no per-run state; one instance can serve many documents, also
/// concurrently.
pub struct Extractor<L: LlmProvider> {
    llm: Arc<L>,
    config: ExtractorConfig,
    chunker: TextChunker,
}

impl<L: LlmProvider + 'static> Extractor<L> {
    /// Create a new Extractor, validating the configuration
    pub fn new(llm: L, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::with_shared(Arc::new(llm), config)
    }

    /// Create a new Extractor around a shared provider
    pub fn with_shared(llm: Arc<L>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate()?;
        let chunker = TextChunker::new(config.max_chunk_size, config.overlap_size)?;
        Ok(Self {
            llm,
            config,
            chunker,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Groups prompted for each chunk
    fn groups(&self) -> Vec<&'static FieldGroup> {
        match self.config.grouping {
            GroupingMode::Grouped => SchemaRegistry::groups().iter().collect(),
            GroupingMode::SinglePrompt => vec![SchemaRegistry::combined_group()],
        }
    }

    /// Extract the 19 fields from document text
    ///
    /// Always returns a record; model and parse failures lower its status
    /// instead of producing an error.
    pub async fn extract(&self, text: &str) -> ExtractionRecord {
        let started = Instant::now();
        let document_chars = text.chars().count();

        info!(
            provider = self.llm.name(),
            model = %self.config.model.model_id,
            document_chars,
            "Starting extraction"
        );

        let mut stats = ExtractionStats {
            document_chars,
            provider: self.llm.name().to_string(),
            model_id: self.config.model.model_id.clone(),
            ..ExtractionStats::default()
        };

        if text.trim().is_empty() {
            warn!("Document contains no text; skipping model calls");
            let mut record = ExtractionRecord::empty();
            record.warnings.push("Document contains no text".to_string());
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            record.stats = stats;
            return record;
        }

        let chunks = self.chunker.chunk(text);
        let tasks = plan_tasks(&self.groups(), &chunks);
        info!(chunks = chunks.len(), tasks = tasks.len(), "Split document");
        stats.chunk_count = chunks.len();
        stats.task_count = tasks.len();

        let dispatcher = GroupDispatcher::new(
            Arc::clone(&self.llm),
            self.config.worker_count,
            RetryPolicy::from(&self.config.retry),
            self.config.task_timeout(),
            self.config.model.options(),
        );
        let results = dispatcher.dispatch(tasks).await;

        let mut record = merge(&results);
        stats.failed_tasks = results.iter().filter(|r| r.is_failed()).count();
        stats.model_calls = results.iter().map(|r| r.attempts).sum();
        let usage = results.iter().fold(TokenUsage::default(), |mut total, r| {
            total += r.usage;
            total
        });
        stats.input_tokens = usage.input_tokens;
        stats.output_tokens = usage.output_tokens;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        record.stats = stats;

        info!(
            run_id = %record.run_id,
            status = %record.status,
            extracted = record.extracted_count(),
            failed_tasks = record.stats.failed_tasks,
            tokens = usage.total(),
            elapsed_ms = record.stats.elapsed_ms,
            "Extraction complete"
        );
        record
    }
}

/// Extract a record from `text` with a one-off [`Extractor`]
///
/// Fails only for invalid configuration.
pub async fn extract<L: LlmProvider + 'static>(
    llm: Arc<L>,
    text: &str,
    config: ExtractorConfig,
) -> Result<ExtractionRecord, ExtractorError> {
    let extractor = Extractor::with_shared(llm, config)?;
    Ok(extractor.extract(text).await)
}

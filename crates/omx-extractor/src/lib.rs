//! OMX Extractor
//!
//! Extracts the 19 Offering Memorandum fields from document text with an
//! LLM.
//!
//! # Architecture
//!
//! ```text
//! Text → Chunker → {group × chunk: PromptBuilder → LLM → Parser} → Merger → Record
//! ```
//!
//! The fan-out runs on a bounded worker pool. Each task is retried on
//! transient failures and bounded by a timeout; a failed task degrades the
//! record instead of aborting the run. Only invalid configuration produces
//! an [`ExtractorError`].
//!
//! # Example Usage
//!
//! ```no_run
//! use omx_extractor::{Extractor, ExtractorConfig, RecordStatus};
//! use omx_llm::MockProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = MockProvider::new(r#"{"tenant_name": "Dollar General"}"#);
//! let extractor = Extractor::new(llm, ExtractorConfig::default())?;
//!
//! let record = extractor.extract("Tenant: Dollar General ...").await;
//!
//! if record.status != RecordStatus::Complete {
//!     println!("Missing: {:?}", record.missing_required());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod coerce;
mod config;
mod dispatcher;
mod error;
mod extractor;
mod location;
mod merger;
mod parser;
mod prompt;
mod retry;
mod types;

#[cfg(test)]
mod tests;

pub use chunking::{reassemble, TextChunker};
pub use coerce::{parse_date, parse_decimal};
pub use config::{ExtractorConfig, GroupingMode, ModelSettings, RetryConfig};
pub use dispatcher::{plan_tasks, GroupDispatcher};
pub use error::{ChunkingError, ExtractorError, ModelError};
pub use extractor::{extract, Extractor};
pub use location::{attach_location, geocode_query};
pub use merger::merge;
pub use parser::{find_json_object, parse_model_response};
pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;
pub use types::{
    Alternate, DocumentChunk, ExtractionRecord, ExtractionStats, ExtractionTask, FieldStatus,
    FieldValue, ParsedField, PartialResult, Provenance, RecordField, RecordStatus, TaskFailure,
    TaskOutcome, TaskResult,
};

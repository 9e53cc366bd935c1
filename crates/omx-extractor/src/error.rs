//! Error types for the Extractor

use omx_domain::{ClassifiedError, FailureKind};
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an extraction run before any model call is made
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Chunking parameters are unusable
    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Chunk size must leave room for forward progress past the overlap
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("max_chunk_size ({max_chunk_size}) must be greater than overlap_size ({overlap_size})")]
pub struct ChunkingError {
    /// Requested maximum chunk size in characters
    pub max_chunk_size: usize,

    /// Requested overlap in characters
    pub overlap_size: usize,
}

/// A failed model call, after classification
///
/// Provider errors are reduced to their [`FailureKind`] and message so task
/// results stay independent of the concrete provider type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} model error: {message}")]
pub struct ModelError {
    /// Whether retrying could help
    pub kind: FailureKind,

    /// Human readable cause
    pub message: String,
}

impl ModelError {
    /// Classify a provider error
    pub fn from_provider<E: ClassifiedError>(error: &E) -> Self {
        Self {
            kind: error.failure_kind(),
            message: error.to_string(),
        }
    }

    /// A call that exceeded the per-task deadline
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: format!("no response within {}s", after.as_secs_f32()),
        }
    }

    /// A task that never produced a result
    pub fn abandoned(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: reason.into(),
        }
    }

    /// True if the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl ClassifiedError for ModelError {
    fn failure_kind(&self) -> FailureKind {
        self.kind
    }
}

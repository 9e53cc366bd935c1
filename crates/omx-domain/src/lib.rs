//! OMX Domain Layer
//!
//! This crate defines the extraction schema for Offering Memorandum (OM)
//! documents and the trait interfaces for the remote capabilities the
//! extraction core talks to. It holds no infrastructure code.
//!
//! ## Key Concepts
//!
//! - **FieldSpec**: One of the 19 fields extracted from an OM
//! - **FieldGroup**: A cohesive subset of fields extracted by one model call
//! - **LlmProvider**: Prompt in, text out; fallible and rate limited
//! - **Geocoder**: Address in, coordinates out
//! - **FailureKind**: Whether a port failure is worth retrying
//!
//! ## Architecture
//!
//! - Only `serde` as an external dependency
//! - Schema is static and immutable for the life of the process
//! - Infrastructure implementations live in `omx-llm` and `omx-geocoder`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod failure;
pub mod geo;
pub mod schema;
pub mod traits;

// Re-exports for convenience
pub use failure::{ClassifiedError, FailureKind};
pub use geo::Coordinates;
pub use schema::{FieldGroup, FieldSpec, FieldType, GroupId, SchemaRegistry, FIELD_COUNT};
pub use traits::{Generation, GenerationOptions, Geocoder, LlmProvider, TokenUsage};

//! Data types for the extraction pipeline

use crate::error::ModelError;
use chrono::NaiveDate;
use omx_domain::{
    Coordinates, FieldGroup, FieldSpec, FieldType, GroupId, SchemaRegistry, TokenUsage,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A bounded slice of document text
///
/// Offsets are in characters (Unicode scalar values) into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChunk {
    /// Position in the chunk sequence, starting at 0
    pub index: usize,

    /// Exact slice of the source text
    pub text: String,

    /// Character offset of the first character
    pub start: usize,

    /// Character offset one past the last character
    pub end: usize,

    /// Leading characters shared with the previous chunk
    pub overlap: usize,
}

impl DocumentChunk {
    /// Length in characters
    pub fn char_count(&self) -> usize {
        self.end - self.start
    }

    /// Rough token estimate (4 characters per token)
    pub fn approx_tokens(&self) -> usize {
        self.char_count().div_ceil(4)
    }

    /// The part of the chunk not already covered by the previous one
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// One (group, chunk) unit of work for the model
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    /// Fields requested by this task
    pub group: &'static FieldGroup,

    /// Index of the chunk the prompt was built from
    pub chunk_index: usize,

    /// Complete prompt text
    pub prompt: String,
}

impl ExtractionTask {
    /// Key identifying the task's result slot
    pub fn key(&self) -> (GroupId, usize) {
        (self.group.id(), self.chunk_index)
    }
}

/// A typed field value, or the explicit "not found" marker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Trimmed free text
    Text(String),
    /// Decimal number
    Decimal(f64),
    /// Calendar date (serialized as `YYYY-MM-DD`)
    Date(NaiveDate),
    /// No usable value (serialized as `null`)
    NotFound,
}

impl FieldValue {
    /// True unless this is the "not found" marker
    pub fn is_found(&self) -> bool {
        !matches!(self, FieldValue::NotFound)
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a decimal value
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    /// Date content, if this is a date value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Decimal(n) => write!(f, "{}", n),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::NotFound => f.write_str("not found"),
        }
    }
}

/// One field as read from a model response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedField {
    /// Raw value text as the model wrote it (None if absent or null)
    pub raw: Option<String>,

    /// Coerced value
    pub value: FieldValue,

    /// A value was present but could not be coerced to the field's type
    pub coercion_failed: bool,
}

impl ParsedField {
    /// Field absent from the response, or an explicit null
    pub fn missing() -> Self {
        Self {
            raw: None,
            value: FieldValue::NotFound,
            coercion_failed: false,
        }
    }
}

/// Parsed output of one extraction task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialResult {
    /// Group the task targeted
    pub group_id: GroupId,

    /// Chunk the task read
    pub chunk_index: usize,

    /// A JSON object was found in the response
    pub json_found: bool,

    /// One entry for every field of the group
    pub fields: BTreeMap<&'static str, ParsedField>,
}

impl PartialResult {
    /// A result where every field of `group` is "not found"
    pub fn failed(group: &FieldGroup, chunk_index: usize) -> Self {
        Self {
            group_id: group.id(),
            chunk_index,
            json_found: false,
            fields: group
                .fields()
                .iter()
                .map(|f| (f.name, ParsedField::missing()))
                .collect(),
        }
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&ParsedField> {
        self.fields.get(name)
    }

    /// Number of fields with a usable value
    pub fn found_count(&self) -> usize {
        self.fields.values().filter(|f| f.value.is_found()).count()
    }
}

/// Terminal state of an extraction task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The model answered (the answer may still lack a JSON object)
    Success(PartialResult),
    /// The model could not be reached or refused, after retries
    Failure(ModelError),
}

/// An extraction task's outcome, attributed to its (group, chunk) slot
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// Group the task targeted
    pub group_id: GroupId,

    /// Chunk the task read
    pub chunk_index: usize,

    /// Model calls made, including retries
    pub attempts: u32,

    /// Tokens reported for the answered call
    pub usage: TokenUsage,

    /// Success or failure
    pub outcome: TaskOutcome,
}

impl TaskResult {
    /// The parsed result, if the model answered
    pub fn partial(&self) -> Option<&PartialResult> {
        match &self.outcome {
            TaskOutcome::Success(partial) => Some(partial),
            TaskOutcome::Failure(_) => None,
        }
    }

    /// True if the task produced no usable JSON
    pub fn is_failed(&self) -> bool {
        self.partial().map_or(true, |p| !p.json_found)
    }
}

/// Extraction status of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// A value was extracted
    Extracted,
    /// No task produced a value
    NotFound,
    /// No value; at least one task produced a value that could not be coerced
    CoercionFailed,
}

impl FieldStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStatus::Extracted => "extracted",
            FieldStatus::NotFound => "not_found",
            FieldStatus::CoercionFailed => "coercion_failed",
        }
    }
}

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Chunk the value was read from
    pub chunk_index: usize,

    /// Group whose prompt produced it
    pub group_id: GroupId,
}

/// A value found in a later chunk and not used as the primary value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternate {
    /// Where the value came from
    #[serde(flatten)]
    pub source: Provenance,

    /// The value
    pub value: FieldValue,
}

/// One of the 19 fields of a merged record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordField {
    /// Machine name
    pub name: &'static str,

    /// Human readable label
    pub label: &'static str,

    /// Declared type
    pub field_type: FieldType,

    /// Whether a complete record needs this field
    pub required: bool,

    /// Primary value
    pub value: FieldValue,

    /// Extraction status
    pub status: FieldStatus,

    /// Source of the primary value
    pub source: Option<Provenance>,

    /// Values from later chunks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<Alternate>,
}

impl RecordField {
    /// A field with no value
    pub fn not_found(spec: &FieldSpec) -> Self {
        Self {
            name: spec.name,
            label: spec.label,
            field_type: spec.field_type,
            required: spec.required,
            value: FieldValue::NotFound,
            status: FieldStatus::NotFound,
            source: None,
            alternates: Vec::new(),
        }
    }

    /// Replace the value after a manual edit; provenance is cleared
    pub fn set_value(&mut self, value: FieldValue) {
        self.status = if value.is_found() {
            FieldStatus::Extracted
        } else {
            FieldStatus::NotFound
        };
        self.value = value;
        self.source = None;
    }
}

/// Overall confidence in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Every required field has a value
    Complete,
    /// Some required fields are missing, but something was extracted
    Partial,
    /// Nothing was extracted
    Failed,
}

impl RecordStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Complete => "complete",
            RecordStatus::Partial => "partial",
            RecordStatus::Failed => "failed",
        }
    }

    /// Derive the status from a set of record fields
    pub fn of(fields: &[RecordField]) -> Self {
        if !fields.iter().any(|f| f.value.is_found()) {
            RecordStatus::Failed
        } else if fields.iter().filter(|f| f.required).all(|f| f.value.is_found()) {
            RecordStatus::Complete
        } else {
            RecordStatus::Partial
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task that yielded nothing usable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    /// Group the task targeted
    pub group_id: GroupId,

    /// Chunk the task read
    pub chunk_index: usize,

    /// Why it failed
    pub reason: String,
}

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Characters in the document text
    pub document_chars: usize,

    /// Chunks produced
    pub chunk_count: usize,

    /// Tasks dispatched
    pub task_count: usize,

    /// Tasks that produced no usable JSON
    pub failed_tasks: usize,

    /// Model calls including retries
    pub model_calls: u32,

    /// Prompt tokens reported by the provider
    pub input_tokens: u64,

    /// Completion tokens reported by the provider
    pub output_tokens: u64,

    /// Wall clock time of the run (milliseconds)
    pub elapsed_ms: u64,

    /// Provider name
    pub provider: String,

    /// Model identifier
    pub model_id: String,
}

/// The merged result of one extraction run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    /// Run identifier (UUIDv7)
    pub run_id: Uuid,

    /// Overall status
    pub status: RecordStatus,

    /// All 19 fields in schema order
    pub fields: Vec<RecordField>,

    /// Geocoded property location, if resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,

    /// Non-fatal problems (e.g. geocoding failures)
    pub warnings: Vec<String>,

    /// Tasks that yielded nothing usable
    pub failures: Vec<TaskFailure>,

    /// Run statistics
    pub stats: ExtractionStats,
}

impl ExtractionRecord {
    /// Build a record from merged fields, deriving the status
    pub fn new(fields: Vec<RecordField>, failures: Vec<TaskFailure>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            status: RecordStatus::of(&fields),
            fields,
            location: None,
            warnings: Vec::new(),
            failures,
            stats: ExtractionStats::default(),
        }
    }

    /// A record with every field "not found"
    pub fn empty() -> Self {
        let fields = SchemaRegistry::fields()
            .iter()
            .map(RecordField::not_found)
            .collect();
        Self::new(fields, Vec::new())
    }

    /// Look up a field by machine name
    pub fn get(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Mutable access to a field by machine name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RecordField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// The value of a field, if the name is known
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name).map(|f| &f.value)
    }

    /// Number of fields with a value
    pub fn extracted_count(&self) -> usize {
        self.fields.iter().filter(|f| f.value.is_found()).count()
    }

    /// Required fields without a value
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required && !f.value.is_found())
            .map(|f| f.name)
            .collect()
    }

    /// Recompute the status after fields were edited
    pub fn refresh_status(&mut self) {
        self.status = RecordStatus::of(&self.fields);
    }
}

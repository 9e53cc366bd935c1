//! Merge per-task results into one record
//!
//! For each field the primary value comes from the lowest chunk index that
//! produced a usable value; values from later chunks are kept as
//! alternates. Completion order of tasks has no influence on the result.

use crate::types::{
    Alternate, ExtractionRecord, FieldStatus, PartialResult, Provenance, RecordField, TaskFailure,
    TaskOutcome, TaskResult,
};
use omx_domain::SchemaRegistry;

/// Merge every task result of a run into an [`ExtractionRecord`]
pub fn merge(results: &[TaskResult]) -> ExtractionRecord {
    let mut partials: Vec<&PartialResult> = results
        .iter()
        .filter_map(TaskResult::partial)
        .filter(|p| p.json_found)
        .collect();
    partials.sort_by_key(|p| (p.chunk_index, p.group_id));

    let fields = SchemaRegistry::fields()
        .iter()
        .map(|spec| {
            let mut field = RecordField::not_found(spec);
            let mut flagged = false;

            for partial in &partials {
                let Some(parsed) = partial.get(spec.name) else {
                    continue;
                };
                flagged |= parsed.coercion_failed;
                if !parsed.value.is_found() {
                    continue;
                }

                let source = Provenance {
                    chunk_index: partial.chunk_index,
                    group_id: partial.group_id,
                };
                if field.source.is_none() {
                    field.value = parsed.value.clone();
                    field.source = Some(source);
                } else {
                    field.alternates.push(Alternate {
                        source,
                        value: parsed.value.clone(),
                    });
                }
            }

            field.status = if field.source.is_some() {
                FieldStatus::Extracted
            } else if flagged {
                FieldStatus::CoercionFailed
            } else {
                FieldStatus::NotFound
            };
            field
        })
        .collect();

    ExtractionRecord::new(fields, failures(results))
}

fn failures(results: &[TaskResult]) -> Vec<TaskFailure> {
    results
        .iter()
        .filter_map(|result| {
            let reason = match &result.outcome {
                TaskOutcome::Failure(e) => e.to_string(),
                TaskOutcome::Success(partial) if !partial.json_found => {
                    "no JSON object in model response".to_string()
                }
                TaskOutcome::Success(_) => return None,
            };
            Some(TaskFailure {
                group_id: result.group_id,
                chunk_index: result.chunk_index,
                reason,
            })
        })
        .collect()
}

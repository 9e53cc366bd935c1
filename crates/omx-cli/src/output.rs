//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use omx_domain::SchemaRegistry;
use omx_extractor::{ExtractionRecord, FieldValue, RecordField, RecordStatus};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest value shown in a table cell
const MAX_CELL_CHARS: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// The selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format an extraction record.
    pub fn format_record(&self, record: &ExtractionRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
            OutputFormat::Table => Ok(self.format_record_table(record)),
        }
    }

    /// Format the field schema.
    pub fn format_schema(&self) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let groups: Vec<serde_json::Value> = SchemaRegistry::groups()
                    .iter()
                    .map(|group| {
                        serde_json::json!({
                            "id": group.id(),
                            "name": group.name(),
                            "fields": group.fields(),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&groups)?)
            }
            OutputFormat::Table => Ok(self.format_schema_table()),
        }
    }

    fn format_record_table(&self, record: &ExtractionRecord) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value", "Status", "Source"]);

        for field in &record.fields {
            builder.push_record([
                field.label.to_string(),
                display_value(&field.value),
                field.status.as_str().to_string(),
                display_source(field),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        let mut lines = vec![table.to_string(), self.record_summary(record)];

        let missing = record.missing_required();
        if !missing.is_empty() {
            lines.push(self.warning(&format!("Missing required: {}", missing.join(", "))));
        }
        if let Some(location) = &record.location {
            lines.push(self.info(&format!("Location: {}", location)));
        }
        for warning in &record.warnings {
            lines.push(self.warning(warning));
        }
        for failure in &record.failures {
            lines.push(self.error(&format!(
                "Group {}, chunk {}: {}",
                failure.group_id, failure.chunk_index, failure.reason
            )));
        }
        lines.join("\n")
    }

    fn record_summary(&self, record: &ExtractionRecord) -> String {
        let stats = &record.stats;
        let status = format!(
            "Status: {} ({}/{} fields)",
            record.status,
            record.extracted_count(),
            record.fields.len()
        );
        let status = match record.status {
            RecordStatus::Complete => self.colorize(&status, "green"),
            RecordStatus::Partial => self.colorize(&status, "yellow"),
            RecordStatus::Failed => self.colorize(&status, "red"),
        };

        format!(
            "{}\nRun {}: {} chunk(s), {} task(s), {} model call(s), {}/{} tokens, {} ms [{} / {}]",
            status,
            record.run_id,
            stats.chunk_count,
            stats.task_count,
            stats.model_calls,
            stats.input_tokens,
            stats.output_tokens,
            stats.elapsed_ms,
            stats.provider,
            stats.model_id
        )
    }

    fn format_schema_table(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Group", "Field", "Label", "Type", "Required"]);

        for group in SchemaRegistry::groups() {
            for field in group.fields() {
                builder.push_record([
                    format!("{} {}", group.id(), group.name()),
                    field.name.to_string(),
                    field.label.to_string(),
                    field.field_type.as_str().to_string(),
                    if field.required { "yes" } else { "" }.to_string(),
                ]);
            }
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn display_value(value: &FieldValue) -> String {
    if !value.is_found() {
        return "-".to_string();
    }
    let text = value.to_string();
    if text.chars().count() <= MAX_CELL_CHARS {
        return text;
    }
    let cut: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
    format!("{}...", cut)
}

fn display_source(field: &RecordField) -> String {
    let Some(source) = field.source else {
        return "-".to_string();
    };
    let mut text = format!("chunk {}", source.chunk_index);
    if !field.alternates.is_empty() {
        text.push_str(&format!(" (+{} alt)", field.alternates.len()));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use omx_domain::{Coordinates, FIELD_COUNT};
    use omx_extractor::{Alternate, Provenance, TaskFailure};

    fn create_test_record() -> ExtractionRecord {
        let mut record = ExtractionRecord::empty();
        let tenant = record.get_mut("tenant_name").unwrap();
        tenant.set_value(FieldValue::Text("Dollar General".into()));
        tenant.source = Some(Provenance {
            chunk_index: 0,
            group_id: 1,
        });
        tenant.alternates.push(Alternate {
            source: Provenance {
                chunk_index: 2,
                group_id: 1,
            },
            value: FieldValue::Text("Dollar General Corp".into()),
        });
        record
            .get_mut("sales_price")
            .unwrap()
            .set_value(FieldValue::Decimal(1_500_000.0));
        record.failures.push(TaskFailure {
            group_id: 3,
            chunk_index: 1,
            reason: "no JSON object in model response".into(),
        });
        record.refresh_status();
        record.stats.input_tokens = 12_000;
        record.stats.output_tokens = 340;
        record
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_record(&create_test_record()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["status"], "partial");
        assert_eq!(json["stats"]["input_tokens"], 12_000);
        assert_eq!(json["fields"].as_array().unwrap().len(), FIELD_COUNT);
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_record(&create_test_record()).unwrap();
        assert!(output.contains("Tenant Name"));
        assert!(output.contains("Dollar General"));
        assert!(output.contains("1500000"));
        assert!(output.contains("chunk 0 (+1 alt)"));
        assert!(output.contains("Status: partial (2/19 fields)"));
        assert!(output.contains("Missing required:"));
        assert!(output.contains("Group 3, chunk 1: no JSON"));
        assert!(output.contains("12000/340 tokens"));
    }

    #[test]
    fn test_table_shows_location() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let mut record = create_test_record();
        record.location = Coordinates::new(31.5493, -97.1467);
        let output = formatter.format_record(&record).unwrap();
        assert!(output.contains("ℹ Location:"));
    }

    #[test]
    fn test_long_values_truncated() {
        let long = FieldValue::Text("x".repeat(100));
        let shown = display_value(&long);
        assert_eq!(shown.chars().count(), MAX_CELL_CHARS);
        assert!(shown.ends_with("..."));
        assert_eq!(display_value(&FieldValue::NotFound), "-");
    }

    #[test]
    fn test_schema_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_schema().unwrap();
        assert!(output.contains("tenant_name"));
        assert!(output.contains("lease_expiration_date"));
    }

    #[test]
    fn test_schema_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_schema().unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let groups = json.as_array().unwrap();
        assert_eq!(groups.len(), SchemaRegistry::groups().len());
        let total: usize = groups
            .iter()
            .map(|g| g["fields"].as_array().unwrap().len())
            .sum();
        assert_eq!(total, FIELD_COUNT);
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let msg = formatter.success("test");
        assert_eq!(msg, "✓ test");
    }
}

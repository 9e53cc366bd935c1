//! LLM prompt engineering for field extraction
//!
//! The prompt fixes the output contract the parser relies on: a single JSON
//! object whose keys are exactly the field names of the group, with `null`
//! for anything the text does not state.

use omx_domain::{FieldGroup, FieldType};

/// Builds the prompt for one field group
pub struct PromptBuilder<'a> {
    group: &'a FieldGroup,
    part: Option<(usize, usize)>,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder for `group`
    pub fn new(group: &'a FieldGroup) -> Self {
        Self { group, part: None }
    }

    /// Mark the text as part `index` (0-based) of `count` chunks
    pub fn with_chunk_info(mut self, index: usize, count: usize) -> Self {
        if count > 1 {
            self.part = Some((index, count));
        }
        self
    }

    /// Build the complete extraction prompt over one or more chunk texts
    pub fn build(&self, texts: &[&str]) -> String {
        let fields = self.group.fields();
        let mut prompt = String::new();

        // 1. Role and field list
        prompt.push_str(ROLE);
        prompt.push_str(&format!(
            "Extract ONLY the following {} fields from the OM text and return them as a JSON object:\n\n",
            fields.len()
        ));
        for (i, field) in fields.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} (\"{}\", {}) - {}\n",
                i + 1,
                field.label,
                field.name,
                field.field_type.format_hint(),
                field.description
            ));
        }
        prompt.push('\n');

        // 2. Chunk context
        if let Some((index, count)) = self.part {
            prompt.push_str(&format!(
                "This is part {} of {} of the document. Fields not stated in this part must be null.\n\n",
                index + 1,
                count
            ));
        }

        // 3. The text to analyze
        prompt.push_str("OM Text:\n");
        prompt.push_str("---\n");
        prompt.push_str(&texts.join(CHUNK_SEPARATOR));
        prompt.push_str("\n---\n\n");

        // 4. Output contract
        prompt.push_str("Return ONLY a single JSON object with exactly these keys:\n");
        prompt.push_str(&skeleton(self.group));
        prompt.push_str("\n\n");
        prompt.push_str(RULES);

        prompt
    }
}

const ROLE: &str =
    "You are an expert at analyzing commercial real estate Offering Memorandums (OMs).\n";

const CHUNK_SEPARATOR: &str = "\n\n[...]\n\n";

const RULES: &str = r#"Rules:
- Use null for any field the text does not state. Never guess or fabricate a value.
- Decimal fields: a plain number only (no $, commas, % or units); 1833000.00, not "$1.83M".
- Date fields: "YYYY-MM-DD"; use "YYYY-01-01" when only the year is given.
- Text fields: the value as written, without surrounding commentary.

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

/// JSON object template with one placeholder per field
fn skeleton(group: &FieldGroup) -> String {
    let lines: Vec<String> = group
        .fields()
        .iter()
        .map(|field| {
            let placeholder = match field.field_type {
                FieldType::Text => "\"text or null\"",
                FieldType::Decimal => "number or null",
                FieldType::Date => "\"YYYY-MM-DD or null\"",
            };
            format!("  \"{}\": {}", field.name, placeholder)
        })
        .collect();
    format!("{{\n{}\n}}", lines.join(",\n"))
}

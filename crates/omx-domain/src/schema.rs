//! The Offering Memorandum extraction schema
//!
//! 19 fields partitioned into 4 extraction groups:
//!
//! | Group | Name                | Fields |
//! |-------|---------------------|--------|
//! | 1     | Property & Location | 5      |
//! | 2     | Financial Details   | 6      |
//! | 3     | Physical Property   | 4      |
//! | 4     | Lease Details       | 4      |
//!
//! Group 0 is the synthetic combined group used when all fields are
//! requested in a single prompt.

use serde::Serialize;
use std::fmt;

/// Identifier of a field group (1..=4, or 0 for the combined group)
pub type GroupId = u8;

/// Number of fields in the schema
pub const FIELD_COUNT: usize = 19;

/// Semantic type of an extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text, trimmed
    Text,

    /// Decimal number (currency, area, percentages, years)
    Decimal,

    /// Calendar date, normalized to ISO `YYYY-MM-DD`
    Date,
}

impl FieldType {
    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
        }
    }

    /// Output format instruction given to the model for this type
    pub fn format_hint(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Decimal => "decimal number only (no $, commas, % or units)",
            FieldType::Date => "date in YYYY-MM-DD format (YYYY-01-01 if only the year is known)",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a single extractable field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Machine name, used as the JSON key in prompts and records
    pub name: &'static str,

    /// Human readable label
    pub label: &'static str,

    /// Semantic type
    pub field_type: FieldType,

    /// Owning group (1..=4)
    pub group: GroupId,

    /// Whether a complete record must have this field
    pub required: bool,

    /// What the field means, as explained to the model
    pub description: &'static str,
}

/// A fixed subset of fields extracted together in one model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGroup {
    id: GroupId,
    name: &'static str,
    start: usize,
    len: usize,
}

impl FieldGroup {
    /// Group identifier
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fields belonging to this group, in schema order
    pub fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS[self.start..self.start + self.len]
    }

    /// Number of fields in this group
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the group has no fields (never the case for schema groups)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the group contains a field with this name
    pub fn contains(&self, field_name: &str) -> bool {
        self.fields().iter().any(|f| f.name == field_name)
    }
}

const fn field(
    name: &'static str,
    label: &'static str,
    field_type: FieldType,
    group: GroupId,
    required: bool,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        field_type,
        group,
        required,
        description,
    }
}

use FieldType::{Date, Decimal, Text};

#[rustfmt::skip]
static FIELDS: [FieldSpec; FIELD_COUNT] = [
    // Group 1: Property & Location
    field("tenant_name", "Tenant Name", Text, 1, true, "The name of the tenant/lessee"),
    field("property_address", "Property Address", Text, 1, true, "The full street address of the property"),
    field("city", "City", Text, 1, true, "The city where the property is located"),
    field("state", "State", Text, 1, true, "The state where the property is located"),
    field("submarket_name", "Submarket Name", Text, 1, false, "The submarket or area name"),
    // Group 2: Financial Details
    field("sales_price", "Sales Price", Decimal, 2, true, "The asking or sale price of the property"),
    field("annual_rent", "Annual Rent", Decimal, 2, true, "The annual rent amount"),
    field("lease_type", "Lease Type", Text, 2, true, "Type of lease (e.g., NNN, Gross, Modified Gross)"),
    field("increases", "Increases", Text, 2, false, "Rent increase description (e.g., \"3% annually\", \"5% every 5 years\")"),
    field("numerical_rent_increase", "Numerical Rent Increase", Decimal, 2, false, "The percentage value of each rent increase"),
    field("frequency_of_rent_increase", "Frequency of Rent Increase", Decimal, 2, false, "The number of years between rent increases"),
    // Group 3: Physical Property
    field("year_built_renovated", "Year Built/Renovated", Decimal, 3, false, "Year the building was built or last renovated"),
    field("building_sf", "Building SF", Decimal, 3, true, "Building size in square feet"),
    field("land_acres", "Land (Acres)", Decimal, 3, false, "Land area in acres"),
    field("landlord_expense_responsibilities", "Landlord Expense Responsibilities", Text, 3, false, "Expenses the landlord is responsible for"),
    // Group 4: Lease Details
    field("sale_date", "Sale Date", Date, 4, false, "The date of sale or transaction"),
    field("lease_expiration_date", "Lease Expiration Date", Date, 4, true, "When the lease expires"),
    field("guarantor_operator", "Guarantor (Operator)", Text, 4, false, "The lease guarantor or operator"),
    field("rent_commencement_date", "Rent Commencement Date", Date, 4, false, "When rent payments begin"),
];

#[rustfmt::skip]
static GROUPS: [FieldGroup; 4] = [
    FieldGroup { id: 1, name: "Property & Location", start: 0, len: 5 },
    FieldGroup { id: 2, name: "Financial Details", start: 5, len: 6 },
    FieldGroup { id: 3, name: "Physical Property", start: 11, len: 4 },
    FieldGroup { id: 4, name: "Lease Details", start: 15, len: 4 },
];

static COMBINED: FieldGroup = FieldGroup {
    id: 0,
    name: "All Fields",
    start: 0,
    len: FIELD_COUNT,
};

/// Read-only access to the static extraction schema
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// All fields in schema order (group-major)
    pub fn fields() -> &'static [FieldSpec] {
        &FIELDS
    }

    /// The 4 extraction groups, ordered by id
    pub fn groups() -> &'static [FieldGroup] {
        &GROUPS
    }

    /// The synthetic group holding every field (id 0)
    pub fn combined_group() -> &'static FieldGroup {
        &COMBINED
    }

    /// Look up a field by machine name
    pub fn field(name: &str) -> Option<&'static FieldSpec> {
        FIELDS.iter().find(|f| f.name == name)
    }

    /// Look up a group by id; 0 yields the combined group
    pub fn group(id: GroupId) -> Option<&'static FieldGroup> {
        if id == COMBINED.id {
            return Some(&COMBINED);
        }
        GROUPS.iter().find(|g| g.id == id)
    }

    /// Fields a complete record must contain
    pub fn required_fields() -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS.iter().filter(|f| f.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_schema_has_19_unique_fields() {
        let names: HashSet<_> = SchemaRegistry::fields().iter().map(|f| f.name).collect();
        assert_eq!(names.len(), FIELD_COUNT);
    }

    #[test]
    fn test_group_sizes() {
        let sizes: Vec<_> = SchemaRegistry::groups().iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![5, 6, 4, 4]);
    }

    #[test]
    fn test_groups_partition_fields() {
        let mut seen = HashSet::new();
        for group in SchemaRegistry::groups() {
            for field in group.fields() {
                assert_eq!(field.group, group.id(), "{} in wrong group", field.name);
                assert!(seen.insert(field.name), "{} appears twice", field.name);
            }
        }
        assert_eq!(seen.len(), FIELD_COUNT);
    }

    #[test]
    fn test_combined_group_covers_everything() {
        let combined = SchemaRegistry::combined_group();
        assert_eq!(combined.id(), 0);
        assert_eq!(combined.fields().len(), FIELD_COUNT);
        assert_eq!(SchemaRegistry::group(0), Some(combined));
    }

    #[test]
    fn test_field_lookup() {
        let field = SchemaRegistry::field("sales_price").unwrap();
        assert_eq!(field.field_type, FieldType::Decimal);
        assert_eq!(field.group, 2);
        assert!(SchemaRegistry::field("latitude").is_none());
    }

    #[test]
    fn test_group_lookup() {
        assert_eq!(SchemaRegistry::group(4).unwrap().name(), "Lease Details");
        assert!(SchemaRegistry::group(5).is_none());
        assert!(SchemaRegistry::group(3).unwrap().contains("land_acres"));
    }

    #[test]
    fn test_date_fields() {
        let dates: Vec<_> = SchemaRegistry::fields()
            .iter()
            .filter(|f| f.field_type == FieldType::Date)
            .map(|f| f.name)
            .collect();
        assert_eq!(
            dates,
            vec!["sale_date", "lease_expiration_date", "rent_commencement_date"]
        );
    }

    #[test]
    fn test_required_fields_nonempty() {
        assert!(SchemaRegistry::required_fields().count() > 0);
        assert!(SchemaRegistry::required_fields().any(|f| f.name == "tenant_name"));
    }
}

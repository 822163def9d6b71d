//! Canonical property record schema
//!
//! Pure data: the field list, in the column order used by the import
//! template and every export format.

use serde::{Deserialize, Serialize};

/// Field names, as they appear in file headers
pub mod fields {
    pub const NAME: &str = "name";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const ZIP_CODE: &str = "zipCode";
    pub const COUNTRY: &str = "country";
    pub const PROPERTY_TYPE: &str = "propertyType";
    pub const CLIENT_ID: &str = "clientId";
    pub const TIMEZONE: &str = "timezone";
    pub const EMERGENCY_CONTACT_NAME: &str = "emergencyContactName";
    pub const EMERGENCY_CONTACT_PHONE: &str = "emergencyContactPhone";
    pub const EMERGENCY_CONTACT_EMAIL: &str = "emergencyContactEmail";
    pub const ACCESS_CODE: &str = "accessCode";
}

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Enum,
    Email,
    Phone,
    TimezoneId,
}

/// Extra format constraint for text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextFormat {
    PostalCode,
    Identifier,
}

/// Definition of one property-record attribute
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Allowed values for `FieldKind::Enum`
    pub values: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Values shorter than this import with a warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length_hint: Option<usize>,
    /// Alternative header spellings accepted on import
    #[serde(skip)]
    pub aliases: &'static [&'static str],
}

impl SchemaField {
    fn text(name: &'static str, required: bool, max_length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            required,
            values: &[],
            format: None,
            max_length: Some(max_length),
            min_length_hint: None,
            aliases: &[],
        }
    }

    fn of_kind(name: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            name,
            kind,
            required,
            values: &[],
            format: None,
            max_length: None,
            min_length_hint: None,
            aliases: &[],
        }
    }

    fn with_format(mut self, format: TextFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn with_values(mut self, values: &'static [&'static str]) -> Self {
        self.values = values;
        self
    }

    fn with_min_length_hint(mut self, min: usize) -> Self {
        self.min_length_hint = Some(min);
        self
    }

    fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// True if `header` names this field (case-insensitive, aliases included)
    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.name)
            || self.aliases.iter().any(|a| header.eq_ignore_ascii_case(a))
    }
}

/// Ordered list of schema fields
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// The canonical property schema
    pub fn property() -> Self {
        use fields::*;

        Self::new(vec![
            SchemaField::text(NAME, true, 200).with_aliases(&["property_name", "property"]),
            SchemaField::text(ADDRESS, true, 300).with_aliases(&["street", "street_address"]),
            SchemaField::text(CITY, true, 100),
            SchemaField::text(STATE, true, 100).with_aliases(&["province", "region"]),
            SchemaField::text(ZIP_CODE, true, 10)
                .with_format(TextFormat::PostalCode)
                .with_aliases(&["zip", "zip_code", "postal_code", "postalCode"]),
            SchemaField::text(COUNTRY, true, 100),
            SchemaField::of_kind(PROPERTY_TYPE, FieldKind::Enum, true)
                .with_values(PropertyType::VALUES)
                .with_aliases(&["property_type", "type"]),
            SchemaField::text(CLIENT_ID, true, 64)
                .with_format(TextFormat::Identifier)
                .with_aliases(&["client_id", "client"]),
            SchemaField::of_kind(TIMEZONE, FieldKind::TimezoneId, false)
                .with_aliases(&["time_zone", "tz"]),
            SchemaField::text(EMERGENCY_CONTACT_NAME, false, 200)
                .with_aliases(&["emergency_contact_name", "emergency_contact"]),
            SchemaField::of_kind(EMERGENCY_CONTACT_PHONE, FieldKind::Phone, false)
                .with_aliases(&["emergency_contact_phone", "emergency_phone"]),
            SchemaField::of_kind(EMERGENCY_CONTACT_EMAIL, FieldKind::Email, false)
                .with_aliases(&["emergency_contact_email", "emergency_email"]),
            SchemaField::text(ACCESS_CODE, false, 32)
                .with_min_length_hint(4)
                .with_aliases(&["access_code", "gate_code"]),
        ])
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declaration order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Find the schema field a header refers to
    pub fn field_for_header(&self, header: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.matches_header(header))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::property()
    }
}

// =============================================================================
// ENUMERATED VALUES
// =============================================================================

/// Kind of guarded property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
    Retail,
    Office,
    Warehouse,
    Healthcare,
    Education,
    Government,
    MixedUse,
}

impl PropertyType {
    pub const VALUES: &'static [&'static str] = &[
        "residential",
        "commercial",
        "industrial",
        "retail",
        "office",
        "warehouse",
        "healthcare",
        "education",
        "government",
        "mixed_use",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Residential => "residential",
            PropertyType::Commercial => "commercial",
            PropertyType::Industrial => "industrial",
            PropertyType::Retail => "retail",
            PropertyType::Office => "office",
            PropertyType::Warehouse => "warehouse",
            PropertyType::Healthcare => "healthcare",
            PropertyType::Education => "education",
            PropertyType::Government => "government",
            PropertyType::MixedUse => "mixed_use",
        }
    }

    /// Parse a canonical value (as produced by the validator)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "residential" => Some(PropertyType::Residential),
            "commercial" => Some(PropertyType::Commercial),
            "industrial" => Some(PropertyType::Industrial),
            "retail" => Some(PropertyType::Retail),
            "office" => Some(PropertyType::Office),
            "warehouse" => Some(PropertyType::Warehouse),
            "healthcare" => Some(PropertyType::Healthcare),
            "education" => Some(PropertyType::Education),
            "government" => Some(PropertyType::Government),
            "mixed_use" => Some(PropertyType::MixedUse),
            _ => None,
        }
    }
}

/// Lifecycle status of a stored property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Archived,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "active",
            PropertyStatus::Inactive => "inactive",
            PropertyStatus::Pending => "pending",
            PropertyStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(PropertyStatus::Active),
            "inactive" => Some(PropertyStatus::Inactive),
            "pending" => Some(PropertyStatus::Pending),
            "archived" => Some(PropertyStatus::Archived),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_schema_column_order_matches_template_contract() {
        let schema = Schema::property();
        let names = schema.column_names();
        assert_eq!(
            &names[..9],
            &[
                "name", "address", "city", "state", "zipCode", "country",
                "propertyType", "clientId", "timezone"
            ]
        );
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn test_first_eight_fields_are_required() {
        let schema = Schema::property();
        let required: Vec<_> = schema.fields().iter().filter(|f| f.required).map(|f| f.name).collect();
        assert_eq!(required.len(), 8);
        assert!(!schema.field(fields::TIMEZONE).unwrap().required);
    }

    #[test]
    fn test_header_matching_uses_aliases_case_insensitively() {
        let schema = Schema::property();
        assert_eq!(schema.field_for_header(" ZIP_CODE ").unwrap().name, "zipCode");
        assert_eq!(schema.field_for_header("PropertyType").unwrap().name, "propertyType");
        assert!(schema.field_for_header("notes").is_none());
    }

    #[test]
    fn test_property_type_values_round_trip_through_parse() {
        for value in PropertyType::VALUES {
            let parsed = PropertyType::parse(value).unwrap();
            assert_eq!(parsed.as_str(), *value);
        }
    }

    #[test]
    fn test_property_type_serializes_snake_case() {
        let json = serde_json::to_string(&PropertyType::MixedUse).unwrap();
        assert_eq!(json, "\"mixed_use\"");
    }

    #[test]
    fn test_property_status_parse_is_case_insensitive() {
        assert_eq!(PropertyStatus::parse(" Active "), Some(PropertyStatus::Active));
        assert_eq!(PropertyStatus::parse("deleted"), None);
    }
}

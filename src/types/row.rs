//! Tabular input rows and field-level issues

use serde::{Deserialize, Serialize};

use super::schema::SchemaField;

/// Whether an issue blocks the row from import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation or persistence problem attached to a row and field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// 0-based data row index in the source file
    pub row: usize,
    pub field: String,
    /// Raw offending value, if there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
    pub severity: Severity,
}

impl FieldError {
    pub fn error(
        row: usize,
        field: impl Into<String>,
        value: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            value: value.map(str::to_string),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(
        row: usize,
        field: impl Into<String>,
        value: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            value: value.map(str::to_string),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// One data line of an uploaded file.
///
/// The index is assigned once by the parser and cannot be changed afterwards;
/// every issue reported for this row carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    index: usize,
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(index: usize, cells: Vec<(String, String)>) -> Self {
        Self { index, cells }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw value of the first column that names `field`
    pub fn get(&self, field: &SchemaField) -> Option<&str> {
        self.cells
            .iter()
            .find(|(header, _)| field.matches_header(header))
            .map(|(_, value)| value.as_str())
    }

    /// Raw value under an exact header
    pub fn value_of(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
impl RawRow {
    /// Header/value pairs in file column order
    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }
}

/// Parsed upload: header row plus data rows
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Normalized values of a row that passed validation, in schema order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub row: usize,
    pub values: Vec<(&'static str, String)>,
}

impl CandidateRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::{fields, Schema};

    #[test]
    fn test_field_error_serializes_to_camel_case() {
        let err = FieldError::error(1, "name", None, "required");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["row"], 1);
        assert_eq!(json["field"], "name");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["message"], "required");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_warning_is_not_blocking() {
        assert!(!FieldError::warning(0, "accessCode", Some("12"), "short").is_blocking());
        assert!(FieldError::error(0, "name", None, "required").is_blocking());
    }

    #[test]
    fn test_raw_row_get_resolves_alias_headers() {
        let schema = Schema::property();
        let row = RawRow::new(
            4,
            vec![
                ("Zip".to_string(), "78704".to_string()),
                ("name".to_string(), "HQ".to_string()),
            ],
        );
        let zip = schema.field(fields::ZIP_CODE).unwrap();
        assert_eq!(row.get(zip), Some("78704"));
        assert_eq!(row.index(), 4);
        assert_eq!(row.value_of("name"), Some("HQ"));
    }
}

//! Import preview returned before a file is committed

use serde::{Deserialize, Serialize};

use super::row::FieldError;

/// One row of the bounded preview sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub row: usize,
    /// Cell values aligned with `ImportPreview::columns`
    pub values: Vec<String>,
    pub valid: bool,
}

/// Human-reviewable summary of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    /// Header columns as encountered in the file
    pub columns: Vec<String>,
    /// Required schema columns the header does not provide
    pub missing_columns: Vec<String>,
    /// Header columns the schema does not know (ignored on import)
    pub unknown_columns: Vec<String>,
    /// First rows of the file, valid and invalid, in file order
    pub sample: Vec<PreviewRow>,
    /// First issues in row order (errors and warnings)
    pub errors: Vec<FieldError>,
    /// True number of error-severity issues
    pub error_total: usize,
    /// True number of warning-severity issues
    pub warning_total: usize,
}

impl ImportPreview {
    pub fn is_consistent(&self) -> bool {
        self.valid_rows + self.invalid_rows == self.total_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_preview_serializes_to_camel_case() {
        let preview = ImportPreview {
            total_rows: 3,
            valid_rows: 2,
            invalid_rows: 1,
            columns: vec!["name".to_string()],
            missing_columns: vec![],
            unknown_columns: vec![],
            sample: vec![],
            errors: vec![FieldError::error(1, "name", None, "required")],
            error_total: 1,
            warning_total: 0,
        };
        let json = serde_json::to_string(&preview).unwrap();
        assert!(json.contains("totalRows"));
        assert!(json.contains("invalidRows"));
        assert!(json.contains("errorTotal"));
        assert!(preview.is_consistent());
    }
}

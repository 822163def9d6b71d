//! Export options, filters and file transfer payloads

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::property::PropertyRecord;
use super::schema::{PropertyStatus, PropertyType};

/// Interchange format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Spreadsheet,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

/// Record filter applied before serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilter {
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Inclusive lower bound on the creation date
    #[serde(default)]
    pub created_from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date
    #[serde(default)]
    pub created_to: Option<NaiveDate>,
}

impl ExportFilter {
    pub fn matches(&self, record: &PropertyRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(property_type) = self.property_type {
            if record.draft.property_type != property_type {
                return false;
            }
        }
        if let Some(ref client_id) = self.client_id {
            if &record.draft.client_id != client_id {
                return false;
            }
        }
        let created = record.created_at.date_naive();
        if let Some(from) = self.created_from {
            if created < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if created > to {
                return false;
            }
        }
        true
    }
}

/// Export request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub format: ExportFormat,
    /// Append image reference URLs (never inline payloads)
    #[serde(default)]
    pub include_images: bool,
    /// Append creation/update timestamps
    #[serde(default)]
    pub include_metadata: bool,
    #[serde(default)]
    pub filters: Option<ExportFilter>,
}

/// Finished export kept on the operation until it is dismissed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// =============================================================================
// FILE TRANSFER PAYLOADS
// =============================================================================

/// Uploaded file, base64 encoded for transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub filename: String,
    pub file_base64: String,
}

/// Template download request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    #[serde(default)]
    pub format: ExportFormat,
}

/// Downloaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub filename: String,
    pub content_type: String,
    pub file_base64: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::property::fixtures;

    #[test]
    fn test_export_options_defaults_from_empty_object() {
        let options: ExportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.format, ExportFormat::Csv);
        assert!(!options.include_images);
        assert!(options.filters.is_none());
    }

    #[test]
    fn test_export_options_deserializes_filters() {
        let json = r#"{"format":"spreadsheet","includeMetadata":true,
            "filters":{"status":"active","propertyType":"retail","createdFrom":"2026-01-01"}}"#;
        let options: ExportOptions = serde_json::from_str(json).unwrap();
        let filters = options.filters.unwrap();
        assert_eq!(options.format, ExportFormat::Spreadsheet);
        assert_eq!(filters.status, Some(PropertyStatus::Active));
        assert_eq!(filters.property_type, Some(PropertyType::Retail));
        assert_eq!(filters.created_from, NaiveDate::from_ymd_opt(2026, 1, 1));
    }

    #[test]
    fn test_filter_by_status() {
        let filter = ExportFilter {
            status: Some(PropertyStatus::Active),
            ..Default::default()
        };
        assert!(filter.matches(&fixtures::record("1", "A", PropertyStatus::Active)));
        assert!(!filter.matches(&fixtures::record("2", "B", PropertyStatus::Archived)));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        // fixture records are created on 2026-03-14
        let record = fixtures::record("1", "A", PropertyStatus::Active);
        let day = NaiveDate::from_ymd_opt(2026, 3, 14);
        let filter = ExportFilter {
            created_from: day,
            created_to: day,
            ..Default::default()
        };
        assert!(filter.matches(&record));

        let later = ExportFilter {
            created_from: NaiveDate::from_ymd_opt(2026, 3, 15),
            ..Default::default()
        };
        assert!(!later.matches(&record));
    }

    #[test]
    fn test_filter_by_client_and_type() {
        let record = fixtures::record("1", "A", PropertyStatus::Active);
        let matching = ExportFilter {
            client_id: Some("CLIENT-1".to_string()),
            property_type: Some(PropertyType::Commercial),
            ..Default::default()
        };
        assert!(matching.matches(&record));

        let other_client = ExportFilter {
            client_id: Some("CLIENT-2".to_string()),
            ..Default::default()
        };
        assert!(!other_client.matches(&record));
    }

    #[test]
    fn test_format_serializes_lowercase_with_xlsx_extension() {
        assert_eq!(serde_json::to_string(&ExportFormat::Spreadsheet).unwrap(), "\"spreadsheet\"");
        assert_eq!(ExportFormat::Spreadsheet.extension(), "xlsx");
    }
}

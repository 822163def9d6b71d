//! Export serialization
//!
//! Filters stored records and renders them as CSV, an xlsx workbook or a JSON
//! array. Column order is always the schema order followed by `id`, `status`
//! and the optional metadata/image columns, so an export can be edited and
//! fed back through import.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::types::{ExportArtifact, ExportFormat, ExportOptions, PropertyRecord, Schema};

pub const WORKSHEET_NAME: &str = "Properties";

/// Separator for image URLs in tabular formats
const IMAGE_URL_SEPARATOR: &str = ";";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export cancelled")]
    Cancelled,

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet serialization failed: {0}")]
    Spreadsheet(#[from] XlsxError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Field(&'static str),
    Id,
    Status,
    CreatedAt,
    UpdatedAt,
    ImageUrls,
}

impl Column {
    fn header(&self) -> &'static str {
        match self {
            Column::Field(name) => *name,
            Column::Id => "id",
            Column::Status => "status",
            Column::CreatedAt => "createdAt",
            Column::UpdatedAt => "updatedAt",
            Column::ImageUrls => "imageUrls",
        }
    }

    /// Cell text for tabular formats
    fn text(&self, record: &PropertyRecord) -> String {
        match self {
            Column::Field(name) => record.column_value(name).unwrap_or_default(),
            Column::Id => record.id.clone(),
            Column::Status => record.status.as_str().to_string(),
            Column::CreatedAt => timestamp(&record.created_at),
            Column::UpdatedAt => timestamp(&record.updated_at),
            Column::ImageUrls => record.image_urls.join(IMAGE_URL_SEPARATOR),
        }
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn columns(schema: &Schema, options: &ExportOptions) -> Vec<Column> {
    let mut columns: Vec<Column> = schema.column_names().into_iter().map(Column::Field).collect();
    columns.push(Column::Id);
    columns.push(Column::Status);
    if options.include_metadata {
        columns.push(Column::CreatedAt);
        columns.push(Column::UpdatedAt);
    }
    if options.include_images {
        columns.push(Column::ImageUrls);
    }
    columns
}

/// Records matching the export filter, in store order
pub fn select<'a>(records: &'a [PropertyRecord], options: &ExportOptions) -> Vec<&'a PropertyRecord> {
    match &options.filters {
        Some(filter) => records.iter().filter(|r| filter.matches(r)).collect(),
        None => records.iter().collect(),
    }
}

/// Serialize already-selected records
pub fn serialize(
    records: &[&PropertyRecord],
    schema: &Schema,
    options: &ExportOptions,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(),
) -> Result<Vec<u8>, ExportError> {
    let columns = columns(schema, options);
    match options.format {
        ExportFormat::Csv => write_csv(records, &columns, cancel, on_progress),
        ExportFormat::Spreadsheet => write_spreadsheet(records, &columns, cancel, on_progress),
        ExportFormat::Json => write_json(records, &columns, cancel, on_progress),
    }
}

/// Wrap finished bytes as a downloadable file
pub fn artifact(format: ExportFormat, bytes: Vec<u8>, at: DateTime<Utc>) -> ExportArtifact {
    ExportArtifact {
        filename: format!("properties-export-{}.{}", at.format("%Y%m%d-%H%M%S"), format.extension()),
        content_type: format.content_type().to_string(),
        bytes,
    }
}

fn write_csv(
    records: &[&PropertyRecord],
    columns: &[Column],
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(),
) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(Column::header))?;

    for record in records {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        writer.write_record(columns.iter().map(|c| c.text(record)))?;
        on_progress();
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

fn write_spreadsheet(
    records: &[&PropertyRecord],
    columns: &[Column],
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(),
) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(WORKSHEET_NAME)?;

        for (col, column) in columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, column.header(), &bold)?;
        }

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            let row = i as u32 + 1;
            for (col, column) in columns.iter().enumerate() {
                worksheet.write_string(row, col as u16, column.text(record))?;
            }
            on_progress();
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// One record as a JSON object with keys in column order
struct JsonRow<'a> {
    record: &'a PropertyRecord,
    columns: &'a [Column],
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            match column {
                Column::Field(name) => {
                    map.serialize_entry(name, &self.record.column_value(name))?
                }
                Column::ImageUrls => map.serialize_entry("imageUrls", &self.record.image_urls)?,
                other => map.serialize_entry(other.header(), &other.text(self.record))?,
            }
        }
        map.end()
    }
}

fn write_json(
    records: &[&PropertyRecord],
    columns: &[Column],
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(),
) -> Result<Vec<u8>, ExportError> {
    let mut rows = Vec::with_capacity(records.len());
    for &record in records {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        rows.push(JsonRow { record, columns });
        on_progress();
    }
    Ok(serde_json::to_vec_pretty(&rows)?)
}

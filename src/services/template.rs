//! Import template generation
//!
//! Header row in schema order plus two example rows that pass validation,
//! so a user can fill the template in without reading any documentation.

use rust_xlsxwriter::{Format, Workbook};

use crate::error::{InputRejection, PipelineError};
use crate::types::{fields, ExportArtifact, ExportFormat, Schema};

const TEMPLATE_BASENAME: &str = "property-import-template";
const TEMPLATE_SHEET: &str = "Properties";

const EXAMPLE_ROWS: [&[(&str, &str)]; 2] = [
    &[
        (fields::NAME, "Riverside Plaza"),
        (fields::ADDRESS, "1200 Riverside Dr"),
        (fields::CITY, "Austin"),
        (fields::STATE, "TX"),
        (fields::ZIP_CODE, "78704"),
        (fields::COUNTRY, "US"),
        (fields::PROPERTY_TYPE, "commercial"),
        (fields::CLIENT_ID, "CLIENT-1001"),
        (fields::TIMEZONE, "America/Chicago"),
        (fields::EMERGENCY_CONTACT_NAME, "Dana Reyes"),
        (fields::EMERGENCY_CONTACT_PHONE, "+1 512 555 0142"),
        (fields::EMERGENCY_CONTACT_EMAIL, "security@riversideplaza.example"),
        (fields::ACCESS_CODE, "4821"),
    ],
    &[
        (fields::NAME, "Oak Hollow Apartments"),
        (fields::ADDRESS, "88 Oak Hollow Ln"),
        (fields::CITY, "Portland"),
        (fields::STATE, "OR"),
        (fields::ZIP_CODE, "97205"),
        (fields::COUNTRY, "US"),
        (fields::PROPERTY_TYPE, "residential"),
        (fields::CLIENT_ID, "CLIENT-1002"),
        (fields::TIMEZONE, "America/Los_Angeles"),
        (fields::EMERGENCY_CONTACT_NAME, "Sam Okafor"),
        (fields::EMERGENCY_CONTACT_PHONE, "+1 503 555 0199"),
        (fields::EMERGENCY_CONTACT_EMAIL, "manager@oakhollow.example"),
        (fields::ACCESS_CODE, "7734"),
    ],
];

/// Example rows aligned to the schema's column order
fn example_rows(schema: &Schema) -> Vec<Vec<&'static str>> {
    EXAMPLE_ROWS
        .iter()
        .map(|example| {
            schema
                .column_names()
                .into_iter()
                .map(|column| {
                    example
                        .iter()
                        .find(|(name, _)| *name == column)
                        .map_or("", |(_, value)| *value)
                })
                .collect()
        })
        .collect()
}

/// CSV template
pub fn generate(schema: &Schema) -> Result<Vec<u8>, PipelineError> {
    let systemic = |e: csv::Error| PipelineError::Systemic(format!("template generation failed: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(schema.column_names()).map_err(systemic)?;
    for row in example_rows(schema) {
        writer.write_record(row).map_err(systemic)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Systemic(format!("template generation failed: {}", e.error())))
}

/// xlsx template with a bold header row
pub fn generate_spreadsheet(schema: &Schema) -> Result<Vec<u8>, PipelineError> {
    let systemic = |e: rust_xlsxwriter::XlsxError| {
        PipelineError::Systemic(format!("template generation failed: {}", e))
    };

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(TEMPLATE_SHEET).map_err(systemic)?;

        for (col, name) in schema.column_names().into_iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, name, &bold)
                .map_err(systemic)?;
            worksheet.set_column_width(col as u16, 22).map_err(systemic)?;
        }
        for (i, row) in example_rows(schema).into_iter().enumerate() {
            for (col, value) in row.into_iter().enumerate() {
                worksheet
                    .write_string(i as u32 + 1, col as u16, value)
                    .map_err(systemic)?;
            }
        }
    }
    workbook.save_to_buffer().map_err(systemic)
}

/// Template as a downloadable file
pub fn generate_file(schema: &Schema, format: ExportFormat) -> Result<ExportArtifact, PipelineError> {
    let bytes = match format {
        ExportFormat::Csv => generate(schema)?,
        ExportFormat::Spreadsheet => generate_spreadsheet(schema)?,
        ExportFormat::Json => {
            return Err(InputRejection::InvalidRequest(
                "templates are available as csv or spreadsheet".to_string(),
            )
            .into())
        }
    };
    Ok(ExportArtifact {
        filename: format!("{}.{}", TEMPLATE_BASENAME, format.extension()),
        content_type: format.content_type().to_string(),
        bytes,
    })
}

//! Upload intake
//!
//! Turns an uploaded file into a `ParsedTable`. Every check that can refuse
//! the whole file runs here, before a single row is classified.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::debug;

use crate::defaults::{DEFAULT_MAX_IMPORT_ROWS, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::InputRejection;
use crate::types::{ParsedTable, RawRow};

const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "ods"];
const UTF8_BOM: &str = "\u{feff}";

/// An uploaded file, already decoded from the transport
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_lowercase())
    }
}

/// Size and row caps applied to uploads
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub max_rows: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_rows: DEFAULT_MAX_IMPORT_ROWS,
        }
    }
}

/// Parse an upload into header + data rows
pub fn parse_upload(file: &UploadedFile, limits: UploadLimits) -> Result<ParsedTable, InputRejection> {
    if file.bytes.len() > limits.max_bytes {
        return Err(InputRejection::TooLarge {
            size: file.bytes.len(),
            limit: limits.max_bytes,
        });
    }

    let extension = file.extension().unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(InputRejection::UnsupportedExtension(file.filename.clone()));
    }

    let records = if extension == "csv" {
        read_csv(&file.bytes)?
    } else {
        read_spreadsheet(&file.bytes)?
    };

    let table = into_table(records)?;
    if table.rows.len() > limits.max_rows {
        return Err(InputRejection::TooManyRows {
            rows: table.rows.len(),
            limit: limits.max_rows,
        });
    }

    debug!(
        "Parsed upload {}: {} columns, {} rows",
        file.filename,
        table.columns.len(),
        table.rows.len()
    );
    Ok(table)
}

/// Pick `;` when the header line has more of them than commas
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    let commas = header.matches(',').count();
    let semicolons = header.matches(';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, InputRejection> {
    let content = std::str::from_utf8(bytes)
        .map_err(|_| InputRejection::Unparseable("file is not valid UTF-8".to_string()))?;
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| InputRejection::Unparseable(e.to_string()))?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, InputRejection> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| InputRejection::Unparseable(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| InputRejection::Unparseable(e.to_string()))?,
        None => return Err(InputRejection::MissingHeader),
    };
    Ok(range_to_records(&range))
}

fn range_to_records(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

/// Split off the header, index the data rows by source position, then drop blank lines
fn into_table(records: Vec<Vec<String>>) -> Result<ParsedTable, InputRejection> {
    let mut records = records.into_iter();

    let columns: Vec<String> = match records.next() {
        Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
        None => return Err(InputRejection::MissingHeader),
    };
    if columns.iter().all(|c| c.is_empty()) {
        return Err(InputRejection::MissingHeader);
    }

    for (i, column) in columns.iter().enumerate() {
        if column.is_empty() {
            continue;
        }
        if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(column)) {
            return Err(InputRejection::DuplicateColumn(column.clone()));
        }
    }

    let rows = records
        .enumerate()
        .filter(|(_, values)| values.iter().any(|v| !v.trim().is_empty()))
        .map(|(index, values)| {
            let cells = columns
                .iter()
                .zip(values.into_iter().chain(std::iter::repeat(String::new())))
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, value)| (header.clone(), value))
                .collect();
            RawRow::new(index, cells)
        })
        .collect();

    Ok(ParsedTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(content: &str) -> UploadedFile {
        UploadedFile::new("properties.csv", content.as_bytes().to_vec())
    }

    #[test]
    fn test_parses_comma_separated_with_bom() {
        let table = parse_upload(
            &csv_file("\u{feff}name,city\nA,Austin\nB,Portland\n"),
            UploadLimits::default(),
        )
        .unwrap();
        assert_eq!(table.columns, vec!["name", "city"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].index(), 1);
        assert_eq!(table.rows[1].value_of("city"), Some("Portland"));
    }

    #[test]
    fn test_sniffs_semicolon_delimiter() {
        let table = parse_upload(&csv_file("name;city\nA;Brno\n"), UploadLimits::default()).unwrap();
        assert_eq!(table.columns, vec!["name", "city"]);
        assert_eq!(table.rows[0].value_of("city"), Some("Brno"));
    }

    #[test]
    fn test_short_rows_are_padded_and_blank_lines_skipped() {
        let table = parse_upload(&csv_file("name,city\nA\n,\nB,X\n"), UploadLimits::default()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].value_of("city"), Some(""));
        assert_eq!(table.rows[1].index(), 2);
    }

    #[test]
    fn test_row_index_counts_skipped_blank_lines() {
        let table = parse_upload(
            &csv_file("name,city
A,Austin
 , 
,
B,Boise
"),
            UploadLimits::default(),
        )
        .unwrap();
        let indices: Vec<usize> = table.rows.iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(table.rows[1].value_of("name"), Some("B"));
    }

    #[test]
    fn test_rejects_oversize_before_parsing() {
        let file = UploadedFile::new("big.csv", vec![0xff; 64]);
        let limits = UploadLimits { max_bytes: 10, max_rows: 10 };
        assert_eq!(
            parse_upload(&file, limits).unwrap_err(),
            InputRejection::TooLarge { size: 64, limit: 10 }
        );
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let file = UploadedFile::new("notes.txt", b"name\nA\n".to_vec());
        assert!(matches!(
            parse_upload(&file, UploadLimits::default()),
            Err(InputRejection::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let file = UploadedFile::new("PROPS.CSV", b"name\nA\n".to_vec());
        assert!(parse_upload(&file, UploadLimits::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_file_and_duplicate_columns() {
        assert_eq!(
            parse_upload(&csv_file(""), UploadLimits::default()).unwrap_err(),
            InputRejection::MissingHeader
        );
        assert_eq!(
            parse_upload(&csv_file("name,Name\nA,B\n"), UploadLimits::default()).unwrap_err(),
            InputRejection::DuplicateColumn("Name".to_string())
        );
    }

    #[test]
    fn test_rejects_non_utf8_csv() {
        let file = UploadedFile::new("latin.csv", vec![b'n', b'a', 0xe9, b'\n']);
        assert!(matches!(
            parse_upload(&file, UploadLimits::default()),
            Err(InputRejection::Unparseable(_))
        ));
    }

    #[test]
    fn test_rejects_too_many_rows() {
        let limits = UploadLimits { max_bytes: 1024, max_rows: 2 };
        assert_eq!(
            parse_upload(&csv_file("name\nA\nB\nC\n"), limits).unwrap_err(),
            InputRejection::TooManyRows { rows: 3, limit: 2 }
        );
    }

    #[test]
    fn test_garbage_spreadsheet_is_unparseable() {
        let file = UploadedFile::new("broken.xlsx", b"definitely not a zip archive".to_vec());
        assert!(matches!(
            parse_upload(&file, UploadLimits::default()),
            Err(InputRejection::Unparseable(_))
        ));
    }
}

//! Import preview
//!
//! Classifies every row of a parsed upload and keeps a bounded sample for
//! display. Counts always cover the whole file; only the sample and the
//! issue list are truncated.

use tokio_util::sync::CancellationToken;

use crate::defaults::{DEFAULT_PREVIEW_ERROR_LIMIT, DEFAULT_PREVIEW_SAMPLE_LIMIT};
use crate::error::PipelineError;
use crate::services::validator;
use crate::types::{ImportPreview, ParsedTable, PreviewRow, Schema, Severity};

/// Bounds on what a preview carries back to the caller
#[derive(Debug, Clone, Copy)]
pub struct PreviewLimits {
    pub sample_limit: usize,
    pub error_limit: usize,
}

impl Default for PreviewLimits {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_PREVIEW_SAMPLE_LIMIT,
            error_limit: DEFAULT_PREVIEW_ERROR_LIMIT,
        }
    }
}

/// Build a preview of `table`.
///
/// Deterministic for a given table and schema. Returns
/// `PipelineError::Cancelled` if `cancel` fires between rows.
pub fn build(
    table: &ParsedTable,
    schema: &Schema,
    limits: PreviewLimits,
    cancel: &CancellationToken,
) -> Result<ImportPreview, PipelineError> {
    let mut valid_rows = 0;
    let mut sample = Vec::with_capacity(limits.sample_limit.min(table.rows.len()));
    let mut blocking = Vec::new();
    let mut warnings = Vec::new();
    let mut error_total = 0;
    let mut warning_total = 0;

    for row in &table.rows {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let result = validator::validate(row, schema);
        let valid = result.is_valid();
        if valid {
            valid_rows += 1;
        }

        for issue in result.issues {
            let kept = match issue.severity {
                Severity::Error => {
                    error_total += 1;
                    &mut blocking
                }
                Severity::Warning => {
                    warning_total += 1;
                    &mut warnings
                }
            };
            if kept.len() < limits.error_limit {
                kept.push(issue);
            }
        }

        if sample.len() < limits.sample_limit {
            sample.push(PreviewRow {
                row: row.index(),
                values: table
                    .columns
                    .iter()
                    .map(|c| row.value_of(c).unwrap_or_default().to_string())
                    .collect(),
                valid,
            });
        }
    }

    // Blocking issues take the bounded slots before warnings do
    let mut errors = blocking;
    let room = limits.error_limit.saturating_sub(errors.len());
    errors.extend(warnings.into_iter().take(room));
    errors.sort_by_key(|e| e.row);

    let missing_columns = schema
        .fields()
        .iter()
        .filter(|f| f.required)
        .filter(|f| !table.columns.iter().any(|c| f.matches_header(c)))
        .map(|f| f.name.to_string())
        .collect();

    let unknown_columns = table
        .columns
        .iter()
        .filter(|c| !c.is_empty() && schema.field_for_header(c).is_none())
        .cloned()
        .collect();

    let preview = ImportPreview {
        total_rows: table.rows.len(),
        valid_rows,
        invalid_rows: table.rows.len() - valid_rows,
        columns: table.columns.clone(),
        missing_columns,
        unknown_columns,
        sample,
        errors,
        error_total,
        warning_total,
    };
    debug_assert!(preview.is_consistent());
    Ok(preview)
}

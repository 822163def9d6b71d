//! Row validation
//!
//! Turns one raw tabular row into either a candidate record or a list of
//! field-level issues. Pure and total: every problem is reported as a
//! `FieldError`, nothing panics or returns early.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{CandidateRecord, FieldError, FieldKind, RawRow, Schema, SchemaField, TextFormat};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,9}$").expect("valid postal code pattern"));

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid identifier pattern"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("valid phone pattern"));

static TIMEZONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)(/[A-Za-z0-9_+\-]+){1,2}$").expect("valid timezone pattern")
});

/// IANA tz database areas
const TIMEZONE_AREAS: &[&str] = &[
    "Africa", "America", "Antarctica", "Arctic", "Asia", "Atlantic",
    "Australia", "Europe", "Indian", "Pacific", "Etc",
];

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// Outcome of validating one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowValidation {
    pub row: usize,
    /// Present iff the row has no error-severity issues
    pub candidate: Option<CandidateRecord>,
    pub issues: Vec<FieldError>,
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        self.candidate.is_some()
    }
}

/// Value accepted by a field check, possibly rewritten to its canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedValue {
    pub value: String,
    pub warning: Option<String>,
}

impl CheckedValue {
    fn clean(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            warning: None,
        }
    }

    fn with_warning(value: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            warning: Some(warning.into()),
        }
    }
}

/// Validate one row against the schema.
///
/// Columns the schema does not know are ignored.
pub fn validate(row: &RawRow, schema: &Schema) -> RowValidation {
    let index = row.index();
    let mut issues = Vec::new();
    let mut values = Vec::new();

    for field in schema.fields() {
        let raw = row.get(field).map(str::trim).filter(|v| !v.is_empty());

        match raw {
            None => {
                if field.required {
                    issues.push(FieldError::error(index, field.name, None, "required"));
                }
            }
            Some(raw) => match check_value(field, raw) {
                Ok(checked) => {
                    if let Some(warning) = checked.warning {
                        issues.push(FieldError::warning(index, field.name, Some(raw), warning));
                    }
                    values.push((field.name, checked.value));
                }
                Err(message) => {
                    issues.push(FieldError::error(index, field.name, Some(raw), message));
                }
            },
        }
    }

    let candidate = if issues.iter().any(FieldError::is_blocking) {
        None
    } else {
        Some(CandidateRecord { row: index, values })
    };

    RowValidation {
        row: index,
        candidate,
        issues,
    }
}

/// Check a present, trimmed value against one field's type and format.
///
/// Returns the canonical value, or the message describing the violated
/// constraint.
pub fn check_value(field: &SchemaField, raw: &str) -> Result<CheckedValue, String> {
    let raw = raw.trim();

    if let Some(max) = field.max_length {
        if raw.chars().count() > max {
            return Err(format!("must be at most {} characters", max));
        }
    }

    let mut checked = match field.kind {
        FieldKind::Text => check_text(field, raw)?,
        FieldKind::Enum => check_enum(field, raw)?,
        FieldKind::Email => check_email(raw)?,
        FieldKind::Phone => check_phone(raw)?,
        FieldKind::TimezoneId => check_timezone(raw)?,
    };

    if checked.warning.is_none() {
        if let Some(min) = field.min_length_hint {
            if raw.chars().count() < min {
                checked.warning = Some(format!(
                    "{} shorter than {} characters",
                    human_name(field.name),
                    min
                ));
            }
        }
    }

    Ok(checked)
}

/// `accessCode` -> `access code`
fn human_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push(' ');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn check_text(field: &SchemaField, raw: &str) -> Result<CheckedValue, String> {
    match field.format {
        Some(TextFormat::PostalCode) if !POSTAL_CODE_RE.is_match(raw) => {
            Err("must be a valid postal code".to_string())
        }
        Some(TextFormat::Identifier) if !IDENTIFIER_RE.is_match(raw) => {
            Err("must contain only letters, digits, '-' or '_'".to_string())
        }
        _ => Ok(CheckedValue::clean(raw)),
    }
}

fn check_enum(field: &SchemaField, raw: &str) -> Result<CheckedValue, String> {
    let normalized: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();

    match field.values.iter().find(|v| **v == normalized) {
        Some(canonical) if *canonical == raw => Ok(CheckedValue::clean(*canonical)),
        Some(canonical) => Ok(CheckedValue::with_warning(
            *canonical,
            format!("normalized to '{}'", canonical),
        )),
        None => Err(format!("must be one of: {}", field.values.join(", "))),
    }
}

fn check_email(raw: &str) -> Result<CheckedValue, String> {
    if EMAIL_RE.is_match(raw) {
        Ok(CheckedValue::clean(raw.to_lowercase()))
    } else {
        Err("must be a valid email address".to_string())
    }
}

fn check_phone(raw: &str) -> Result<CheckedValue, String> {
    let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
    if !PHONE_RE.is_match(raw) || !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
        return Err("must be a valid phone number".to_string());
    }
    if raw.starts_with('+') {
        Ok(CheckedValue::clean(raw))
    } else {
        Ok(CheckedValue::with_warning(raw, "missing international prefix"))
    }
}

fn check_timezone(raw: &str) -> Result<CheckedValue, String> {
    if raw.eq_ignore_ascii_case("UTC") {
        return Ok(CheckedValue::clean("UTC"));
    }
    let valid = TIMEZONE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(false, |area| TIMEZONE_AREAS.contains(&area.as_str()));
    if valid {
        Ok(CheckedValue::clean(raw))
    } else {
        Err("must be an IANA timezone such as America/New_York".to_string())
    }
}

//! Typed bulk-edit updates
//!
//! One variant per editable field; an unknown field name fails to
//! deserialize instead of being silently ignored.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::property::PropertyRecord;
use super::schema::{fields, PropertyStatus, PropertyType};

/// A single field assignment, wire form `{"field": "city", "value": "Austin"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FieldUpdate {
    Name(String),
    Address(String),
    City(String),
    State(String),
    ZipCode(String),
    Country(String),
    PropertyType(PropertyType),
    ClientId(String),
    Timezone(Option<String>),
    EmergencyContactName(Option<String>),
    EmergencyContactPhone(Option<String>),
    EmergencyContactEmail(Option<String>),
    AccessCode(Option<String>),
    Status(PropertyStatus),
}

impl FieldUpdate {
    /// Schema field this update targets (`status` is store-owned, not a schema field)
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Name(_) => fields::NAME,
            FieldUpdate::Address(_) => fields::ADDRESS,
            FieldUpdate::City(_) => fields::CITY,
            FieldUpdate::State(_) => fields::STATE,
            FieldUpdate::ZipCode(_) => fields::ZIP_CODE,
            FieldUpdate::Country(_) => fields::COUNTRY,
            FieldUpdate::PropertyType(_) => fields::PROPERTY_TYPE,
            FieldUpdate::ClientId(_) => fields::CLIENT_ID,
            FieldUpdate::Timezone(_) => fields::TIMEZONE,
            FieldUpdate::EmergencyContactName(_) => fields::EMERGENCY_CONTACT_NAME,
            FieldUpdate::EmergencyContactPhone(_) => fields::EMERGENCY_CONTACT_PHONE,
            FieldUpdate::EmergencyContactEmail(_) => fields::EMERGENCY_CONTACT_EMAIL,
            FieldUpdate::AccessCode(_) => fields::ACCESS_CODE,
            FieldUpdate::Status(_) => "status",
        }
    }

    /// The new value as text, `None` when the update clears the field.
    /// Typed variants render their canonical spelling.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            FieldUpdate::Name(v)
            | FieldUpdate::Address(v)
            | FieldUpdate::City(v)
            | FieldUpdate::State(v)
            | FieldUpdate::ZipCode(v)
            | FieldUpdate::Country(v)
            | FieldUpdate::ClientId(v) => Some(v.as_str()),
            FieldUpdate::Timezone(v)
            | FieldUpdate::EmergencyContactName(v)
            | FieldUpdate::EmergencyContactPhone(v)
            | FieldUpdate::EmergencyContactEmail(v)
            | FieldUpdate::AccessCode(v) => v.as_deref(),
            FieldUpdate::PropertyType(t) => Some(t.as_str()),
            FieldUpdate::Status(s) => Some(s.as_str()),
        }
    }

    /// Same field with a new text value; typed variants are returned unchanged
    pub fn with_text_value(self, value: String) -> Self {
        match self {
            FieldUpdate::Name(_) => FieldUpdate::Name(value),
            FieldUpdate::Address(_) => FieldUpdate::Address(value),
            FieldUpdate::City(_) => FieldUpdate::City(value),
            FieldUpdate::State(_) => FieldUpdate::State(value),
            FieldUpdate::ZipCode(_) => FieldUpdate::ZipCode(value),
            FieldUpdate::Country(_) => FieldUpdate::Country(value),
            FieldUpdate::ClientId(_) => FieldUpdate::ClientId(value),
            FieldUpdate::Timezone(_) => FieldUpdate::Timezone(Some(value)),
            FieldUpdate::EmergencyContactName(_) => FieldUpdate::EmergencyContactName(Some(value)),
            FieldUpdate::EmergencyContactPhone(_) => FieldUpdate::EmergencyContactPhone(Some(value)),
            FieldUpdate::EmergencyContactEmail(_) => FieldUpdate::EmergencyContactEmail(Some(value)),
            FieldUpdate::AccessCode(_) => FieldUpdate::AccessCode(Some(value)),
            typed @ (FieldUpdate::PropertyType(_) | FieldUpdate::Status(_)) => typed,
        }
    }

    /// Same field set to empty; variants without an empty state are returned unchanged
    pub fn cleared(self) -> Self {
        match self {
            FieldUpdate::Timezone(_) => FieldUpdate::Timezone(None),
            FieldUpdate::EmergencyContactName(_) => FieldUpdate::EmergencyContactName(None),
            FieldUpdate::EmergencyContactPhone(_) => FieldUpdate::EmergencyContactPhone(None),
            FieldUpdate::EmergencyContactEmail(_) => FieldUpdate::EmergencyContactEmail(None),
            FieldUpdate::AccessCode(_) => FieldUpdate::AccessCode(None),
            other => other,
        }
    }

    /// True for variants whose value is already checked by deserialization
    pub fn is_typed(&self) -> bool {
        matches!(self, FieldUpdate::PropertyType(_) | FieldUpdate::Status(_))
    }

    /// Apply to a stored record
    pub fn apply(&self, record: &mut PropertyRecord) {
        let d = &mut record.draft;
        match self {
            FieldUpdate::Name(v) => d.name = v.clone(),
            FieldUpdate::Address(v) => d.address = v.clone(),
            FieldUpdate::City(v) => d.city = v.clone(),
            FieldUpdate::State(v) => d.state = v.clone(),
            FieldUpdate::ZipCode(v) => d.zip_code = v.clone(),
            FieldUpdate::Country(v) => d.country = v.clone(),
            FieldUpdate::PropertyType(t) => d.property_type = *t,
            FieldUpdate::ClientId(v) => d.client_id = v.clone(),
            FieldUpdate::Timezone(v) => d.timezone = v.clone(),
            FieldUpdate::EmergencyContactName(v) => d.emergency_contact_name = v.clone(),
            FieldUpdate::EmergencyContactPhone(v) => d.emergency_contact_phone = v.clone(),
            FieldUpdate::EmergencyContactEmail(v) => d.emergency_contact_email = v.clone(),
            FieldUpdate::AccessCode(v) => d.access_code = v.clone(),
            FieldUpdate::Status(s) => record.status = *s,
        }
        record.updated_at = Utc::now();
    }
}

/// Apply the same updates to many records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEditRequest {
    pub record_ids: Vec<String>,
    pub updates: Vec<FieldUpdate>,
}

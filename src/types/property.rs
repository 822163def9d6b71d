//! Property records as exchanged with the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::row::{CandidateRecord, FieldError};
use super::schema::{fields, PropertyStatus, PropertyType};

/// Typed payload for creating a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDraft {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub property_type: PropertyType,
    pub client_id: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub emergency_contact_email: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
}

impl PropertyDraft {
    /// Build the typed draft from a validated row.
    ///
    /// Fails only when the candidate was validated against a schema that
    /// lacks one of the fields the store requires.
    pub fn from_candidate(candidate: &CandidateRecord) -> Result<Self, FieldError> {
        let required = |field: &'static str| -> Result<String, FieldError> {
            candidate
                .get(field)
                .map(str::to_string)
                .ok_or_else(|| FieldError::error(candidate.row, field, None, "required"))
        };
        let optional = |field: &'static str| candidate.get(field).map(str::to_string);

        let raw_type = required(fields::PROPERTY_TYPE)?;
        let property_type = PropertyType::parse(&raw_type).ok_or_else(|| {
            FieldError::error(
                candidate.row,
                fields::PROPERTY_TYPE,
                Some(&raw_type),
                format!("must be one of: {}", PropertyType::VALUES.join(", ")),
            )
        })?;

        Ok(Self {
            name: required(fields::NAME)?,
            address: required(fields::ADDRESS)?,
            city: required(fields::CITY)?,
            state: required(fields::STATE)?,
            zip_code: required(fields::ZIP_CODE)?,
            country: required(fields::COUNTRY)?,
            property_type,
            client_id: required(fields::CLIENT_ID)?,
            timezone: optional(fields::TIMEZONE),
            emergency_contact_name: optional(fields::EMERGENCY_CONTACT_NAME),
            emergency_contact_phone: optional(fields::EMERGENCY_CONTACT_PHONE),
            emergency_contact_email: optional(fields::EMERGENCY_CONTACT_EMAIL),
            access_code: optional(fields::ACCESS_CODE),
        })
    }
}

/// A property as stored by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: String,
    #[serde(flatten)]
    pub draft: PropertyDraft,
    #[serde(default)]
    pub status: PropertyStatus,
    /// Reference URLs of uploaded images (payloads live in the gallery service)
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PropertyRecord {
    /// Value of a schema column, rendered as text
    pub fn column_value(&self, field: &str) -> Option<String> {
        let d = &self.draft;
        match field {
            fields::NAME => Some(d.name.clone()),
            fields::ADDRESS => Some(d.address.clone()),
            fields::CITY => Some(d.city.clone()),
            fields::STATE => Some(d.state.clone()),
            fields::ZIP_CODE => Some(d.zip_code.clone()),
            fields::COUNTRY => Some(d.country.clone()),
            fields::PROPERTY_TYPE => Some(d.property_type.as_str().to_string()),
            fields::CLIENT_ID => Some(d.client_id.clone()),
            fields::TIMEZONE => d.timezone.clone(),
            fields::EMERGENCY_CONTACT_NAME => d.emergency_contact_name.clone(),
            fields::EMERGENCY_CONTACT_PHONE => d.emergency_contact_phone.clone(),
            fields::EMERGENCY_CONTACT_EMAIL => d.emergency_contact_email.clone(),
            fields::ACCESS_CODE => d.access_code.clone(),
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(values: &[(&'static str, &str)]) -> CandidateRecord {
        CandidateRecord {
            row: 7,
            values: values.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    #[test]
    fn test_draft_from_complete_candidate() {
        let c = candidate(&[
            (fields::NAME, "HQ"),
            (fields::ADDRESS, "1 Main St"),
            (fields::CITY, "Austin"),
            (fields::STATE, "TX"),
            (fields::ZIP_CODE, "78701"),
            (fields::COUNTRY, "US"),
            (fields::PROPERTY_TYPE, "office"),
            (fields::CLIENT_ID, "C-1"),
            (fields::ACCESS_CODE, "9911"),
        ]);
        let draft = PropertyDraft::from_candidate(&c).unwrap();
        assert_eq!(draft.property_type, PropertyType::Office);
        assert_eq!(draft.access_code.as_deref(), Some("9911"));
        assert!(draft.timezone.is_none());
    }

    #[test]
    fn test_draft_from_candidate_reports_missing_field_with_row() {
        let c = candidate(&[(fields::NAME, "HQ")]);
        let err = PropertyDraft::from_candidate(&c).unwrap_err();
        assert_eq!(err.row, 7);
        assert_eq!(err.message, "required");
    }

    #[test]
    fn test_record_serializes_flat_with_status() {
        let record = fixtures::record("p-1", "HQ", PropertyStatus::Active);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "p-1");
        assert_eq!(json["zipCode"], "78701");
        assert_eq!(json["status"], "active");
        assert_eq!(json["propertyType"], "commercial");
    }
}

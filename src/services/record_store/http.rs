//! REST property service client

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{RecordStore, StoreError};
use crate::types::{ExportFilter, FieldUpdate, PropertyDraft, PropertyRecord};

/// Error body returned by the property service on 4xx
#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpRecordStore {
    client: Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn list_url(&self, filter: &ExportFilter) -> String {
        let mut params = Vec::new();
        if let Some(status) = filter.status {
            params.push(format!("status={}", status.as_str()));
        }
        if let Some(property_type) = filter.property_type {
            params.push(format!("propertyType={}", property_type.as_str()));
        }
        if let Some(client_id) = &filter.client_id {
            params.push(format!("clientId={}", urlencoding::encode(client_id)));
        }

        let mut url = self.url("/properties");
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// PATCH body: `{ field: value }`, `null` clears a field
    fn patch_body(updates: &[FieldUpdate]) -> Value {
        let mut body = Map::new();
        for update in updates {
            let value = update
                .text_value()
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            body.insert(update.field_name().to_string(), value);
        }
        Value::Object(body)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
        id: Option<&str>,
    ) -> Result<T, StoreError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(format!("invalid response body: {}", e)));
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body, id))
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Translate an HTTP failure into the store error taxonomy
fn map_status(status: StatusCode, body: &str, id: Option<&str>) -> StoreError {
    let detail: ServiceError = serde_json::from_str(body).unwrap_or_default();
    let message = detail
        .message
        .unwrap_or_else(|| format!("property service returned {}", status));

    match status {
        StatusCode::CONFLICT => StoreError::Conflict(message),
        StatusCode::NOT_FOUND => match id {
            Some(id) => StoreError::NotFound(id.to_string()),
            // No record addressed, so the endpoint itself is missing
            None => StoreError::Unavailable(format!("property service endpoint not found ({})", status)),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Rejected {
            field: detail.field,
            message,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unavailable(format!("property service refused credentials ({})", status))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(format!("property service rate limited the worker: {}", message))
        }
        _ => StoreError::Unavailable(message),
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn check_available(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    async fn create(&self, draft: &PropertyDraft) -> Result<PropertyRecord, StoreError> {
        debug!("Creating property '{}' for client {}", draft.name, draft.client_id);
        let response = self
            .client
            .post(self.url("/properties"))
            .json(draft)
            .send()
            .await
            .map_err(transport_error)?;
        Self::parse(response, None).await
    }

    async fn update(&self, id: &str, updates: &[FieldUpdate]) -> Result<PropertyRecord, StoreError> {
        let url = self.url(&format!("/properties/{}", urlencoding::encode(id)));
        let response = self
            .client
            .patch(url)
            .json(&Self::patch_body(updates))
            .send()
            .await
            .map_err(transport_error)?;
        Self::parse(response, Some(id)).await
    }

    async fn list(&self, filter: &ExportFilter) -> Result<Vec<PropertyRecord>, StoreError> {
        let response = self
            .client
            .get(self.list_url(filter))
            .send()
            .await
            .map_err(transport_error)?;
        Self::parse(response, None).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PropertyStatus, PropertyType};

    fn store() -> HttpRecordStore {
        HttpRecordStore::new("http://properties.local:8080/api/", 5).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(store().url("/health"), "http://properties.local:8080/api/health");
    }

    #[test]
    fn test_list_url_encodes_filter() {
        let filter = ExportFilter {
            status: Some(PropertyStatus::Active),
            property_type: Some(PropertyType::MixedUse),
            client_id: Some("ACME & CO".to_string()),
            ..Default::default()
        };
        assert_eq!(
            store().list_url(&filter),
            "http://properties.local:8080/api/properties?status=active&propertyType=mixed_use&clientId=ACME%20%26%20CO"
        );
        assert_eq!(
            store().list_url(&ExportFilter::default()),
            "http://properties.local:8080/api/properties"
        );
    }

    #[test]
    fn test_patch_body_uses_field_names_and_null_for_cleared() {
        let body = HttpRecordStore::patch_body(&[
            FieldUpdate::City("Austin".to_string()),
            FieldUpdate::AccessCode(None),
            FieldUpdate::Status(PropertyStatus::Archived),
        ]);
        assert_eq!(body["city"], "Austin");
        assert!(body["accessCode"].is_null());
        assert_eq!(body["status"], "archived");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::CONFLICT, r#"{"message":"exists"}"#, None),
            StoreError::Conflict(m) if m == "exists"
        ));
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, "", Some("p-9")),
            StoreError::NotFound("p-9".to_string())
        );
        assert_eq!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY, r#"{"field":"zipCode","message":"unknown"}"#, None),
            StoreError::Rejected {
                field: Some("zipCode".to_string()),
                message: "unknown".to_string()
            }
        );
        assert!(map_status(StatusCode::BAD_GATEWAY, "<html>", None).is_systemic());
    }

    #[test]
    fn test_service_level_statuses_are_systemic() {
        let missing_endpoint = map_status(StatusCode::NOT_FOUND, "", None);
        assert!(missing_endpoint.is_systemic());
        assert!(!missing_endpoint.to_string().contains("record"));

        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = map_status(status, r#"{"message":"token expired"}"#, Some("p-1"));
            assert!(err.is_systemic());
            assert!(err.to_string().contains("credentials"));
        }

        let throttled = map_status(StatusCode::TOO_MANY_REQUESTS, r#"{"message":"slow down"}"#, None);
        assert!(throttled.is_systemic());
        assert!(throttled.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_systemic() {
        let store = HttpRecordStore::new("http://127.0.0.1:1", 1).unwrap();
        let err = store.check_available().await.unwrap_err();
        assert!(err.is_systemic());
    }
}

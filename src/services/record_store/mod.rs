//! Record store abstraction
//!
//! The pipeline never persists anything itself; it submits drafts and
//! updates through this contract and reads records back for export.
//!
//! Backend selection via RECORD_STORE_BACKEND:
//! - "memory" → InMemoryRecordStore (development, tests)
//! - "http" → HttpRecordStore (REST property service)

pub mod http;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ExportFilter, FieldError, FieldUpdate, PropertyDraft, PropertyRecord};

pub use http::HttpRecordStore;
pub use memory::InMemoryRecordStore;

/// Field name used when a store error is not tied to one column
pub const RECORD_FIELD: &str = "record";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused this record's content
    #[error("{message}")]
    Rejected {
        field: Option<String>,
        message: String,
    },

    /// A uniqueness constraint was violated
    #[error("{0}")]
    Conflict(String),

    #[error("record {0} not found")]
    NotFound(String),

    /// The store cannot be reached at all
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the failure is not about one record but about the store
    pub fn is_systemic(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    /// Per-record error attached to the row that caused it
    pub fn to_field_error(&self, row: usize) -> FieldError {
        match self {
            StoreError::Rejected { field, message } => FieldError::error(
                row,
                field.as_deref().unwrap_or(RECORD_FIELD),
                None,
                message.clone(),
            ),
            StoreError::Conflict(message) => FieldError::error(row, RECORD_FIELD, None, message.clone()),
            StoreError::NotFound(id) => {
                FieldError::error(row, RECORD_FIELD, Some(id), "record not found")
            }
            StoreError::Unavailable(message) => {
                FieldError::error(row, RECORD_FIELD, None, message.clone())
            }
        }
    }
}

/// Persistence backend for property records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cheap reachability probe
    async fn check_available(&self) -> Result<(), StoreError>;

    async fn create(&self, draft: &PropertyDraft) -> Result<PropertyRecord, StoreError>;

    async fn update(&self, id: &str, updates: &[FieldUpdate]) -> Result<PropertyRecord, StoreError>;

    /// Records matching the filter. Backends may filter coarsely; callers
    /// re-apply `ExportFilter::matches`.
    async fn list(&self, filter: &ExportFilter) -> Result<Vec<PropertyRecord>, StoreError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStoreBackend {
    #[default]
    Memory,
    Http,
}

impl RecordStoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mock" => Some(RecordStoreBackend::Memory),
            "http" => Some(RecordStoreBackend::Http),
            _ => None,
        }
    }
}

/// Record store connection settings
#[derive(Debug, Clone)]
pub struct RecordStoreSettings {
    pub backend: RecordStoreBackend,
    pub url: Option<String>,
    pub timeout_secs: u64,
}

/// Create the configured record store
pub fn create_record_store(settings: &RecordStoreSettings) -> Result<Arc<dyn RecordStore>> {
    match settings.backend {
        RecordStoreBackend::Memory => {
            tracing::info!("Using InMemoryRecordStore");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
        RecordStoreBackend::Http => {
            let url = settings
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("RECORD_STORE_URL is required for the http backend"))?;
            tracing::info!("Using HttpRecordStore at {}", url);
            Ok(Arc::new(HttpRecordStore::new(url, settings.timeout_secs)?))
        }
    }
}

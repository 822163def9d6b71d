//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{self, Context, Result};

use crate::defaults::{
    DEFAULT_MAX_IMPORT_ROWS, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PREVIEW_ERROR_LIMIT,
    DEFAULT_PREVIEW_SAMPLE_LIMIT, DEFAULT_STORE_TIMEOUT_SECS,
};
use crate::services::bulk::BulkLimits;
use crate::services::preview::PreviewLimits;
use crate::services::record_store::{RecordStoreBackend, RecordStoreSettings};
use crate::services::upload::UploadLimits;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    pub store: RecordStoreSettings,

    pub limits: BulkLimits,

    /// JSON file operation history is persisted to (in-memory only when unset)
    pub history_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let backend = match var("RECORD_STORE_BACKEND") {
            Some(raw) => RecordStoreBackend::parse(&raw)
                .with_context(|| format!("RECORD_STORE_BACKEND must be 'memory' or 'http', got '{}'", raw))?,
            None => RecordStoreBackend::default(),
        };
        let store_url = var("RECORD_STORE_URL");
        if backend == RecordStoreBackend::Http && store_url.is_none() {
            anyhow::bail!("RECORD_STORE_URL must be set when RECORD_STORE_BACKEND=http");
        }

        let store = RecordStoreSettings {
            backend,
            url: store_url,
            timeout_secs: parse_or(&var, "RECORD_STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?,
        };

        let limits = BulkLimits {
            upload: UploadLimits {
                max_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                max_rows: parse_or(&var, "MAX_IMPORT_ROWS", DEFAULT_MAX_IMPORT_ROWS)?,
            },
            preview: PreviewLimits {
                sample_limit: parse_or(&var, "PREVIEW_SAMPLE_LIMIT", DEFAULT_PREVIEW_SAMPLE_LIMIT)?,
                error_limit: parse_or(&var, "PREVIEW_ERROR_LIMIT", DEFAULT_PREVIEW_ERROR_LIMIT)?,
            },
        };
        if limits.upload.max_rows == 0 {
            anyhow::bail!("MAX_IMPORT_ROWS must be greater than zero");
        }

        Ok(Self {
            nats_url,
            nats_user: var("NATS_USER"),
            nats_password: var("NATS_PASSWORD"),
            store,
            limits,
            history_file: var("OPERATION_HISTORY_FILE").map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.store.backend, RecordStoreBackend::Memory);
        assert_eq!(config.limits.upload.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.upload.max_rows, 10_000);
        assert_eq!(config.limits.preview.sample_limit, 20);
        assert_eq!(config.limits.preview.error_limit, 10);
        assert!(config.history_file.is_none());
        assert!(config.nats_user.is_none());
    }

    #[test]
    fn test_config_http_backend_requires_url() {
        assert!(config_from(&[("RECORD_STORE_BACKEND", "http")]).is_err());

        let config = config_from(&[
            ("RECORD_STORE_BACKEND", "http"),
            ("RECORD_STORE_URL", "http://properties:8080"),
            ("RECORD_STORE_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.store.url.as_deref(), Some("http://properties:8080"));
        assert_eq!(config.store.timeout_secs, 5);
    }

    #[test]
    fn test_config_rejects_invalid_numbers_and_backend() {
        let err = config_from(&[("MAX_IMPORT_ROWS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_IMPORT_ROWS"));
        assert!(config_from(&[("MAX_IMPORT_ROWS", "0")]).is_err());
        assert!(config_from(&[("RECORD_STORE_BACKEND", "postgres")]).is_err());
    }

    #[test]
    fn test_config_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("NATS_URL", "  "), ("PREVIEW_SAMPLE_LIMIT", "5")]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.limits.preview.sample_limit, 5);
    }
}

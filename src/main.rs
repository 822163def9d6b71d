//! Property Bulk Worker - import/export pipeline for property records
//!
//! Serves the bulk pipeline over NATS, or runs one action from the command line.

mod cli;
mod config;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::bulk::BulkService;
use crate::services::history::OperationHistory;
use crate::services::record_store::create_record_store;
use crate::services::upload::UploadedFile;
use crate::types::{ExportFilter, ExportOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "bulk-worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,property_bulk_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let store = create_record_store(&config.store)?;
    let history = match config.history_file {
        Some(ref path) => OperationHistory::with_file(path),
        None => OperationHistory::in_memory(),
    };
    let service = BulkService::new(store, history, config.limits);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, service).await,
        Command::Template { format, output } => {
            let template = service.template(format.into())?;
            let path = output.unwrap_or_else(|| PathBuf::from(&template.filename));
            write_file(&path, &template.bytes)?;
            println!("Template written to {}", path.display());
            Ok(())
        }
        Command::Preview { file } => {
            let preview = service.preview(&read_upload(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
            Ok(())
        }
        Command::Import { file } => {
            let op = service.run_import(Uuid::new_v4(), read_upload(&file)?).await?;
            println!("{}", serde_json::to_string_pretty(&op)?);
            Ok(())
        }
        Command::Export {
            format,
            status,
            property_type,
            client_id,
            include_metadata,
            include_images,
            output,
        } => {
            let options = ExportOptions {
                format: format.into(),
                include_images,
                include_metadata,
                filters: Some(ExportFilter {
                    status,
                    property_type,
                    client_id,
                    ..Default::default()
                }),
            };
            let (op, artifact) = service.run_export(Uuid::new_v4(), options).await?;
            if let Some(artifact) = artifact {
                write_file(&output, &artifact.bytes)?;
                info!("Export written to {}", output.display());
            }
            println!("{}", serde_json::to_string_pretty(&op)?);
            Ok(())
        }
    }
}

async fn serve(config: &Config, service: BulkService) -> Result<()> {
    info!("Starting Property Bulk Worker...");

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, service).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(filename, bytes))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_upload_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.csv");
        write_file(&path, b"name\nA\n").unwrap();

        let file = read_upload(&path).unwrap();
        assert_eq!(file.filename, "props.csv");
        assert_eq!(file.bytes, b"name\nA\n");
    }

    #[test]
    fn test_read_upload_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_upload(&dir.path().join("missing.csv")).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }
}

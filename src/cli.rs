//! CLI argument parsing for the property-bulk-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::{ExportFormat, PropertyStatus, PropertyType};

#[derive(Parser)]
#[command(name = "property-bulk-worker", about = "Bulk property import/export worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Json,
}

impl From<FileFormat> for ExportFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Csv => ExportFormat::Csv,
            FileFormat::Xlsx => ExportFormat::Spreadsheet,
            FileFormat::Json => ExportFormat::Json,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the NATS worker (default if no subcommand given)
    Serve,
    /// Write the import template
    Template {
        #[arg(long, value_enum, default_value = "csv")]
        format: FileFormat,
        /// Output path (defaults to the template's file name)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a file and print the preview as JSON
    Preview {
        file: PathBuf,
    },
    /// Import a file into the configured record store
    Import {
        file: PathBuf,
    },
    /// Export stored properties
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: FileFormat,
        #[arg(long, value_parser = parse_status)]
        status: Option<PropertyStatus>,
        #[arg(long, value_parser = parse_property_type)]
        property_type: Option<PropertyType>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        include_metadata: bool,
        #[arg(long)]
        include_images: bool,
        #[arg(long)]
        output: PathBuf,
    },
}

fn parse_status(s: &str) -> Result<PropertyStatus, String> {
    PropertyStatus::parse(s).ok_or_else(|| format!("unknown status '{}'", s))
}

fn parse_property_type(s: &str) -> Result<PropertyType, String> {
    PropertyType::parse(&s.trim().to_lowercase().replace(['-', ' '], "_"))
        .ok_or_else(|| format!("must be one of: {}", PropertyType::VALUES.join(", ")))
}

//! Error types for the Olist pipeline using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

use crate::source::SourceKind;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Sink path is empty.
    #[snafu(display("Sink path cannot be empty"))]
    EmptySinkPath,

    /// A source file name is empty.
    #[snafu(display("File name for source '{name}' cannot be empty"))]
    EmptySourceFile { name: String },

    /// CSV delimiter is not a single ASCII character.
    #[snafu(display("Delimiter must be a single ASCII character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },

    /// Schedule interval is zero.
    #[snafu(display("Schedule interval must be greater than zero"))]
    ZeroInterval,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Reader Errors ============

/// Errors that can occur while decoding a CSV source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// Failed to read the CSV header row.
    #[snafu(display("Failed to read CSV header for {path}"))]
    Header { source: csv::Error, path: String },

    /// Failed to decode a CSV record.
    #[snafu(display("Failed to decode CSV record {line} in {path}"))]
    Record {
        source: csv::Error,
        path: String,
        line: u64,
    },

    /// A column the record type cannot do without is absent from the header.
    #[snafu(display("Required column '{column}' missing from {path}"))]
    MissingColumn { column: String, path: String },
}

// ============ Merge Errors ============

/// Structural failures of the join step.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MergeError {
    /// One or more inputs were empty at join time.
    #[snafu(display("Cannot merge: input datasets are empty: {}", format_kinds(empty)))]
    EmptyInputs { empty: Vec<SourceKind> },
}

fn format_kinds(kinds: &[SourceKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Sink Errors ============

/// Errors that can occur while persisting an output table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to assemble the Arrow batch for a table.
    #[snafu(display("Failed to build record batch for '{table}'"))]
    BatchBuild {
        source: arrow::error::ArrowError,
        table: String,
    },

    /// Failed to create the Parquet writer.
    #[snafu(display("Failed to create Parquet writer for '{table}'"))]
    WriterCreate {
        source: parquet::errors::ParquetError,
        table: String,
    },

    /// Parquet write error.
    #[snafu(display("Parquet write error for '{table}'"))]
    Write {
        source: parquet::errors::ParquetError,
        table: String,
    },

    /// `replace` called outside an `open`/`close` session.
    #[snafu(display("Sink is not open; cannot replace '{table}'"))]
    NotOpen { table: String },

    /// Failed to clear the previous contents of a table.
    #[snafu(display("Failed to clear previous contents of '{table}'"))]
    Clear { source: StorageError, table: String },

    /// Failed to upload the new table contents.
    #[snafu(display("Failed to upload '{table}'"))]
    Upload { source: StorageError, table: String },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ API Errors ============

/// Errors raised while running the customer lookup service.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    /// Failed to bind the listener.
    #[snafu(display("Failed to bind customer API to {address}"))]
    Bind {
        source: std::io::Error,
        address: String,
    },

    /// The HTTP server stopped with an error.
    #[snafu(display("Customer API server error"))]
    Serve { source: std::io::Error },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Storage error.
    #[snafu(display("Storage error"))]
    PipelineStorage { source: StorageError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Reader error.
    #[snafu(display("Reader error"))]
    Reader { source: ReaderError },

    /// Structural merge failure.
    #[snafu(display("Merge error"))]
    Merge { source: MergeError },

    /// Sink error.
    #[snafu(display("Sink error"))]
    Sink { source: SinkError },

    /// Task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Customer API error.
    #[snafu(display("Customer API error"))]
    Api { source: ApiError },
}

impl PipelineError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            PipelineError::PipelineStorage { source } => source.is_not_found(),
            _ => false,
        }
    }
}

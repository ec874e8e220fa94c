//! Configuration loading and validation.
//!
//! Handles loading the pipeline configuration from YAML files, with
//! environment variable interpolation applied to the raw text first.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{
    ConfigError, EmptySinkPathSnafu, EmptySourceFileSnafu, EmptySourcePathSnafu,
    EnvInterpolationSnafu, InvalidDelimiterSnafu, ReadFileSnafu, YamlParseSnafu, ZeroIntervalSnafu,
};

pub use vars::{InterpolationResult, interpolate, interpolate_with};

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    /// Periodic run configuration (optional, hourly by default).
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Customer lookup service configuration (optional).
    #[serde(default)]
    pub api: ApiConfig,
}

/// Where the four raw datasets live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Storage root holding the CSV exports.
    /// Examples: "s3://bucket/olist", "/data/olist"
    pub path: String,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// CSV field delimiter (default: ",").
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// File names relative to `path`.
    #[serde(default)]
    pub files: SourceFiles,
}

/// File name of each dataset, relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFiles {
    #[serde(default = "default_customers_file")]
    pub customers: String,
    #[serde(default = "default_orders_file")]
    pub orders: String,
    #[serde(default = "default_order_items_file")]
    pub order_items: String,
    #[serde(default = "default_payments_file")]
    pub payments: String,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            customers: default_customers_file(),
            orders: default_orders_file(),
            order_items: default_order_items_file(),
            payments: default_payments_file(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_customers_file() -> String {
    "olist_customers_dataset.csv".to_string()
}

fn default_orders_file() -> String {
    "olist_orders_dataset.csv".to_string()
}

fn default_order_items_file() -> String {
    "olist_order_items_dataset.csv".to_string()
}

fn default_payments_file() -> String {
    "olist_order_payments_dataset.csv".to_string()
}

impl SourceConfig {
    /// The delimiter as a byte. Only valid after `Config::validate`.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

/// Where output tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Storage root for output tables.
    /// Examples: "s3://bucket/warehouse", "/data/warehouse"
    pub path: String,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,

    /// Persist the merged staging table as well as the summaries (default: true).
    #[serde(default = "default_write_staging")]
    pub write_staging: bool,
}

fn default_write_staging() -> bool {
    true
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

/// Periodic run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between pipeline runs (default: 3600).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Run immediately on start instead of waiting one interval (default: true).
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_run_on_start() -> bool {
    true
}

/// Metrics configuration for Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Customer lookup service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the lookup service (default: "0.0.0.0:8000").
    #[serde(default = "default_api_address")]
    pub address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_api_address(),
        }
    }
}

fn default_api_address() -> String {
    "0.0.0.0:8000".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration text, interpolating environment variables first.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let result = vars::interpolate(content);
        if !result.is_ok() {
            return EnvInterpolationSnafu {
                message: result.errors.join("\n"),
            }
            .fail();
        }

        let config: Config = serde_yaml::from_str(&result.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.path.is_empty(), EmptySourcePathSnafu);
        ensure!(!self.sink.path.is_empty(), EmptySinkPathSnafu);
        ensure!(
            self.source.delimiter.len() == 1 && self.source.delimiter.is_ascii(),
            InvalidDelimiterSnafu {
                delimiter: self.source.delimiter.clone(),
            }
        );
        ensure!(self.schedule.interval_secs > 0, ZeroIntervalSnafu);

        let files = &self.source.files;
        for (name, file) in [
            ("customers", &files.customers),
            ("orders", &files.orders),
            ("order_items", &files.order_items),
            ("payments", &files.payments),
        ] {
            ensure!(!file.is_empty(), EmptySourceFileSnafu { name });
        }
        Ok(())
    }
}

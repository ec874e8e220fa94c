//! olist-etl: batch pipeline for the Olist marketplace exports.
//!
//! Loads the customers, orders, order items and payments CSV exports,
//! merges them into one row per order item, and derives a per-customer
//! sales summary and a per-day, per-state delivery performance table.
//! All three outputs are written as Parquet with replace-on-write
//! semantics.
//!
//! # Example
//!
//! ```ignore
//! use olist_etl::{Config, Pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let pipeline = Pipeline::from_config(&config).await?;
//!     let stats = pipeline.run_once().await?;
//!     println!("Merged {} rows", stats.merged_rows);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod storage;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use pipeline::{Pipeline, RunStats, Scheduler};
pub use storage::{StorageProvider, StorageProviderRef};

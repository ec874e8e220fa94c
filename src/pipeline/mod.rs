//! Pipeline runner.
//!
//! One run is a small task graph:
//!
//! - **Fan-out**: the four sources load as independent tokio tasks
//! - **Barrier**: the merge waits for all four, then runs on the blocking pool
//! - **Fan-out**: both summaries compute concurrently on the blocking pool
//!
//! Output tables go to the injected [`TableSink`]. Sink failures are
//! logged and counted; the run still attempts the remaining tables.

mod schedule;
mod signal;

use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{Config, SourceFiles};
use crate::emit;
use crate::error::{
    BatchBuildSnafu, MergeSnafu, PipelineError, PipelineStorageSnafu, TaskJoinSnafu,
};
use crate::metrics::events::{MergedRows, PipelineRunCompleted, RunStatus, SinkWriteFailed, SummaryRows};
use crate::model::{CustomerRecord, OrderItemRecord, OrderRecord, PaymentRecord};
use crate::sink::{OutputTable, ParquetSink, TableSink, ToRecordBatch, WriteOutcome};
use crate::source::{CsvReader, CsvReaderConfig, FromRow, SourceKind, SourceLoader};
use crate::storage::StorageProvider;
use crate::transform::{MergeInputs, delivery_summary, merge, sales_summary};

pub use schedule::{ScheduleSummary, ScheduledJob, Scheduler};
pub use signal::{shutdown_signal, shutdown_token};

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub customers: usize,
    pub orders: usize,
    pub order_items: usize,
    pub payments: usize,
    pub merged_rows: usize,
    pub sales_summary_rows: usize,
    pub delivery_summary_rows: usize,
    pub tables_written: usize,
    pub sink_failures: usize,
}

/// Source locations and output options for a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub files: SourceFiles,
    pub write_staging: bool,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            files: config.source.files.clone(),
            write_staging: config.sink.write_staging,
        }
    }
}

/// Loads, merges, summarizes and persists the Olist datasets.
pub struct Pipeline {
    loader: SourceLoader,
    sink: Arc<dyn TableSink>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(loader: SourceLoader, sink: Arc<dyn TableSink>, options: PipelineOptions) -> Self {
        Self {
            loader,
            sink,
            options,
        }
    }

    /// Build a pipeline reading CSV from `source.path` and writing Parquet
    /// under `sink.path`.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let source_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.source.path,
                config.source.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?,
        );
        let sink_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.sink.path,
                config.sink.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?,
        );

        let reader = CsvReader::new(CsvReaderConfig {
            delimiter: config.source.delimiter_byte(),
        });
        let loader = SourceLoader::new(source_storage, reader);
        let sink = Arc::new(ParquetSink::new(sink_storage, config.sink.compression));

        Ok(Self::new(loader, sink, PipelineOptions::from(config)))
    }

    /// Run the pipeline once over the current contents of the sources.
    pub async fn run_once(&self) -> Result<RunStats, PipelineError> {
        info!("Starting pipeline run");
        let start = Instant::now();
        let result = self.execute().await;

        let status = match &result {
            Ok(stats) => {
                info!(
                    "Pipeline run finished in {:.2}s: {} merged rows, {} tables written, {} sink failures",
                    start.elapsed().as_secs_f64(),
                    stats.merged_rows,
                    stats.tables_written,
                    stats.sink_failures
                );
                RunStatus::Success
            }
            Err(e) => {
                error!("Pipeline run failed: {}", snafu::Report::from_error(e));
                RunStatus::Failed
            }
        };
        emit!(PipelineRunCompleted {
            status,
            duration: start.elapsed(),
        });

        result
    }

    async fn execute(&self) -> Result<RunStats, PipelineError> {
        let inputs = self.load_sources().await?;
        let mut stats = RunStats {
            customers: inputs.customers.len(),
            orders: inputs.orders.len(),
            order_items: inputs.order_items.len(),
            payments: inputs.payments.len(),
            ..RunStats::default()
        };

        let merged = tokio::task::spawn_blocking(move || merge(&inputs))
            .await
            .context(TaskJoinSnafu)?
            .context(MergeSnafu)?;
        stats.merged_rows = merged.len();
        info!("Merged into {} order-item rows", merged.len());
        emit!(MergedRows {
            count: merged.len() as u64
        });
        let merged = Arc::new(merged);

        if let Err(e) = self.sink.open().await {
            error!("Failed to open sink: {}", snafu::Report::from_error(e));
        }

        if self.options.write_staging {
            self.write(OutputTable::Staging, merged.as_slice(), &mut stats)
                .await;
        }

        let (sales, delivery) = tokio::try_join!(
            tokio::task::spawn_blocking({
                let merged = merged.clone();
                move || sales_summary(&merged)
            }),
            tokio::task::spawn_blocking({
                let merged = merged.clone();
                move || delivery_summary(&merged)
            }),
        )
        .context(TaskJoinSnafu)?;

        stats.sales_summary_rows = sales.len();
        stats.delivery_summary_rows = delivery.len();
        emit!(SummaryRows {
            table: OutputTable::SalesSummary.as_str(),
            count: sales.len() as u64,
        });
        emit!(SummaryRows {
            table: OutputTable::DeliveryPerformance.as_str(),
            count: delivery.len() as u64,
        });

        self.write(OutputTable::SalesSummary, &sales, &mut stats)
            .await;
        self.write(OutputTable::DeliveryPerformance, &delivery, &mut stats)
            .await;

        if let Err(e) = self.sink.close().await {
            error!("Failed to close sink: {}", snafu::Report::from_error(e));
        }

        Ok(stats)
    }

    /// Load all four sources concurrently and wait for every one of them.
    async fn load_sources(&self) -> Result<MergeInputs, PipelineError> {
        let files = &self.options.files;
        let customers = self.spawn_load::<CustomerRecord>(SourceKind::Customers, &files.customers);
        let orders = self.spawn_load::<OrderRecord>(SourceKind::Orders, &files.orders);
        let order_items =
            self.spawn_load::<OrderItemRecord>(SourceKind::OrderItems, &files.order_items);
        let payments = self.spawn_load::<PaymentRecord>(SourceKind::Payments, &files.payments);

        let (customers, orders, order_items, payments) =
            tokio::try_join!(customers, orders, order_items, payments).context(TaskJoinSnafu)?;

        Ok(MergeInputs {
            customers,
            orders,
            order_items,
            payments,
        })
    }

    fn spawn_load<T>(&self, kind: SourceKind, file: &str) -> JoinHandle<Vec<T>>
    where
        T: FromRow + Send + 'static,
    {
        let loader = self.loader.clone();
        let file = file.to_string();
        tokio::spawn(async move { loader.load::<T>(kind, &file).await })
    }

    /// Replace `table` with `records`, logging and counting any failure.
    async fn write<T: ToRecordBatch>(&self, table: OutputTable, records: &[T], stats: &mut RunStats) {
        let result = match T::to_record_batch(records).context(BatchBuildSnafu {
            table: table.as_str(),
        }) {
            Ok(batch) => self.sink.replace(table, batch).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(WriteOutcome::Written { .. }) => stats.tables_written += 1,
            Ok(WriteOutcome::SkippedEmpty) => {}
            Err(e) => {
                error!("Failed to save {}: {}", table, snafu::Report::from_error(e));
                emit!(SinkWriteFailed {
                    table: table.as_str()
                });
                stats.sink_failures += 1;
            }
        }
    }
}

#[async_trait::async_trait]
impl ScheduledJob for Pipeline {
    async fn run_once(&self) -> Result<RunStats, PipelineError> {
        Pipeline::run_once(self).await
    }
}

//! olist-etl: merge the Olist marketplace exports into analytics tables.
//!
//! Runs the pipeline once, on an hourly schedule, or serves the customers
//! export over HTTP.

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use olist_etl::api::{self, CustomerData};
use olist_etl::config::Config;
use olist_etl::error::{AddressParseSnafu, ApiSnafu, ConfigSnafu, MetricsSnafu, PipelineError, PipelineStorageSnafu};
use olist_etl::metrics;
use olist_etl::pipeline::{Pipeline, Scheduler, shutdown_token};
use olist_etl::source::{CsvReader, CsvReaderConfig, SourceLoader};
use olist_etl::storage::StorageProvider;

/// Olist marketplace ETL.
#[derive(Parser, Debug)]
#[command(name = "olist-etl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the pipeline once and exit (default).
    Run,
    /// Run the pipeline every `schedule.interval_secs` until interrupted.
    Schedule,
    /// Serve the customers export as JSON.
    ServeCustomers,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("olist-etl starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;
    let command = args.command.unwrap_or(Command::Run);

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.path);
        info!("  customers: {}", config.source.files.customers);
        info!("  orders: {}", config.source.files.orders);
        info!("  order_items: {}", config.source.files.order_items);
        info!("  payments: {}", config.source.files.payments);
        info!("Sink: {} ({:?})", config.sink.path, config.sink.compression);
        info!("Schedule: every {}s", config.schedule.interval_secs);
        info!("Configuration is valid");
        return Ok(());
    }

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    match command {
        Command::Run => {
            let pipeline = Pipeline::from_config(&config).await?;
            let stats = pipeline.run_once().await?;

            info!("Pipeline completed successfully");
            info!(
                "  Rows read: customers={} orders={} order_items={} payments={}",
                stats.customers, stats.orders, stats.order_items, stats.payments
            );
            info!("  Merged rows: {}", stats.merged_rows);
            info!("  Sales summary rows: {}", stats.sales_summary_rows);
            info!("  Delivery summary rows: {}", stats.delivery_summary_rows);
            info!("  Tables written: {}", stats.tables_written);
            info!("  Sink failures: {}", stats.sink_failures);
        }
        Command::Schedule => {
            let pipeline = Pipeline::from_config(&config).await?;
            let scheduler = Scheduler::new(pipeline, &config.schedule, shutdown_token());
            scheduler.run().await;
        }
        Command::ServeCustomers => {
            let addr = config.api.address.parse().context(AddressParseSnafu)?;
            let storage = StorageProvider::for_url_with_options(
                &config.source.path,
                config.source.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?;
            let reader = CsvReader::new(CsvReaderConfig {
                delimiter: config.source.delimiter_byte(),
            });
            let loader = SourceLoader::new(Arc::new(storage), reader);

            let data = CustomerData::load(&loader, &config.source.files.customers).await;
            api::serve(addr, Arc::new(data), shutdown_token())
                .await
                .context(ApiSnafu)?;
        }
    }

    Ok(())
}

//! Output persistence.
//!
//! The pipeline hands each output table to a [`TableSink`] as one Arrow
//! batch. A sink replaces the named table's whole prior contents; there is
//! no append and no cross-table transaction.

pub mod batch;
pub mod parquet;

use arrow::array::RecordBatch;
use async_trait::async_trait;
use std::fmt;

use crate::error::SinkError;

pub use batch::ToRecordBatch;
pub use self::parquet::ParquetSink;

/// The three tables a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTable {
    /// The merged order-item table.
    Staging,
    SalesSummary,
    DeliveryPerformance,
}

impl OutputTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputTable::Staging => "staging_olist_data",
            OutputTable::SalesSummary => "analytics_sales_summary",
            OutputTable::DeliveryPerformance => "analytics_delivery_performance",
        }
    }
}

impl fmt::Display for OutputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a `replace` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        rows: usize,
        bytes: usize,
        /// Stale objects removed from the table's previous contents.
        removed: usize,
    },
    /// Empty batch; the previous contents were left in place.
    SkippedEmpty,
}

/// Destination for output tables with full-replace semantics.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Start a write session. Must be called before `replace`.
    async fn open(&self) -> Result<(), SinkError>;

    /// Replace every row of `table` with `batch`.
    async fn replace(&self, table: OutputTable, batch: RecordBatch)
    -> Result<WriteOutcome, SinkError>;

    /// End the write session.
    async fn close(&self) -> Result<(), SinkError>;
}

//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which records the matching
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Source events
// ============================================================================

/// Event emitted when a source finished loading.
pub struct SourceRowsLoaded {
    pub source: &'static str,
    pub count: u64,
}

impl InternalEvent for SourceRowsLoaded {
    fn emit(self) {
        trace!(source = self.source, count = self.count, "Source rows loaded");
        counter!("olist_source_rows_loaded_total", "source" => self.source).increment(self.count);
        gauge!("olist_source_rows", "source" => self.source).set(self.count as f64);
    }
}

/// Event emitted when a source could not be loaded at all.
pub struct SourceLoadFailed {
    pub source: &'static str,
}

impl InternalEvent for SourceLoadFailed {
    fn emit(self) {
        trace!(source = self.source, "Source load failed");
        counter!("olist_source_load_failures_total", "source" => self.source).increment(1);
    }
}

/// Event emitted for rows dropped during typed extraction.
pub struct RowsRejected {
    pub source: &'static str,
    pub count: u64,
}

impl InternalEvent for RowsRejected {
    fn emit(self) {
        trace!(source = self.source, count = self.count, "Rows rejected");
        counter!("olist_rows_rejected_total", "source" => self.source).increment(self.count);
    }
}

/// Event emitted for date-time cells that failed to parse and became null.
pub struct UnparsableTimestamps {
    pub source: &'static str,
    pub count: u64,
}

impl InternalEvent for UnparsableTimestamps {
    fn emit(self) {
        trace!(source = self.source, count = self.count, "Unparsable timestamps");
        counter!("olist_unparsable_timestamps_total", "source" => self.source)
            .increment(self.count);
    }
}

// ============================================================================
// Transform events
// ============================================================================

/// Event emitted when the merged table has been built.
pub struct MergedRows {
    pub count: u64,
}

impl InternalEvent for MergedRows {
    fn emit(self) {
        trace!(count = self.count, "Merged rows");
        gauge!("olist_merged_rows").set(self.count as f64);
    }
}

/// Event emitted when a summary table has been built.
pub struct SummaryRows {
    pub table: &'static str,
    pub count: u64,
}

impl InternalEvent for SummaryRows {
    fn emit(self) {
        trace!(table = self.table, count = self.count, "Summary rows");
        gauge!("olist_summary_rows", "table" => self.table).set(self.count as f64);
    }
}

// ============================================================================
// Sink events
// ============================================================================

/// Event emitted when an output table has been replaced.
pub struct TableWritten {
    pub table: &'static str,
    pub rows: u64,
    pub bytes: u64,
}

impl InternalEvent for TableWritten {
    fn emit(self) {
        trace!(
            table = self.table,
            rows = self.rows,
            bytes = self.bytes,
            "Table written"
        );
        counter!("olist_table_writes_total", "table" => self.table).increment(1);
        counter!("olist_rows_written_total", "table" => self.table).increment(self.rows);
        counter!("olist_bytes_written_total", "table" => self.table).increment(self.bytes);
    }
}

/// Event emitted when replacing an output table failed.
pub struct SinkWriteFailed {
    pub table: &'static str,
}

impl InternalEvent for SinkWriteFailed {
    fn emit(self) {
        trace!(table = self.table, "Sink write failed");
        counter!("olist_sink_failures_total", "table" => self.table).increment(1);
    }
}

// ============================================================================
// Run events
// ============================================================================

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a pipeline run finishes.
pub struct PipelineRunCompleted {
    pub status: RunStatus,
    pub duration: Duration,
}

impl InternalEvent for PipelineRunCompleted {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Pipeline run completed"
        );
        counter!("olist_pipeline_runs_total", "status" => self.status.as_str()).increment(1);
        histogram!("olist_pipeline_run_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage events
// ============================================================================

/// Storage operation kind.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    List,
    Delete,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::List => "list",
            StorageOperation::Delete => "delete",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "olist_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        histogram!(
            "olist_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

//! Parquet table sink.
//!
//! Each table lives under its own prefix of the sink root as a single
//! `part-00000.parquet` object.

use arrow::array::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::{OutputTable, TableSink, WriteOutcome};
use crate::config::ParquetCompression;
use crate::emit;
use crate::error::{
    ClearSnafu, NotOpenSnafu, SinkError, UploadSnafu, WriteSnafu, WriterCreateSnafu,
};
use crate::metrics::events::TableWritten;
use crate::storage::StorageProviderRef;

const PART_FILE: &str = "part-00000.parquet";

/// Writes each output table as one Parquet object, replacing prior contents.
pub struct ParquetSink {
    storage: StorageProviderRef,
    compression: ParquetCompression,
    open: AtomicBool,
}

impl ParquetSink {
    pub fn new(storage: StorageProviderRef, compression: ParquetCompression) -> Self {
        Self {
            storage,
            compression,
            open: AtomicBool::new(false),
        }
    }

    /// Object path holding `table`'s data, relative to the sink root.
    pub fn table_path(table: OutputTable) -> Path {
        Path::from(format!("{}/{}", table.as_str(), PART_FILE))
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(match self.compression {
                ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
                ParquetCompression::Snappy => Compression::SNAPPY,
                ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
                ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
                ParquetCompression::Lz4 => Compression::LZ4,
            })
            .build()
    }

    fn encode(&self, table: OutputTable, batch: &RecordBatch) -> Result<Bytes, SinkError> {
        let table = table.as_str();
        let mut buffer = Vec::new();
        let mut writer =
            ArrowWriter::try_new(&mut buffer, batch.schema(), Some(self.writer_properties()))
                .context(WriterCreateSnafu { table })?;
        writer.write(batch).context(WriteSnafu { table })?;
        writer.close().context(WriteSnafu { table })?;
        Ok(Bytes::from(buffer))
    }
}

#[async_trait]
impl TableSink for ParquetSink {
    async fn open(&self) -> Result<(), SinkError> {
        self.open.store(true, Ordering::SeqCst);
        debug!("Opened Parquet sink at {}", self.storage.canonical_url());
        Ok(())
    }

    async fn replace(
        &self,
        table: OutputTable,
        batch: RecordBatch,
    ) -> Result<WriteOutcome, SinkError> {
        ensure!(
            self.open.load(Ordering::SeqCst),
            NotOpenSnafu {
                table: table.as_str()
            }
        );

        if batch.num_rows() == 0 {
            warn!("No data to save for {}; previous contents kept", table);
            return Ok(WriteOutcome::SkippedEmpty);
        }

        let rows = batch.num_rows();
        let bytes = self.encode(table, &batch)?;
        let size = bytes.len();

        let path = Self::table_path(table);
        self.storage
            .put(&path, bytes)
            .await
            .context(UploadSnafu {
                table: table.as_str(),
            })?;

        let removed = self
            .storage
            .delete_prefix_except(table.as_str(), &path)
            .await
            .context(ClearSnafu {
                table: table.as_str(),
            })?;

        info!(
            "Saved {} rows to {} ({} bytes, {} stale objects removed)",
            rows, table, size, removed
        );
        emit!(TableWritten {
            table: table.as_str(),
            rows: rows as u64,
            bytes: size as u64,
        });

        Ok(WriteOutcome::Written {
            rows,
            bytes: size,
            removed,
        })
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.open.store(false, Ordering::SeqCst);
        debug!("Closed Parquet sink at {}", self.storage.canonical_url());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SalesSummaryRecord;
    use crate::sink::ToRecordBatch;
    use crate::storage::StorageProvider;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn storage(dir: &TempDir) -> StorageProviderRef {
        Arc::new(
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap(),
        )
    }

    fn sales(n: usize) -> RecordBatch {
        let records: Vec<_> = (0..n)
            .map(|i| SalesSummaryRecord {
                customer_unique_id: format!("u{i}"),
                state: "SP".to_string(),
                city: "sao paulo".to_string(),
                total_spent: 10.0 * i as f64,
                total_orders: 1,
                avg_payment_installments: Some(1.0),
                avg_order_value: Some(10.0 * i as f64),
            })
            .collect();
        SalesSummaryRecord::to_record_batch(&records).unwrap()
    }

    fn read_back(bytes: Bytes) -> usize {
        ParquetRecordBatchReaderBuilder::try_new(bytes)
            .unwrap()
            .build()
            .unwrap()
            .map(|batch| batch.unwrap().num_rows())
            .sum()
    }

    #[tokio::test]
    async fn test_replace_writes_readable_parquet() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let sink = ParquetSink::new(storage.clone(), ParquetCompression::Zstd);

        sink.open().await.unwrap();
        let outcome = sink
            .replace(OutputTable::SalesSummary, sales(3))
            .await
            .unwrap();
        sink.close().await.unwrap();

        assert!(matches!(
            outcome,
            WriteOutcome::Written {
                rows: 3,
                removed: 0,
                ..
            }
        ));
        assert!(
            dir.path()
                .join("analytics_sales_summary/part-00000.parquet")
                .exists()
        );

        let bytes = storage
            .get(ParquetSink::table_path(OutputTable::SalesSummary))
            .await
            .unwrap();
        assert_eq!(read_back(bytes), 3);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_contents() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage
            .put(
                &Path::from("analytics_sales_summary/legacy.parquet"),
                Bytes::from_static(b"old"),
            )
            .await
            .unwrap();

        let sink = ParquetSink::new(storage.clone(), ParquetCompression::Snappy);
        sink.open().await.unwrap();
        sink.replace(OutputTable::SalesSummary, sales(5))
            .await
            .unwrap();
        let outcome = sink
            .replace(OutputTable::SalesSummary, sales(2))
            .await
            .unwrap();

        assert!(matches!(outcome, WriteOutcome::Written { rows: 2, .. }));
        let listed = storage
            .list_with_prefix("analytics_sales_summary")
            .await
            .unwrap();
        assert_eq!(listed, vec![ParquetSink::table_path(OutputTable::SalesSummary)]);

        let bytes = storage.get(listed[0].clone()).await.unwrap();
        assert_eq!(read_back(bytes), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_previous_contents() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let sink = ParquetSink::new(storage.clone(), ParquetCompression::Snappy);
        sink.open().await.unwrap();

        sink.replace(OutputTable::SalesSummary, sales(4))
            .await
            .unwrap();
        let outcome = sink
            .replace(OutputTable::SalesSummary, sales(0))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::SkippedEmpty);
        let bytes = storage
            .get(ParquetSink::table_path(OutputTable::SalesSummary))
            .await
            .unwrap();
        assert_eq!(read_back(bytes), 4);
    }

    #[tokio::test]
    async fn test_replace_requires_open_sink() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(storage(&dir).await, ParquetCompression::Snappy);

        let err = sink
            .replace(OutputTable::Staging, sales(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::NotOpen { .. }));

        sink.open().await.unwrap();
        sink.close().await.unwrap();
        let err = sink
            .replace(OutputTable::Staging, sales(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::NotOpen { .. }));
    }

    #[test]
    fn test_table_paths() {
        assert_eq!(
            ParquetSink::table_path(OutputTable::DeliveryPerformance).as_ref(),
            "analytics_delivery_performance/part-00000.parquet"
        );
    }
}

//! Source loading.
//!
//! Each of the four raw exports is fetched from storage, decoded on the
//! blocking pool and converted into typed records. Loading never fails
//! past [`SourceLoader::load`]: problems are logged and yield an empty
//! result, which the merge step then rejects.

pub mod normalize;
pub mod reader;
pub mod records;
pub mod table;

use snafu::prelude::*;
use std::fmt;
use tracing::{error, info, warn};

use crate::emit;
use crate::error::{
    MissingColumnSnafu, PipelineError, PipelineStorageSnafu, ReaderError, ReaderSnafu,
    TaskJoinSnafu,
};
use crate::metrics::events::{RowsRejected, SourceLoadFailed, SourceRowsLoaded, UnparsableTimestamps};
use crate::storage::StorageProviderRef;

pub use normalize::normalize_column_name;
pub use reader::{CsvReader, CsvReaderConfig, ReadResult};
pub use records::{Extracted, FromRow};
pub use table::{Row, Table, Value};

/// The four raw datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Customers,
    Orders,
    OrderItems,
    Payments,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Customers,
        SourceKind::Orders,
        SourceKind::OrderItems,
        SourceKind::Payments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Customers => "customers",
            SourceKind::Orders => "orders",
            SourceKind::OrderItems => "order_items",
            SourceKind::Payments => "payments",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loads one source file into typed records.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    storage: StorageProviderRef,
    reader: CsvReader,
}

impl SourceLoader {
    pub fn new(storage: StorageProviderRef, reader: CsvReader) -> Self {
        Self { storage, reader }
    }

    /// Load `file` as records of `T`, or an empty vector on any failure.
    pub async fn load<T>(&self, kind: SourceKind, file: &str) -> Vec<T>
    where
        T: FromRow + Send + 'static,
    {
        match self.try_load(kind, file).await {
            Ok(records) => records,
            Err(e) => {
                if e.is_not_found() {
                    error!(source = kind.as_str(), "Source file {} not found", file);
                } else {
                    error!(
                        source = kind.as_str(),
                        "Failed to read {}: {}",
                        file,
                        snafu::Report::from_error(e)
                    );
                }
                emit!(SourceLoadFailed {
                    source: kind.as_str()
                });
                Vec::new()
            }
        }
    }

    /// Load `file`, surfacing failures to callers that must tell a failed
    /// load apart from an empty dataset.
    pub async fn try_load<T>(&self, kind: SourceKind, file: &str) -> Result<Vec<T>, PipelineError>
    where
        T: FromRow + Send + 'static,
    {
        info!(source = kind.as_str(), "Reading {}...", file);

        let data = self.storage.get(file).await.context(PipelineStorageSnafu)?;

        let reader = self.reader;
        let path = file.to_string();
        let (result, extracted) = tokio::task::spawn_blocking(move || -> Result<_, ReaderError> {
            let result = reader.read(&data, &path)?;
            if let Some(column) = records::missing_column::<T>(&result.table) {
                return MissingColumnSnafu { column, path }.fail();
            }
            let extracted = records::extract::<T>(&result.table);
            Ok((result, extracted))
        })
        .await
        .context(TaskJoinSnafu)?
        .context(ReaderSnafu)?;

        if result.unparsable_timestamps > 0 {
            warn!(
                source = kind.as_str(),
                "{} date-time values in {} could not be parsed and were set to null",
                result.unparsable_timestamps,
                file
            );
            emit!(UnparsableTimestamps {
                source: kind.as_str(),
                count: result.unparsable_timestamps as u64,
            });
        }

        if extracted.rejected > 0 {
            warn!(
                source = kind.as_str(),
                "Dropped {} rows from {} with missing key values", extracted.rejected, file
            );
            emit!(RowsRejected {
                source: kind.as_str(),
                count: extracted.rejected as u64,
            });
        }

        let records = extracted.records;
        info!(source = kind.as_str(), "Read {} rows from {}.", records.len(), file);
        emit!(SourceRowsLoaded {
            source: kind.as_str(),
            count: records.len() as u64,
        });

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderItemRecord, PaymentRecord};
    use crate::storage::StorageProvider;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn loader(dir: &TempDir) -> SourceLoader {
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();
        SourceLoader::new(Arc::new(storage), CsvReader::default())
    }

    #[tokio::test]
    async fn test_load_reads_typed_records() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("items.csv"),
            "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value\n\
o1,1,p1,s1,2017-09-19 09:45:35,58.90,13.29\n\
o1,2,p2,s1,2017-09-19 09:45:35,12.00,3.00\n",
        )
        .unwrap();

        let items: Vec<OrderItemRecord> = loader(&dir)
            .await
            .load(SourceKind::OrderItems, "items.csv")
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price, Some(58.90));
        assert!(items[1].shipping_limit_date.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir).await;

        let payments: Vec<PaymentRecord> = loader.load(SourceKind::Payments, "absent.csv").await;
        assert!(payments.is_empty());

        let err = loader
            .try_load::<PaymentRecord>(SourceKind::Payments, "absent.csv")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_required_column_loads_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("payments.csv"), "order_id,payment_value\no1,10\n").unwrap();
        let loader = loader(&dir).await;

        let payments: Vec<PaymentRecord> = loader.load(SourceKind::Payments, "payments.csv").await;
        assert!(payments.is_empty());

        let err = loader
            .try_load::<PaymentRecord>(SourceKind::Payments, "payments.csv")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Reader {
                source: crate::error::ReaderError::MissingColumn { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_header_only_file_is_empty_but_not_failed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("payments.csv"),
            "order_id,payment_sequential,payment_type,payment_installments,payment_value\n",
        )
        .unwrap();

        let payments = loader(&dir)
            .await
            .try_load::<PaymentRecord>(SourceKind::Payments, "payments.csv")
            .await
            .unwrap();
        assert!(payments.is_empty());
    }
}

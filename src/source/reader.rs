//! CSV decoder.
//!
//! Decodes a raw CSV export into a [`Table`] with normalized column names
//! and date-time columns already parsed.

use csv::ReaderBuilder;
use snafu::prelude::*;
use tracing::debug;

use super::normalize::{is_temporal_column, normalize_column_name, parse_timestamp};
use super::table::{Table, Value};
use crate::error::{HeaderSnafu, ReaderError, RecordSnafu};

/// Configuration for the CSV reader.
#[derive(Debug, Clone, Copy)]
pub struct CsvReaderConfig {
    pub delimiter: u8,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Result of decoding one source.
#[derive(Debug)]
pub struct ReadResult {
    pub table: Table,
    /// Date-time cells that were present but did not parse; stored as null.
    pub unparsable_timestamps: usize,
}

/// Reader turning CSV bytes into a normalized [`Table`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReader {
    config: CsvReaderConfig,
}

impl CsvReader {
    pub fn new(config: CsvReaderConfig) -> Self {
        Self { config }
    }

    /// Decode `data`. `path` is only used for error messages.
    ///
    /// A malformed record (bad quoting, invalid UTF-8) fails the whole read;
    /// a malformed date-time value only nulls that cell.
    pub fn read(&self, data: &[u8], path: &str) -> Result<ReadResult, ReaderError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let columns: Vec<String> = reader
            .headers()
            .context(HeaderSnafu { path })?
            .iter()
            .map(normalize_column_name)
            .collect();
        let temporal: Vec<bool> = columns.iter().map(|c| is_temporal_column(c)).collect();

        let mut table = Table::new(columns);
        let mut unparsable_timestamps = 0;

        for (i, record) in reader.records().enumerate() {
            let record = record.context(RecordSnafu {
                path,
                line: i as u64 + 2,
            })?;

            let values = record
                .iter()
                .zip(temporal.iter())
                .map(|(cell, &is_temporal)| {
                    if cell.is_empty() {
                        Value::Null
                    } else if is_temporal {
                        match parse_timestamp(cell) {
                            Some(ts) => Value::Timestamp(ts),
                            None => {
                                unparsable_timestamps += 1;
                                Value::Null
                            }
                        }
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect();
            table.push_row(values);
        }

        debug!(
            "Decoded {} rows x {} columns from {} ({} unparsable timestamps)",
            table.len(),
            table.columns().len(),
            path,
            unparsable_timestamps
        );

        Ok(ReadResult {
            table,
            unparsable_timestamps,
        })
    }
}

//! Arrow conversion of output records.

use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::sync::{Arc, LazyLock};

use crate::model::{DeliveryPerformanceRecord, MergedOrderRecord, SalesSummaryRecord};

/// Days from 0001-01-01 to 1970-01-01, for `Date32` encoding.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Columnar encoding of a record type.
pub trait ToRecordBatch: Sized {
    fn schema() -> SchemaRef;

    fn to_record_batch(records: &[Self]) -> Result<RecordBatch, ArrowError>;
}

fn timestamp_field(name: &str) -> Field {
    Field::new(name, DataType::Timestamp(TimeUnit::Microsecond, None), true)
}

fn utf8<T>(records: &[T], f: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<StringArray>())
}

fn int64<T>(records: &[T], f: impl Fn(&T) -> Option<i64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Int64Array>())
}

fn uint64<T>(records: &[T], f: impl Fn(&T) -> u64) -> ArrayRef {
    Arc::new(UInt64Array::from_iter_values(records.iter().map(f)))
}

fn float64<T>(records: &[T], f: impl Fn(&T) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(records.iter().map(f)))
}

fn nullable_float64<T>(records: &[T], f: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Float64Array>())
}

fn timestamp<T>(records: &[T], f: impl Fn(&T) -> Option<NaiveDateTime>) -> ArrayRef {
    Arc::new(
        records
            .iter()
            .map(|r| f(r).map(|ts| ts.and_utc().timestamp_micros()))
            .collect::<TimestampMicrosecondArray>(),
    )
}

pub(crate) fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

static MERGED_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Utf8, false),
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("order_status", DataType::Utf8, true),
        timestamp_field("order_purchase_timestamp"),
        timestamp_field("order_approved_at"),
        timestamp_field("order_delivered_carrier_date"),
        timestamp_field("order_delivered_customer_date"),
        timestamp_field("order_estimated_delivery_date"),
        Field::new("customer_unique_id", DataType::Utf8, true),
        Field::new("customer_zip_code_prefix", DataType::Int64, true),
        Field::new("customer_city", DataType::Utf8, true),
        Field::new("customer_state", DataType::Utf8, true),
        Field::new("order_item_id", DataType::Int64, true),
        Field::new("product_id", DataType::Utf8, true),
        Field::new("seller_id", DataType::Utf8, true),
        Field::new("price", DataType::Float64, false),
        Field::new("freight_value", DataType::Float64, false),
        Field::new("total_payment_value", DataType::Float64, false),
        Field::new("payment_installments_max", DataType::Int64, true),
        Field::new("payment_type_most_common", DataType::Utf8, true),
    ]))
});

impl ToRecordBatch for MergedOrderRecord {
    fn schema() -> SchemaRef {
        MERGED_SCHEMA.clone()
    }

    fn to_record_batch(records: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                utf8(records, |r| Some(r.order_id.as_str())),
                utf8(records, |r| Some(r.customer_id.as_str())),
                utf8(records, |r| r.order_status.as_deref()),
                timestamp(records, |r| r.purchase_timestamp),
                timestamp(records, |r| r.approved_at),
                timestamp(records, |r| r.delivered_carrier_timestamp),
                timestamp(records, |r| r.delivered_customer_timestamp),
                timestamp(records, |r| r.estimated_delivery_timestamp),
                utf8(records, |r| r.customer_unique_id.as_deref()),
                int64(records, |r| r.zip_prefix),
                utf8(records, |r| r.city.as_deref()),
                utf8(records, |r| r.state.as_deref()),
                int64(records, |r| r.order_item_id),
                utf8(records, |r| r.product_id.as_deref()),
                utf8(records, |r| r.seller_id.as_deref()),
                float64(records, |r| r.price),
                float64(records, |r| r.freight_value),
                float64(records, |r| r.total_payment_value),
                int64(records, |r| r.payment_installments_max),
                utf8(records, |r| r.payment_type_most_common.as_deref()),
            ],
        )
    }
}

static SALES_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("customer_unique_id", DataType::Utf8, false),
        Field::new("customer_state", DataType::Utf8, false),
        Field::new("customer_city", DataType::Utf8, false),
        Field::new("total_spent", DataType::Float64, false),
        Field::new("total_orders", DataType::UInt64, false),
        Field::new("avg_payment_installments", DataType::Float64, true),
        Field::new("avg_order_value", DataType::Float64, true),
    ]))
});

impl ToRecordBatch for SalesSummaryRecord {
    fn schema() -> SchemaRef {
        SALES_SCHEMA.clone()
    }

    fn to_record_batch(records: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                utf8(records, |r| Some(r.customer_unique_id.as_str())),
                utf8(records, |r| Some(r.state.as_str())),
                utf8(records, |r| Some(r.city.as_str())),
                float64(records, |r| r.total_spent),
                uint64(records, |r| r.total_orders),
                nullable_float64(records, |r| r.avg_payment_installments),
                nullable_float64(records, |r| r.avg_order_value),
            ],
        )
    }
}

static DELIVERY_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("purchase_date", DataType::Date32, false),
        Field::new("customer_state", DataType::Utf8, false),
        Field::new("total_delivered_orders", DataType::UInt64, false),
        Field::new("avg_delivery_days", DataType::Float64, true),
        Field::new("orders_missed_sla", DataType::UInt64, false),
        Field::new("sla_miss_rate", DataType::Float64, true),
    ]))
});

impl ToRecordBatch for DeliveryPerformanceRecord {
    fn schema() -> SchemaRef {
        DELIVERY_SCHEMA.clone()
    }

    fn to_record_batch(records: &[Self]) -> Result<RecordBatch, ArrowError> {
        let dates = Date32Array::from_iter_values(
            records.iter().map(|r| days_since_epoch(r.purchase_date)),
        );
        RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(dates),
                utf8(records, |r| Some(r.state.as_str())),
                uint64(records, |r| r.total_delivered_orders),
                nullable_float64(records, |r| r.avg_delivery_days),
                uint64(records, |r| r.orders_missed_sla),
                nullable_float64(records, |r| r.sla_miss_rate),
            ],
        )
    }
}

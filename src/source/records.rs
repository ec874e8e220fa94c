//! Typed extraction of source records from decoded tables.

use super::table::{Row, Table};
use crate::model::{CustomerRecord, OrderItemRecord, OrderRecord, PaymentRecord};

/// Conversion from a normalized row into a typed record.
pub trait FromRow: Sized {
    /// Columns that must be present in the header for the source to be usable.
    const REQUIRED_COLUMNS: &'static [&'static str];

    /// Build a record, or `None` when the row lacks a key value.
    fn from_row(row: &Row<'_>) -> Option<Self>;
}

/// Records extracted from a table plus the number of rows dropped.
#[derive(Debug)]
pub struct Extracted<T> {
    pub records: Vec<T>,
    pub rejected: usize,
}

/// First required column absent from the table header, if any.
pub fn missing_column<T: FromRow>(table: &Table) -> Option<&'static str> {
    T::REQUIRED_COLUMNS
        .iter()
        .copied()
        .find(|column| !table.has_column(column))
}

/// Extract every row of `table` as `T`, in table order.
pub fn extract<T: FromRow>(table: &Table) -> Extracted<T> {
    let mut records = Vec::with_capacity(table.len());
    let mut rejected = 0;
    for row in table.rows() {
        match T::from_row(&row) {
            Some(record) => records.push(record),
            None => rejected += 1,
        }
    }
    Extracted { records, rejected }
}

impl FromRow for CustomerRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "customer_id",
        "customer_unique_id",
        "customer_zip_code_prefix",
        "customer_city",
        "customer_state",
    ];

    fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            customer_id: row.string("customer_id")?,
            customer_unique_id: row.string("customer_unique_id"),
            zip_prefix: row.int("customer_zip_code_prefix"),
            city: row.string("customer_city"),
            state: row.string("customer_state"),
        })
    }
}

impl FromRow for OrderRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "order_id",
        "customer_id",
        "order_status",
        "order_purchase_timestamp",
        "order_delivered_customer_date",
        "order_estimated_delivery_date",
    ];

    fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            order_id: row.string("order_id")?,
            customer_id: row.string("customer_id")?,
            order_status: row.string("order_status"),
            purchase_timestamp: row.timestamp("order_purchase_timestamp"),
            // "approved_at" matches neither date nor timestamp, so it arrives as text
            approved_at: row
                .text("order_approved_at")
                .and_then(super::normalize::parse_timestamp),
            delivered_carrier_timestamp: row.timestamp("order_delivered_carrier_date"),
            delivered_customer_timestamp: row.timestamp("order_delivered_customer_date"),
            estimated_delivery_timestamp: row.timestamp("order_estimated_delivery_date"),
        })
    }
}

impl FromRow for OrderItemRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["order_id", "price", "freight_value"];

    fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            order_id: row.string("order_id")?,
            order_item_id: row.int("order_item_id"),
            product_id: row.string("product_id"),
            seller_id: row.string("seller_id"),
            shipping_limit_date: row.timestamp("shipping_limit_date"),
            price: row.float("price"),
            freight_value: row.float("freight_value"),
        })
    }
}

impl FromRow for PaymentRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "order_id",
        "payment_value",
        "payment_installments",
        "payment_type",
    ];

    fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            order_id: row.string("order_id")?,
            payment_sequential: row.int("payment_sequential"),
            payment_type: row.string("payment_type"),
            payment_installments: row.int("payment_installments"),
            payment_value: row.float("payment_value"),
        })
    }
}

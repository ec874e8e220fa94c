//! Record types flowing through the pipeline.
//!
//! Source records mirror the four raw exports after column normalization.
//! Output records are what the sink persists. Every column that can be
//! absent after a left join is an `Option`; the join fills the three
//! numeric defaults explicitly.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Order status value counted by the delivery summary.
pub const DELIVERED_STATUS: &str = "delivered";

/// One row of the customers export.
///
/// `customer_id` identifies the customer as seen by a single order;
/// `customer_unique_id` is the person behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub customer_unique_id: Option<String>,
    #[serde(rename = "customer_zip_code_prefix")]
    pub zip_prefix: Option<i64>,
    #[serde(rename = "customer_city")]
    pub city: Option<String>,
    #[serde(rename = "customer_state")]
    pub state: Option<String>,
}

/// One row of the orders export.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    /// Lifecycle status: delivered, shipped, canceled, invoiced, ...
    pub order_status: Option<String>,
    pub purchase_timestamp: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
    pub delivered_carrier_timestamp: Option<NaiveDateTime>,
    /// Null until the order reaches the customer.
    pub delivered_customer_timestamp: Option<NaiveDateTime>,
    pub estimated_delivery_timestamp: Option<NaiveDateTime>,
}

/// One line item of an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemRecord {
    pub order_id: String,
    pub order_item_id: Option<i64>,
    pub product_id: Option<String>,
    pub seller_id: Option<String>,
    /// Not carried into the merged table.
    pub shipping_limit_date: Option<NaiveDateTime>,
    pub price: Option<f64>,
    pub freight_value: Option<f64>,
}

/// One payment row; an order may be paid in several rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub order_id: String,
    pub payment_sequential: Option<i64>,
    pub payment_type: Option<String>,
    pub payment_installments: Option<i64>,
    pub payment_value: Option<f64>,
}

/// Payments collapsed to one row per order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPayments {
    pub order_id: String,
    pub total_payment_value: f64,
    pub payment_installments_max: Option<i64>,
    pub payment_type_most_common: Option<String>,
}

/// One row per (order, line item) after the three left joins.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedOrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub order_status: Option<String>,
    pub purchase_timestamp: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
    pub delivered_carrier_timestamp: Option<NaiveDateTime>,
    pub delivered_customer_timestamp: Option<NaiveDateTime>,
    pub estimated_delivery_timestamp: Option<NaiveDateTime>,
    pub customer_unique_id: Option<String>,
    pub zip_prefix: Option<i64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub order_item_id: Option<i64>,
    pub product_id: Option<String>,
    pub seller_id: Option<String>,
    /// Zero when the order has no items.
    pub price: f64,
    /// Zero when the order has no items.
    pub freight_value: f64,
    /// Zero when the order has no payments.
    pub total_payment_value: f64,
    pub payment_installments_max: Option<i64>,
    pub payment_type_most_common: Option<String>,
}

impl MergedOrderRecord {
    pub fn is_delivered(&self) -> bool {
        self.order_status.as_deref() == Some(DELIVERED_STATUS)
    }
}

/// Spend per customer identity and region.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummaryRecord {
    pub customer_unique_id: String,
    pub state: String,
    pub city: String,
    pub total_spent: f64,
    pub total_orders: u64,
    /// Null when no order in the group carries an installment count.
    pub avg_payment_installments: Option<f64>,
    /// Null when `total_orders` is zero.
    pub avg_order_value: Option<f64>,
}

/// Delivery performance per purchase day and state.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPerformanceRecord {
    pub purchase_date: NaiveDate,
    pub state: String,
    pub total_delivered_orders: u64,
    /// Null when no order in the group has both timestamps.
    pub avg_delivery_days: Option<f64>,
    pub orders_missed_sla: u64,
    /// Null when `total_delivered_orders` is zero.
    pub sla_miss_rate: Option<f64>,
}

/// Divide, yielding `None` for a zero divisor instead of inf/NaN.
pub fn ratio(numerator: f64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator / denominator as f64)
}

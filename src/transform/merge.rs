//! Join engine.
//!
//! Builds the wide staging table from the four sources with three left
//! joins anchored on orders:
//!
//! 1. orders ⟕ customers on `customer_id`
//! 2. ⟕ order items on `order_id` (one row per item, `shipping_limit_date` dropped)
//! 3. ⟕ aggregated payments on `order_id`
//!
//! Rows keep the order table's order; matches on the right keep theirs.

use snafu::prelude::*;
use std::collections::HashMap;

use super::payments::aggregate_payments;
use crate::error::{EmptyInputsSnafu, MergeError};
use crate::model::{
    CustomerRecord, MergedOrderRecord, OrderItemRecord, OrderPayments, OrderRecord, PaymentRecord,
};
use crate::source::SourceKind;

/// The four loaded datasets handed to the join.
#[derive(Debug, Clone, Default)]
pub struct MergeInputs {
    pub customers: Vec<CustomerRecord>,
    pub orders: Vec<OrderRecord>,
    pub order_items: Vec<OrderItemRecord>,
    pub payments: Vec<PaymentRecord>,
}

impl MergeInputs {
    /// Datasets with no rows, in declaration order.
    pub fn empty_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::Customers => self.customers.is_empty(),
                SourceKind::Orders => self.orders.is_empty(),
                SourceKind::OrderItems => self.order_items.is_empty(),
                SourceKind::Payments => self.payments.is_empty(),
            })
            .collect()
    }
}

/// Merge the four datasets into one row per (order, item).
///
/// Fails if any input is empty: a merge missing a whole source would
/// silently understate the dataset.
pub fn merge(inputs: &MergeInputs) -> Result<Vec<MergedOrderRecord>, MergeError> {
    let empty = inputs.empty_sources();
    ensure!(empty.is_empty(), EmptyInputsSnafu { empty });

    let customers = group_by(&inputs.customers, |c| c.customer_id.as_str());
    let items = group_by(&inputs.order_items, |i| i.order_id.as_str());
    let payments = aggregate_payments(&inputs.payments);
    let payments: HashMap<&str, &OrderPayments> = payments
        .iter()
        .map(|p| (p.order_id.as_str(), p))
        .collect();

    let mut merged = Vec::with_capacity(inputs.order_items.len().max(inputs.orders.len()));
    for order in &inputs.orders {
        let payment = payments.get(order.order_id.as_str()).copied();
        for customer in matches_or_none(&customers, order.customer_id.as_str()) {
            for item in matches_or_none(&items, order.order_id.as_str()) {
                merged.push(merged_row(order, customer, item, payment));
            }
        }
    }

    Ok(merged)
}

fn group_by<'a, T, F>(records: &'a [T], key: F) -> HashMap<&'a str, Vec<&'a T>>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut groups: HashMap<&str, Vec<&T>> = HashMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
}

/// Right-side matches for a left join: every match, or a single `None`.
fn matches_or_none<'a, T>(groups: &HashMap<&str, Vec<&'a T>>, key: &str) -> Vec<Option<&'a T>> {
    match groups.get(key) {
        Some(found) => found.iter().map(|&r| Some(r)).collect(),
        None => vec![None],
    }
}

fn merged_row(
    order: &OrderRecord,
    customer: Option<&CustomerRecord>,
    item: Option<&OrderItemRecord>,
    payment: Option<&OrderPayments>,
) -> MergedOrderRecord {
    MergedOrderRecord {
        order_id: order.order_id.clone(),
        customer_id: order.customer_id.clone(),
        order_status: order.order_status.clone(),
        purchase_timestamp: order.purchase_timestamp,
        approved_at: order.approved_at,
        delivered_carrier_timestamp: order.delivered_carrier_timestamp,
        delivered_customer_timestamp: order.delivered_customer_timestamp,
        estimated_delivery_timestamp: order.estimated_delivery_timestamp,
        customer_unique_id: customer.and_then(|c| c.customer_unique_id.clone()),
        zip_prefix: customer.and_then(|c| c.zip_prefix),
        city: customer.and_then(|c| c.city.clone()),
        state: customer.and_then(|c| c.state.clone()),
        order_item_id: item.and_then(|i| i.order_item_id),
        product_id: item.and_then(|i| i.product_id.clone()),
        seller_id: item.and_then(|i| i.seller_id.clone()),
        // Default-fill: absent items or payments count as zero downstream
        price: item.and_then(|i| i.price).unwrap_or(0.0),
        freight_value: item.and_then(|i| i.freight_value).unwrap_or(0.0),
        total_payment_value: payment.map_or(0.0, |p| p.total_payment_value),
        payment_installments_max: payment.and_then(|p| p.payment_installments_max),
        payment_type_most_common: payment.and_then(|p| p.payment_type_most_common.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_fixtures::*;

    #[test]
    fn test_fan_out_one_row_per_item() {
        let inputs = MergeInputs {
            customers: vec![customer("c1", "u1", "SP", "sao paulo")],
            orders: vec![order("o1", "c1", "delivered")],
            order_items: vec![item("o1", 10.0, 2.0), item("o1", 12.0, 3.0)],
            payments: vec![
                payment("o1", 5.0, 1, "credit_card"),
                payment("o1", 5.0, 3, "credit_card"),
            ],
        };

        let merged = merge(&inputs).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].price, 10.0);
        assert_eq!(merged[1].price, 12.0);
        assert_eq!(merged[1].freight_value, 3.0);
        for row in &merged {
            assert_eq!(row.total_payment_value, 10.0);
            assert_eq!(row.payment_installments_max, Some(3));
            assert_eq!(row.state.as_deref(), Some("SP"));
        }
    }

    #[test]
    fn test_rows_per_order_is_max_of_one_and_item_count() {
        let inputs = MergeInputs {
            customers: vec![customer("c1", "u1", "SP", "sao paulo")],
            orders: vec![
                order("o1", "c1", "delivered"),
                order("o2", "c1", "canceled"),
                order("o3", "c1", "delivered"),
            ],
            order_items: vec![
                item("o3", 1.0, 0.5),
                item("o1", 1.0, 0.5),
                item("o3", 2.0, 0.5),
                item("o3", 3.0, 0.5),
            ],
            payments: vec![payment("o1", 1.0, 1, "boleto")],
        };

        let merged = merge(&inputs).unwrap();
        let count = |id: &str| merged.iter().filter(|r| r.order_id == id).count();
        assert_eq!(count("o1"), 1);
        assert_eq!(count("o2"), 1);
        assert_eq!(count("o3"), 3);

        // Left order preserved, items in their own order
        let ids: Vec<_> = merged.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2", "o3", "o3", "o3"]);
        let o3_prices: Vec<_> = merged[2..].iter().map(|r| r.price).collect();
        assert_eq!(o3_prices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_matches_are_null_or_zero_filled() {
        let inputs = MergeInputs {
            customers: vec![customer("c1", "u1", "SP", "sao paulo")],
            orders: vec![order("o1", "c-unknown", "shipped")],
            order_items: vec![item("other", 1.0, 1.0)],
            payments: vec![payment("other", 1.0, 1, "boleto")],
        };

        let merged = merge(&inputs).unwrap();
        assert_eq!(merged.len(), 1);
        let row = &merged[0];
        assert_eq!(row.customer_id, "c-unknown");
        assert_eq!(row.customer_unique_id, None);
        assert_eq!(row.state, None);
        assert_eq!(row.order_item_id, None);
        assert_eq!(row.price, 0.0);
        assert_eq!(row.freight_value, 0.0);
        assert_eq!(row.total_payment_value, 0.0);
        assert_eq!(row.payment_type_most_common, None);
    }

    #[test]
    fn test_null_item_price_is_zero_filled() {
        let mut no_price = item("o1", 0.0, 0.0);
        no_price.price = None;
        no_price.freight_value = None;

        let inputs = MergeInputs {
            customers: vec![customer("c1", "u1", "SP", "sao paulo")],
            orders: vec![order("o1", "c1", "delivered")],
            order_items: vec![no_price],
            payments: vec![payment("o1", 1.0, 1, "boleto")],
        };

        let merged = merge(&inputs).unwrap();
        assert_eq!(merged[0].price, 0.0);
        assert_eq!(merged[0].freight_value, 0.0);
    }

    #[test]
    fn test_empty_payments_fails_the_merge() {
        let inputs = MergeInputs {
            customers: vec![customer("c1", "u1", "SP", "sao paulo")],
            orders: vec![order("o1", "c1", "delivered")],
            order_items: vec![item("o1", 1.0, 1.0)],
            payments: Vec::new(),
        };

        let err = merge(&inputs).unwrap_err();
        let MergeError::EmptyInputs { empty } = err;
        assert_eq!(empty, vec![SourceKind::Payments]);
    }

    #[test]
    fn test_all_empty_sources_reported() {
        let err = merge(&MergeInputs::default()).unwrap_err();
        let MergeError::EmptyInputs { empty } = err;
        assert_eq!(empty, SourceKind::ALL.to_vec());
    }

    #[test]
    fn test_duplicate_customer_ids_fan_out() {
        let inputs = MergeInputs {
            customers: vec![
                customer("c1", "u1", "SP", "sao paulo"),
                customer("c1", "u2", "RJ", "rio de janeiro"),
            ],
            orders: vec![order("o1", "c1", "delivered")],
            order_items: vec![item("o1", 1.0, 1.0)],
            payments: vec![payment("o1", 1.0, 1, "boleto")],
        };

        let merged = merge(&inputs).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].customer_unique_id.as_deref(), Some("u1"));
        assert_eq!(merged[1].customer_unique_id.as_deref(), Some("u2"));
    }
}

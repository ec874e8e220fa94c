//! Payment pre-aggregation.
//!
//! Collapses payment rows to one row per order before the join, so the
//! per-item fan-out of the merge cannot multiply payment totals.

use indexmap::IndexMap;

use crate::model::{OrderPayments, PaymentRecord};

#[derive(Default)]
struct Accumulator<'a> {
    total: f64,
    installments_max: Option<i64>,
    /// Insertion order is first appearance, which breaks ties in the mode.
    type_counts: IndexMap<&'a str, usize>,
}

/// Aggregate payments per order, in order of each order's first payment row.
///
/// - `total_payment_value`: sum of non-null `payment_value`
/// - `payment_installments_max`: max of non-null `payment_installments`
/// - `payment_type_most_common`: most frequent non-null `payment_type`,
///   ties going to the type seen first
pub fn aggregate_payments(payments: &[PaymentRecord]) -> Vec<OrderPayments> {
    let mut by_order: IndexMap<&str, Accumulator<'_>> = IndexMap::new();

    for payment in payments {
        let acc = by_order.entry(payment.order_id.as_str()).or_default();
        acc.total += payment.payment_value.unwrap_or(0.0);
        acc.installments_max = acc.installments_max.max(payment.payment_installments);
        if let Some(kind) = payment.payment_type.as_deref() {
            *acc.type_counts.entry(kind).or_insert(0) += 1;
        }
    }

    by_order
        .into_iter()
        .map(|(order_id, acc)| OrderPayments {
            order_id: order_id.to_string(),
            total_payment_value: acc.total,
            payment_installments_max: acc.installments_max,
            payment_type_most_common: most_common(&acc.type_counts).map(str::to_string),
        })
        .collect()
}

/// First key holding the highest count.
fn most_common<'a>(counts: &IndexMap<&'a str, usize>) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for (&value, &count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

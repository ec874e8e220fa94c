//! Sales summary per customer identity and region.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::model::{MergedOrderRecord, SalesSummaryRecord, ratio};

type GroupKey = (String, String, String);

#[derive(Default)]
struct Group<'a> {
    orders: HashSet<&'a str>,
    total_spent: f64,
    installments_sum: f64,
    installments_count: u64,
}

impl<'a> Group<'a> {
    /// Order-level values are repeated on every item row, so only the first
    /// row of each order contributes.
    fn add(&mut self, row: &'a MergedOrderRecord) {
        if !self.orders.insert(row.order_id.as_str()) {
            return;
        }
        self.total_spent += row.total_payment_value;
        if let Some(installments) = row.payment_installments_max {
            self.installments_sum += installments as f64;
            self.installments_count += 1;
        }
    }

    fn finish(self, (customer_unique_id, state, city): GroupKey) -> SalesSummaryRecord {
        let total_orders = self.orders.len() as u64;
        SalesSummaryRecord {
            customer_unique_id,
            state,
            city,
            total_spent: self.total_spent,
            total_orders,
            avg_payment_installments: ratio(self.installments_sum, self.installments_count),
            avg_order_value: ratio(self.total_spent, total_orders),
        }
    }
}

/// Group merged rows by `(customer_unique_id, state, city)`.
///
/// Rows with a null in any grouping column are left out. Output is sorted
/// by the group key.
pub fn sales_summary(merged: &[MergedOrderRecord]) -> Vec<SalesSummaryRecord> {
    let mut groups: BTreeMap<GroupKey, Group<'_>> = BTreeMap::new();
    let mut ungrouped = 0usize;

    for row in merged {
        let (Some(unique_id), Some(state), Some(city)) = (
            row.customer_unique_id.as_ref(),
            row.state.as_ref(),
            row.city.as_ref(),
        ) else {
            ungrouped += 1;
            continue;
        };
        groups
            .entry((unique_id.clone(), state.clone(), city.clone()))
            .or_default()
            .add(row);
    }

    if ungrouped > 0 {
        debug!("{} merged rows without customer identity left out of sales summary", ungrouped);
    }

    groups
        .into_iter()
        .map(|(key, group)| group.finish(key))
        .collect()
}

//! Delivery performance per purchase day and state.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::model::{DeliveryPerformanceRecord, MergedOrderRecord, ratio};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fractional days between purchase and delivery, `None` if either is missing.
pub fn delivery_time_days(
    purchased: Option<NaiveDateTime>,
    delivered: Option<NaiveDateTime>,
) -> Option<f64> {
    let elapsed = delivered? - purchased?;
    Some(elapsed.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY)
}

/// Delivered strictly after the estimate. A missing timestamp is not a miss.
pub fn sla_missed(delivered: Option<NaiveDateTime>, estimated: Option<NaiveDateTime>) -> bool {
    matches!((delivered, estimated), (Some(d), Some(e)) if d > e)
}

#[derive(Default)]
struct Group<'a> {
    orders: HashSet<&'a str>,
    delivery_days_sum: f64,
    delivery_days_count: u64,
    missed_sla: u64,
}

impl<'a> Group<'a> {
    fn add(&mut self, row: &'a MergedOrderRecord) {
        if !self.orders.insert(row.order_id.as_str()) {
            return;
        }
        if let Some(days) =
            delivery_time_days(row.purchase_timestamp, row.delivered_customer_timestamp)
        {
            self.delivery_days_sum += days;
            self.delivery_days_count += 1;
        }
        if sla_missed(
            row.delivered_customer_timestamp,
            row.estimated_delivery_timestamp,
        ) {
            self.missed_sla += 1;
        }
    }

    fn finish(self, (purchase_date, state): (NaiveDate, String)) -> DeliveryPerformanceRecord {
        let total_delivered_orders = self.orders.len() as u64;
        DeliveryPerformanceRecord {
            purchase_date,
            state,
            total_delivered_orders,
            avg_delivery_days: ratio(self.delivery_days_sum, self.delivery_days_count),
            orders_missed_sla: self.missed_sla,
            sla_miss_rate: ratio(self.missed_sla as f64, total_delivered_orders),
        }
    }
}

/// Summarize delivered orders by `(purchase_date, state)`.
///
/// Each order counts once per group however many item rows it has. Rows
/// without a purchase timestamp or state have no group and are left out.
pub fn delivery_summary(merged: &[MergedOrderRecord]) -> Vec<DeliveryPerformanceRecord> {
    let mut groups: BTreeMap<(NaiveDate, String), Group<'_>> = BTreeMap::new();
    let mut ungrouped = 0usize;

    for row in merged.iter().filter(|r| r.is_delivered()) {
        let (Some(purchased), Some(state)) = (row.purchase_timestamp, row.state.as_ref()) else {
            ungrouped += 1;
            continue;
        };
        groups
            .entry((purchased.date(), state.clone()))
            .or_default()
            .add(row);
    }

    if ungrouped > 0 {
        debug!(
            "{} delivered rows without purchase date or state left out of delivery summary",
            ungrouped
        );
    }

    groups
        .into_iter()
        .map(|(key, group)| group.finish(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_fixtures::{merged, ts};

    fn delivered(order_id: &str, purchased: &str, delivered: &str, estimated: &str) -> MergedOrderRecord {
        let mut r = merged(order_id);
        r.order_status = Some("delivered".to_string());
        r.state = Some("SP".to_string());
        r.purchase_timestamp = Some(ts(purchased));
        r.delivered_customer_timestamp = Some(ts(delivered));
        r.estimated_delivery_timestamp = Some(ts(estimated));
        r
    }

    #[test]
    fn test_delivery_time_is_fractional_days() {
        let days = delivery_time_days(
            Some(ts("2018-01-01 00:00:00")),
            Some(ts("2018-01-03 12:00:00")),
        );
        assert_eq!(days, Some(2.5));
        assert_eq!(delivery_time_days(None, Some(ts("2018-01-03 12:00:00"))), None);
        assert_eq!(delivery_time_days(Some(ts("2018-01-03 12:00:00")), None), None);
    }

    #[test]
    fn test_sla_miss_is_strictly_after_estimate() {
        let estimate = ts("2018-01-10 00:00:00");
        assert!(sla_missed(Some(ts("2018-01-10 00:00:01")), Some(estimate)));
        assert!(!sla_missed(Some(estimate), Some(estimate)));
        assert!(!sla_missed(Some(ts("2018-01-09 00:00:00")), Some(estimate)));
        assert!(!sla_missed(None, Some(estimate)));
        assert!(!sla_missed(Some(estimate), None));
    }

    #[test]
    fn test_groups_by_purchase_day_and_state() {
        let rows = vec![
            delivered("o1", "2018-01-01 08:00:00", "2018-01-03 08:00:00", "2018-01-10 00:00:00"),
            delivered("o2", "2018-01-01 20:00:00", "2018-01-12 20:00:00", "2018-01-10 00:00:00"),
            delivered("o3", "2018-01-02 09:00:00", "2018-01-04 09:00:00", "2018-01-10 00:00:00"),
        ];

        let summary = delivery_summary(&rows);
        assert_eq!(summary.len(), 2);

        let first = &summary[0];
        assert_eq!(first.purchase_date, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
        assert_eq!(first.total_delivered_orders, 2);
        assert_eq!(first.avg_delivery_days, Some(6.5));
        assert_eq!(first.orders_missed_sla, 1);
        assert_eq!(first.sla_miss_rate, Some(0.5));

        assert_eq!(summary[1].total_delivered_orders, 1);
        assert_eq!(summary[1].sla_miss_rate, Some(0.0));
    }

    #[test]
    fn test_item_rows_count_once_and_rate_stays_bounded() {
        let late = delivered("o1", "2018-01-01 00:00:00", "2018-01-20 00:00:00", "2018-01-10 00:00:00");
        let rows = vec![late.clone(), late.clone(), late];

        let summary = delivery_summary(&rows);
        assert_eq!(summary[0].total_delivered_orders, 1);
        assert_eq!(summary[0].orders_missed_sla, 1);
        assert_eq!(summary[0].sla_miss_rate, Some(1.0));
        assert_eq!(summary[0].avg_delivery_days, Some(19.0));
    }

    #[test]
    fn test_only_delivered_rows_are_counted() {
        let mut shipped = delivered("o2", "2018-01-01 00:00:00", "2018-01-02 00:00:00", "2018-01-10 00:00:00");
        shipped.order_status = Some("shipped".to_string());
        let rows = vec![
            delivered("o1", "2018-01-01 00:00:00", "2018-01-02 00:00:00", "2018-01-10 00:00:00"),
            shipped,
        ];

        let summary = delivery_summary(&rows);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_delivered_orders, 1);
    }

    #[test]
    fn test_missing_delivery_timestamp_only_drops_latency() {
        let mut pending = delivered("o2", "2018-01-01 00:00:00", "2018-01-02 00:00:00", "2018-01-10 00:00:00");
        pending.delivered_customer_timestamp = None;
        let rows = vec![
            delivered("o1", "2018-01-01 00:00:00", "2018-01-03 00:00:00", "2018-01-10 00:00:00"),
            pending,
        ];

        let summary = delivery_summary(&rows);
        assert_eq!(summary[0].total_delivered_orders, 2);
        assert_eq!(summary[0].avg_delivery_days, Some(2.0));
        assert_eq!(summary[0].orders_missed_sla, 0);
    }

    #[test]
    fn test_no_latency_in_group_yields_null_average() {
        let mut row = delivered("o1", "2018-01-01 00:00:00", "2018-01-02 00:00:00", "2018-01-10 00:00:00");
        row.delivered_customer_timestamp = None;

        let summary = delivery_summary(&[row]);
        assert_eq!(summary[0].avg_delivery_days, None);
        assert_eq!(summary[0].sla_miss_rate, Some(0.0));
    }

    #[test]
    fn test_rows_without_purchase_date_are_left_out() {
        let mut row = delivered("o1", "2018-01-01 00:00:00", "2018-01-02 00:00:00", "2018-01-10 00:00:00");
        row.purchase_timestamp = None;
        assert!(delivery_summary(&[row]).is_empty());
    }
}

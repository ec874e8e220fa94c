//! Pure transformations from loaded sources to the three output tables.
//!
//! Nothing here performs I/O. The pipeline runs these on the blocking pool.

pub mod delivery;
pub mod merge;
pub mod payments;
pub mod sales;

pub use delivery::{delivery_summary, delivery_time_days, sla_missed};
pub use merge::{MergeInputs, merge};
pub use payments::aggregate_payments;
pub use sales::sales_summary;

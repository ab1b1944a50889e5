//! Percentile index arithmetic for the billing convention.
//!
//! The billing function ignores each server's top 5% of days: up to
//! `⌈D·0.05⌉` days per server may be loaded freely, and the billed value is
//! the `⌈D·0.95⌉−1`-th entry of the ascending-sorted daily loads. Both
//! indices are computed in integer arithmetic; `0.05 · D` in f64 rounds the
//! wrong way for some D (e.g. `20 · 0.05` lands just above 1.0).

/// Number of days per server that may be loaded freely: `⌈D·0.05⌉`.
pub fn free_day_quota(days: usize) -> usize {
    days.div_ceil(20)
}

/// Index of the 95th-percentile entry in an ascending-sorted vector of `D`
/// daily loads: `⌈D·0.95⌉ − 1`.
///
/// Returns 0 for `D = 1` (the single load is the separator). `days` must be
/// nonzero; an empty demand set is rejected at parse time.
pub fn sep_index(days: usize) -> usize {
    debug_assert!(days > 0, "sep_index over empty day set");
    (19 * days).div_ceil(20).saturating_sub(1)
}

/// Number of days strictly above the separator position: `D − ⌈D·0.95⌉`.
pub fn top5_count(days: usize) -> usize {
    days - (19 * days).div_ceil(20)
}

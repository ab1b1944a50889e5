//! # edgeplan-algo: The Allocation Engine
//!
//! Produces, for a pre-parsed topology and demand time-series, an
//! allocation (per day, per stream, chosen server) minimising the
//! 95th-percentile billing function: each server is billed on the
//! 95th-percentile of its daily loads, so up to `⌈D·0.05⌉` days per server
//! are deliberately saturated and excluded from the bill.
//!
//! ## Pipeline
//!
//! | Stage | Module | Role |
//! |-------|--------|------|
//! | 1 | [`hot_days`] | Pre-designate each server's free days |
//! | 2 | [`allocator`] | Per-day three-phase assignment (greedy / base / residual) |
//! | 3 | [`result_set`] | Retain the full plan, compute separators and the grade |
//! | 4 | [`rebalance`] | Migrate streams off over-separator days |
//!
//! The engine is single-threaded and fully deterministic: identical inputs
//! produce byte-identical plans. [`planner::plan`] runs the whole pipeline
//! and enforces the completeness / reachability / capacity invariants after
//! every stage; [`verify`] re-checks a finished solution from the output
//! alone.

pub mod allocator;
pub mod bounded_heap;
pub mod hot_days;
pub mod planner;
pub mod rebalance;
pub mod result_set;
pub mod verify;

pub use allocator::{allocate_day, AllocatorState};
pub use bounded_heap::BoundedHeap;
pub use hot_days::{select_hot_days, HotDayPlan};
pub use planner::{plan, Plan, PlanSummary, PlannerOptions};
pub use rebalance::RebalanceStats;
pub use result_set::{DayResult, PlacedStream, ResultSet, SepInfo};
pub use verify::{verify_solution, VerifyReport};

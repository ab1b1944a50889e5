//! # edgeplan-io: Input Parsing and Solution Serialisation
//!
//! Importers for the planner's fixed four-file input directory
//! (`site_bandwidth.csv`, `config.ini`, `qos.csv`, `demand.csv`), the
//! `solution.txt` writer, and the matching reader used by the checker.
//!
//! All parse failures surface as [`edgeplan_core::PlanError::Parse`] (or
//! `Config` for `config.ini`) with the offending file and line in the
//! message; nothing is retried and no partial output is ever written.

pub mod export;
pub mod importers;
pub mod solution;

pub use export::write_solution;
pub use importers::{
    load_config, load_demand, load_inputs, load_qos, load_servers, PlanInputs,
};
pub use solution::read_solution;

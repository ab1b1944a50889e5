use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch bandwidth allocation planner", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan allocations for an input directory and write the solution
    Plan {
        /// Directory holding site_bandwidth.csv, config.ini, qos.csv, demand.csv
        #[arg(long, default_value = "data")]
        data: PathBuf,
        /// Where to write the solution
        #[arg(long, default_value = "solution.txt")]
        out: PathBuf,
        /// Number of migrate passes over the finished plan
        #[arg(long, default_value_t = 100)]
        migrate_passes: usize,
        /// Run a top-5 adjust pass after every N-th migrate pass (0 disables)
        #[arg(long, default_value_t = 10)]
        adjust_every: usize,
        /// Write a JSON run summary next to the solution
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Check a solution file against its inputs and recompute the grade
    Verify {
        /// Directory holding the four input files
        #[arg(long, default_value = "data")]
        data: PathBuf,
        /// Solution file to check
        #[arg(long, default_value = "solution.txt")]
        solution: PathBuf,
    },
    /// Print topology and demand statistics for an input directory
    Inspect {
        /// Directory holding the four input files
        #[arg(long, default_value = "data")]
        data: PathBuf,
    },
}

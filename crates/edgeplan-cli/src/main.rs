use clap::Parser;
use edgeplan_algo::PlannerOptions;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Plan {
            data,
            out,
            migrate_passes,
            adjust_every,
            summary,
        } => {
            info!("planning {} -> {}", data.display(), out.display());
            let options = PlannerOptions {
                migrate_passes: *migrate_passes,
                adjust_every: *adjust_every,
            };
            commands::plan::run(data, out, &options, summary.as_deref())
        }
        Commands::Verify { data, solution } => {
            info!("verifying {} against {}", solution.display(), data.display());
            commands::verify::run(data, solution)
        }
        Commands::Inspect { data } => commands::inspect::run(data),
    };

    if let Err(e) = result {
        error!("command failed: {e:#}");
        std::process::exit(1);
    }
}

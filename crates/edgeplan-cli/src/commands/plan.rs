use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use edgeplan_algo::{plan, PlannerOptions};
use edgeplan_core::Diagnostics;
use edgeplan_io::{load_inputs, write_solution};
use tracing::{info, warn};

pub fn run(
    data: &Path,
    out: &Path,
    options: &PlannerOptions,
    summary_out: Option<&Path>,
) -> Result<()> {
    let inputs = load_inputs(data)?;
    info!("loaded {}; {}", inputs.topology.stats(), inputs.demand.stats());

    let mut diag = Diagnostics::new();
    inputs.topology.validate_into(&mut diag);
    for issue in diag.warnings() {
        warn!("{}", issue);
    }
    if diag.has_errors() {
        bail!("topology validation failed:\n{}", diag);
    }

    let outcome = plan(&inputs.topology, &inputs.config, &inputs.demand, options)?;
    write_solution(out, &outcome.solution, &inputs.topology, &inputs.demand.names)?;
    info!("solution written to {}", out.display());

    println!("grade = {:.2}", outcome.summary.grade);
    if let Some(center) = outcome.summary.center_grade {
        println!("center grade = {center}");
    }
    if let Some(path) = summary_out {
        let file = fs::File::create(path)
            .with_context(|| format!("creating summary file {}", path.display()))?;
        serde_json::to_writer_pretty(file, &outcome.summary)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        println!("summary written to {}", path.display());
    }
    Ok(())
}

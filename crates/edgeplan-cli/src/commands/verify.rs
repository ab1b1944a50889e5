use std::path::Path;

use anyhow::Result;
use edgeplan_algo::verify_solution;
use edgeplan_io::{load_inputs, read_solution};

pub fn run(data: &Path, solution_path: &Path) -> Result<()> {
    let inputs = load_inputs(data)?;
    let solution = read_solution(solution_path, &inputs.topology, &inputs.demand)?;
    let report = verify_solution(&inputs.topology, &inputs.config, &inputs.demand, &solution)?;
    println!(
        "solution ok: {} assignments over {} days",
        report.assignments, report.days
    );
    println!("grade = {:.2}", report.grade);
    if let Some(center) = report.center_grade {
        println!("center grade = {center}");
    }
    Ok(())
}

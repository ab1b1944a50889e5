//! `solution.txt` writer.
//!
//! Emits one line per client per day in the input-header client order. The
//! plan is complete before this module runs, so the file is staged to a
//! sibling temp path and renamed into place: a failing run leaves no
//! partial output behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use edgeplan_core::{PlanError, PlanResult, Solution, StreamNames, Topology};

/// Write `solution` to `path`, resolving ids back to names.
pub fn write_solution(
    path: &Path,
    solution: &Solution,
    topology: &Topology,
    names: &StreamNames,
) -> PlanResult<()> {
    let tmp_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => format!("{name}.tmp"),
        None => {
            return Err(PlanError::Validation(format!(
                "output path has no file name: {}",
                path.display()
            )))
        }
    };
    let tmp_path = path.with_file_name(tmp_name);

    {
        let file = fs::File::create(&tmp_path)?;
        let mut out = BufWriter::new(file);
        for day in &solution.days {
            for line in &day.allocations {
                let client = &topology.clients[line.client.value()];
                write!(out, "{}:", client.name)?;
                let mut first = true;
                for cell in &line.cells {
                    if cell.streams.is_empty() {
                        continue;
                    }
                    if !first {
                        write!(out, ",")?;
                    }
                    first = false;
                    write!(out, "<{}", topology.servers[cell.server.value()].name)?;
                    for &stream in &cell.streams {
                        write!(out, ",{}", names.name(stream))?;
                    }
                    write!(out, ">")?;
                }
                writeln!(out)?;
            }
        }
        out.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

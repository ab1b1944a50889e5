//! Independent checker for a finished solution.
//!
//! Re-validates a parsed solution against the inputs alone: every demanded
//! stream carried exactly once by a reachable server, no server over
//! capacity on any day, the free-day bound respected, and the grade
//! recomputed from the output. The planner's own result set never enters;
//! this is the round-trip safety net for the emitted file.

use std::collections::HashMap;

use edgeplan_core::{
    free_day_quota, sep_index, DemandSet, PlanConfig, PlanError, PlanResult, Solution, Topology,
};
use serde::Serialize;

/// Outcome of a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub days: usize,
    pub assignments: usize,
    /// Grade recomputed from the solution's per-day per-server loads
    pub grade: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_grade: Option<i64>,
}

/// Check `solution` against the inputs; any violated invariant is an error.
pub fn verify_solution(
    topology: &Topology,
    config: &PlanConfig,
    demand: &DemandSet,
    solution: &Solution,
) -> PlanResult<VerifyReport> {
    if solution.days.len() != demand.day_count() {
        return Err(PlanError::Validation(format!(
            "solution covers {} days, demand has {}",
            solution.days.len(),
            demand.day_count()
        )));
    }

    let server_count = topology.server_count();
    let day_count = demand.day_count();
    let mut loads = vec![vec![0i64; day_count]; server_count];
    let mut center_loads = vec![vec![0i64; day_count]; server_count];
    let mut assignments = 0usize;

    for (d, (sol_day, dem_day)) in solution.days.iter().zip(&demand.days).enumerate() {
        // (stream, client) -> demanded size, drained as assignments check in.
        let mut expected: HashMap<(u32, usize), i64> = HashMap::new();
        for row in &dem_day.streams {
            for (c, &size) in row.sizes.iter().enumerate() {
                if size > 0 {
                    expected.insert((row.stream.value(), c), size);
                }
            }
        }

        for line in &sol_day.allocations {
            let client = &topology.clients[line.client.value()];
            for cell in &line.cells {
                if client.server_position(cell.server).is_none() {
                    return Err(PlanError::Validation(format!(
                        "day {}: client {} assigned to unreachable server {}",
                        dem_day.label,
                        client.name,
                        topology.servers[cell.server.value()].name
                    )));
                }
                for &stream in &cell.streams {
                    let Some(size) = expected.remove(&(stream.value(), line.client.value()))
                    else {
                        return Err(PlanError::Validation(format!(
                            "day {}: stream `{}` of client {} not demanded or carried twice",
                            dem_day.label,
                            demand.names.name(stream),
                            client.name
                        )));
                    };
                    let s = cell.server.value();
                    loads[s][d] += size;
                    center_loads[s][d] = center_loads[s][d].max(size);
                    assignments += 1;
                }
            }
        }

        if let Some((&(stream, c), _)) = expected.iter().next() {
            return Err(PlanError::Validation(format!(
                "day {}: stream `{}` of client {} not carried",
                dem_day.label,
                demand.names.name(edgeplan_core::StreamId::new(stream)),
                topology.clients[c].name
            )));
        }
    }

    for (s, server) in topology.servers.iter().enumerate() {
        for d in 0..day_count {
            if loads[s][d] > server.capacity {
                return Err(PlanError::Validation(format!(
                    "day {}: server {} over capacity ({} > {})",
                    demand.days[d].label, server.name, loads[s][d], server.capacity
                )));
            }
        }
    }

    // Grade and the free-day bound, both from the solution's own loads.
    let p = sep_index(day_count);
    let quota = free_day_quota(day_count);
    let base = config.base_cost as f64;
    let mut grade = 0.0;
    for (s, server) in topology.servers.iter().enumerate() {
        let mut sorted = loads[s].clone();
        sorted.sort_unstable();
        if sorted[day_count - 1] == 0 {
            continue;
        }
        let sep = sorted[p];
        let over_sep = loads[s].iter().filter(|&&l| l > sep).count();
        if over_sep > quota {
            return Err(PlanError::Validation(format!(
                "server {}: {} days above the separator, quota is {}",
                server.name, over_sep, quota
            )));
        }
        let sep = sep as f64;
        if sep <= base {
            grade += base;
        } else {
            grade += sep + (sep - base) * (sep - base) / server.capacity as f64;
        }
    }

    let center_grade = config.center_enabled().then(|| {
        let mut daily: Vec<i64> = (0..day_count)
            .map(|d| (0..server_count).map(|s| center_loads[s][d]).sum())
            .collect();
        daily.sort_unstable();
        daily[p]
    });

    Ok(VerifyReport {
        days: day_count,
        assignments,
        grade,
        center_grade,
    })
}

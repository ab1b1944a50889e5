//! Planner orchestration: feasibility check, hot-day selection, the day
//! loop, the rebalance schedule, and the end-to-end invariants.

use std::collections::HashMap;

use edgeplan_core::{
    free_day_quota, DemandSet, PlanConfig, PlanError, PlanResult, Solution, Topology,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allocator::{allocate_day, AllocatorState};
use crate::hot_days::select_hot_days;
use crate::rebalance::RebalanceStats;
use crate::result_set::ResultSet;

/// Runtime knobs of the planner (the billing model itself comes from
/// [`PlanConfig`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerOptions {
    /// Number of migrate passes over the finished plan
    pub migrate_passes: usize,
    /// Run a top-5 adjust pass after every N-th migrate pass; 0 disables
    pub adjust_every: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            migrate_passes: 100,
            adjust_every: 10,
        }
    }
}

/// What a run produced, for the summary file and the logs.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub days: usize,
    pub servers: usize,
    pub clients: usize,
    pub free_day_quota: usize,
    pub grade_before_rebalance: f64,
    pub grade: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_grade: Option<i64>,
    pub rebalance: RebalanceStats,
}

/// A finished plan: the output form plus its summary.
#[derive(Debug, Clone)]
pub struct Plan {
    pub solution: Solution,
    pub summary: PlanSummary,
}

/// Run the full pipeline and return the plan.
pub fn plan(
    topology: &Topology,
    config: &PlanConfig,
    demand: &DemandSet,
    options: &PlannerOptions,
) -> PlanResult<Plan> {
    config.validate()?;
    if demand.days.is_empty() {
        return Err(PlanError::Validation("demand set has no days".into()));
    }
    check_feasible(topology, demand)?;

    let quota = free_day_quota(demand.day_count());
    let hot = select_hot_days(topology, demand);
    let mut state = AllocatorState::new(topology.server_count(), config.base_cost, quota);
    let mut result = ResultSet::new(topology, config);
    for (idx, day) in demand.days.iter().enumerate() {
        let day_result = allocate_day(topology, config, day, &hot.hot[idx], &mut state)?;
        result.push_day(day_result);
    }
    let grade_before_rebalance = result.grade();
    info!(
        "initial plan complete over {} days: grade {:.2}",
        demand.day_count(),
        grade_before_rebalance
    );

    let mut rebalance = RebalanceStats::default();
    for pass in 1..=options.migrate_passes {
        let mut pass_moves = result.migrate_pass(topology);
        rebalance.migrate_moves += pass_moves;
        if options.adjust_every != 0 && pass % options.adjust_every == 0 {
            let adjusted = result.adjust_top5_pass(topology);
            rebalance.adjust_moves += adjusted;
            pass_moves += adjusted;
        }
        rebalance.passes = pass;
        debug!("rebalance pass {pass}: {pass_moves} moves");
        if pass_moves == 0 {
            break;
        }
    }

    check_invariants(&result, topology, demand)?;
    let grade = result.grade();
    info!(
        "final grade {:.2} after {} rebalance pass(es), {:.2} saved",
        grade,
        rebalance.passes,
        grade_before_rebalance - grade
    );

    let center_grade = config.center_enabled().then(|| result.center_grade());
    let solution = result.to_solution(topology)?;
    Ok(Plan {
        solution,
        summary: PlanSummary {
            days: demand.day_count(),
            servers: topology.server_count(),
            clients: topology.client_count(),
            free_day_quota: quota,
            grade_before_rebalance,
            grade,
            center_grade,
            rebalance,
        },
    })
}

/// Reject demand no plan can place: a demanded stream whose owner reaches
/// no server large enough, or a client-day total beyond the combined
/// capacity of its reachable servers.
fn check_feasible(topology: &Topology, demand: &DemandSet) -> PlanResult<()> {
    let max_reachable_cap: Vec<i64> = topology
        .clients
        .iter()
        .map(|c| {
            c.reachable
                .iter()
                .map(|&s| topology.servers[s.value()].capacity)
                .max()
                .unwrap_or(0)
        })
        .collect();

    for day in &demand.days {
        for row in &day.streams {
            for (c, &size) in row.sizes.iter().enumerate() {
                if size == 0 {
                    continue;
                }
                if size > max_reachable_cap[c] {
                    return Err(PlanError::Infeasible(format!(
                        "stream `{}` of client {} (size {}) exceeds every reachable capacity at {}",
                        demand.names.name(row.stream),
                        topology.clients[c].name,
                        size,
                        day.label
                    )));
                }
            }
        }
        for (c, client) in topology.clients.iter().enumerate() {
            let total = day.client_total(c);
            if total > client.reach_capacity {
                return Err(PlanError::Infeasible(format!(
                    "client {} demands {} at {} but can reach only {} of capacity",
                    client.name, total, day.label, client.reach_capacity
                )));
            }
        }
    }
    Ok(())
}

/// Full post-plan audit: completeness, reachability, capacity, free-day
/// bound. Violations here are planner bugs, never input errors.
fn check_invariants(
    result: &ResultSet,
    topology: &Topology,
    demand: &DemandSet,
) -> PlanResult<()> {
    for (d, (day_result, day_demand)) in result.days.iter().zip(&demand.days).enumerate() {
        let mut placed: HashMap<(u32, usize), i64> = HashMap::new();
        for (s, streams) in day_result.server_streams.iter().enumerate() {
            let server = &topology.servers[s];
            let mut load = 0i64;
            for p in streams {
                load += p.size;
                let client = &topology.clients[p.client.value()];
                if client.server_position(server.id).is_none() {
                    return Err(PlanError::Invariant(format!(
                        "day {d}: stream of client {} on unreachable server {}",
                        client.name, server.name
                    )));
                }
                if placed
                    .insert((p.stream.value(), p.client.value()), p.size)
                    .is_some()
                {
                    return Err(PlanError::Invariant(format!(
                        "day {d}: stream `{}` of client {} carried twice",
                        demand.names.name(p.stream),
                        client.name
                    )));
                }
            }
            if load != day_result.server_loads[s] {
                return Err(PlanError::Invariant(format!(
                    "day {d}: server {} load {} disagrees with stream sum {load}",
                    server.name, day_result.server_loads[s]
                )));
            }
            if load > server.capacity {
                return Err(PlanError::Invariant(format!(
                    "day {d}: server {} over capacity ({load} > {})",
                    server.name, server.capacity
                )));
            }
        }
        for row in &day_demand.streams {
            for (c, &size) in row.sizes.iter().enumerate() {
                if size == 0 {
                    continue;
                }
                match placed.remove(&(row.stream.value(), c)) {
                    Some(carried) if carried == size => {}
                    Some(carried) => {
                        return Err(PlanError::Invariant(format!(
                            "day {d}: stream `{}` of client {} carried with size {carried}, demanded {size}",
                            demand.names.name(row.stream),
                            topology.clients[c].name
                        )))
                    }
                    None => {
                        return Err(PlanError::Invariant(format!(
                            "day {d}: stream `{}` of client {} not carried",
                            demand.names.name(row.stream),
                            topology.clients[c].name
                        )))
                    }
                }
            }
        }
        if let Some(((stream, c), _)) = placed.into_iter().next() {
            return Err(PlanError::Invariant(format!(
                "day {d}: stream `{}` of client {} carried but never demanded",
                demand.names.name(edgeplan_core::StreamId::new(stream)),
                topology.clients[c].name
            )));
        }
    }
    Ok(())
}

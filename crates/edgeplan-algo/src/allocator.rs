//! Per-day three-phase allocator.
//!
//! For one day the allocator assigns every demanded stream to one reachable
//! server, mutating a working copy of the day's demand monotonically toward
//! zero:
//!
//! - **Phase A (greedy)** packs the servers the hot-day selector declared
//!   free today; their load is excluded from billing, so they take the
//!   largest stream entries that fit.
//! - **Phase B (base)** fills the remaining servers up to their working
//!   separator, grouping whole stream names onto the server whose reference
//!   clients hold the most of that name.
//! - **Phase C (residual)** places the leftovers one stream at a time where
//!   the incremental-cost proxy is smallest; a placement under the working
//!   separator is free and taken immediately.
//!
//! The working separator per server persists across days (seeded at base
//! cost, raised to the highest non-free daily load seen), so later days
//! keep reusing capacity the bill has already paid for.

use std::collections::HashMap;

use edgeplan_core::{
    ClientId, DemandDay, PlanConfig, PlanError, PlanResult, ServerId, StreamId, Topology,
};

use crate::result_set::{DayResult, PlacedStream};

/// Allocator state that survives across days.
#[derive(Debug, Clone)]
pub struct AllocatorState {
    /// Working separator per server, seeded at base cost
    pub seps: Vec<i64>,
    /// Free-day credits spent per server
    pub full_times: Vec<usize>,
    quota: usize,
}

impl AllocatorState {
    pub fn new(server_count: usize, base_cost: i64, quota: usize) -> Self {
        Self {
            seps: vec![base_cost; server_count],
            full_times: vec![0; server_count],
            quota,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }
}

/// Assign every demanded stream of `day` to a server.
///
/// `hot` lists the servers declared free today, in selection order. Returns
/// the day's loads and stream lists, or an error when a stream fits no
/// reachable server (`Infeasible`) or an internal bound breaks
/// (`Invariant`).
pub fn allocate_day(
    topology: &Topology,
    config: &PlanConfig,
    day: &DemandDay,
    hot: &[ServerId],
    state: &mut AllocatorState,
) -> PlanResult<DayResult> {
    let server_count = topology.server_count();
    let mut remaining: Vec<Vec<i64>> = day.streams.iter().map(|s| s.sizes.clone()).collect();
    let mut result = DayResult::new(server_count);
    let mut hot_today = vec![false; server_count];
    // Largest single placement per (server, stream name) today, for the
    // center-cost term of the residual phase.
    let mut stream_max: HashMap<(usize, StreamId), i64> = HashMap::new();

    greedy_phase(
        topology,
        day,
        hot,
        state,
        &mut remaining,
        &mut result,
        &mut hot_today,
        &mut stream_max,
    )?;
    base_phase(
        topology,
        day,
        state,
        &mut remaining,
        &mut result,
        &hot_today,
        &mut stream_max,
    );
    residual_phase(
        topology,
        config,
        day,
        state,
        &mut remaining,
        &mut result,
        &hot_today,
        &mut stream_max,
    )?;

    debug_assert!(
        remaining.iter().all(|sizes| sizes.iter().all(|&v| v == 0)),
        "demand left after residual phase"
    );
    Ok(result)
}

fn place(
    result: &mut DayResult,
    stream_max: &mut HashMap<(usize, StreamId), i64>,
    server: usize,
    client: usize,
    stream: StreamId,
    size: i64,
) {
    result.server_loads[server] += size;
    result.server_streams[server].push(PlacedStream {
        client: ClientId::new(client),
        stream,
        size,
    });
    let entry = stream_max.entry((server, stream)).or_insert(0);
    *entry = (*entry).max(size);
}

/// Phase A: pack today's hot servers with the largest entries that fit.
#[allow(clippy::too_many_arguments)]
fn greedy_phase(
    topology: &Topology,
    day: &DemandDay,
    hot: &[ServerId],
    state: &mut AllocatorState,
    remaining: &mut [Vec<i64>],
    result: &mut DayResult,
    hot_today: &mut [bool],
    stream_max: &mut HashMap<(usize, StreamId), i64>,
) -> PlanResult<()> {
    for &sid in hot {
        let s = sid.value();
        let server = &topology.servers[s];
        let mut cap_left = server.capacity - result.server_loads[s];

        let row_sums: Vec<i64> = remaining.iter().map(|r| r.iter().sum()).collect();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (row, sizes) in remaining.iter().enumerate() {
            for &c in &server.ref_clients {
                if sizes[c.value()] > 0 {
                    pairs.push((row, c.value()));
                }
            }
        }
        // Stream names by cross-client sum descending; within a name,
        // clients by ascending size.
        pairs.sort_by(|&(lr, lc), &(rr, rc)| {
            row_sums[rr]
                .cmp(&row_sums[lr])
                .then(lr.cmp(&rr))
                .then(remaining[lr][lc].cmp(&remaining[rr][rc]))
                .then(lc.cmp(&rc))
        });

        for (row, c) in pairs {
            if cap_left == 0 {
                break;
            }
            let size = remaining[row][c];
            if size == 0 || size > cap_left {
                continue;
            }
            remaining[row][c] = 0;
            cap_left -= size;
            place(result, stream_max, s, c, day.streams[row].stream, size);
        }

        hot_today[s] = true;
        state.full_times[s] += 1;
        if state.full_times[s] > state.quota {
            return Err(PlanError::Invariant(format!(
                "server {} spent {} free-day credits, quota is {}",
                server.name, state.full_times[s], state.quota
            )));
        }
    }
    Ok(())
}

/// Phase B: fill non-hot servers up to their working separator, one whole
/// stream name at a time.
fn base_phase(
    topology: &Topology,
    day: &DemandDay,
    state: &AllocatorState,
    remaining: &mut [Vec<i64>],
    result: &mut DayResult,
    hot_today: &[bool],
    stream_max: &mut HashMap<(usize, StreamId), i64>,
) {
    let row_sums: Vec<i64> = remaining.iter().map(|r| r.iter().sum()).collect();
    let mut rows: Vec<usize> = (0..remaining.len()).collect();
    rows.sort_by(|&l, &r| row_sums[r].cmp(&row_sums[l]).then(l.cmp(&r)));

    for row in rows {
        if row_sums[row] == 0 {
            continue;
        }
        let mut candidates: Vec<usize> =
            (0..topology.server_count()).filter(|&s| !hot_today[s]).collect();
        while !candidates.is_empty() {
            // The candidate whose reference clients hold the most of this name.
            let mut best: Option<(usize, i64)> = None;
            for &s in &candidates {
                let payload: i64 = topology.servers[s]
                    .ref_clients
                    .iter()
                    .map(|&c| remaining[row][c.value()])
                    .sum();
                if payload == 0 {
                    continue;
                }
                match best {
                    Some((_, bp)) if payload <= bp => {}
                    _ => best = Some((s, payload)),
                }
            }
            let Some((s, payload)) = best else {
                break;
            };
            let ceiling = state.seps[s].min(topology.servers[s].capacity);
            if payload <= ceiling - result.server_loads[s] {
                for &c in &topology.servers[s].ref_clients {
                    let size = remaining[row][c.value()];
                    if size == 0 {
                        continue;
                    }
                    remaining[row][c.value()] = 0;
                    place(result, stream_max, s, c.value(), day.streams[row].stream, size);
                }
            }
            candidates.retain(|&x| x != s);
        }
    }
}

/// Incremental-cost proxy for pushing one stream past a server's separator.
fn delta_cost(used: i64, sep: i64, base: i64, capacity: i64) -> f64 {
    let (used, sep, base) = (used as f64, sep as f64, base as f64);
    (used * used - sep * sep - 2.0 * base * (used - sep)) / capacity as f64 + (used - sep)
}

/// Phase C: place the leftovers where the incremental cost is smallest.
#[allow(clippy::too_many_arguments)]
fn residual_phase(
    topology: &Topology,
    config: &PlanConfig,
    day: &DemandDay,
    state: &mut AllocatorState,
    remaining: &mut [Vec<i64>],
    result: &mut DayResult,
    hot_today: &[bool],
    stream_max: &mut HashMap<(usize, StreamId), i64>,
) -> PlanResult<()> {
    let mut leftovers: Vec<(usize, usize)> = Vec::new();
    for (row, sizes) in remaining.iter().enumerate() {
        for (c, &size) in sizes.iter().enumerate() {
            if size > 0 {
                leftovers.push((row, c));
            }
        }
    }
    leftovers.sort_by(|&(lr, lc), &(rr, rc)| {
        remaining[rr][rc]
            .cmp(&remaining[lr][lc])
            .then(lr.cmp(&rr))
            .then(lc.cmp(&rc))
    });

    for (row, c) in leftovers {
        let size = remaining[row][c];
        let stream = day.streams[row].stream;
        let client = &topology.clients[c];
        let mut chosen: Option<usize> = None;
        let mut best_delta = f64::INFINITY;
        for &t in &client.reachable {
            let s = t.value();
            let server = &topology.servers[s];
            if server.capacity - result.server_loads[s] < size {
                continue;
            }
            let used = result.server_loads[s] + size;
            let sep = state.seps[s];
            if used <= sep {
                // Free: under the separator the bill does not move.
                chosen = Some(s);
                break;
            }
            let mut delta = delta_cost(used, sep, config.base_cost, server.capacity);
            if config.center_enabled() {
                let prior = stream_max.get(&(s, stream)).copied().unwrap_or(0);
                delta += (size - prior).max(0) as f64 * config.center_cost;
            }
            if delta < best_delta {
                best_delta = delta;
                chosen = Some(s);
            }
        }
        let Some(s) = chosen else {
            return Err(PlanError::Infeasible(format!(
                "stream `{}` of client {} (size {}) fits no reachable server at {}",
                stream.value(),
                client.name,
                size,
                day.label
            )));
        };
        remaining[row][c] = 0;
        place(result, stream_max, s, c, stream, size);
        if !hot_today[s] {
            state.seps[s] = state.seps[s].max(result.server_loads[s]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeplan_core::{Client, ClientId, DemandDay, Server, StreamDemand, StreamNames};

    fn world(caps: &[i64]) -> Topology {
        let servers = caps
            .iter()
            .enumerate()
            .map(|(i, &c)| Server::new(ServerId::new(i), format!("s{i}"), c))
            .collect();
        let mut c0 = Client::new(ClientId::new(0), "c0".into());
        c0.reachable = (0..caps.len()).map(ServerId::new).collect();
        Topology::build(servers, vec![c0])
    }

    fn one_stream_day(names: &mut StreamNames, name: &str, sizes: Vec<i64>) -> DemandDay {
        let mut day = DemandDay::new("t0".into());
        day.streams.push(StreamDemand::new(names.intern(name), sizes));
        day
    }

    #[test]
    fn test_free_placement_under_separator() {
        let topology = world(&[100]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let day = one_stream_day(&mut names, "x0", vec![30]);
        let mut state = AllocatorState::new(1, 50, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        assert_eq!(result.server_loads[0], 30);
        // Under base cost the working separator does not move.
        assert_eq!(state.seps[0], 50);
    }

    #[test]
    fn test_separator_raised_past_base() {
        let topology = world(&[200]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let day = one_stream_day(&mut names, "x0", vec![120]);
        let mut state = AllocatorState::new(1, 50, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        assert_eq!(result.server_loads[0], 120);
        assert_eq!(state.seps[0], 120);
    }

    #[test]
    fn test_residual_cost_tie_takes_earlier_server() {
        // Two identical servers with separators already at 50; a stream of
        // 60 exceeds both, the deltas tie, the first reachable server wins.
        let topology = world(&[200, 200]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let day = one_stream_day(&mut names, "x0", vec![60]);
        let mut state = AllocatorState::new(2, 50, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        let first = topology.clients[0].reachable[0].value();
        assert_eq!(result.server_loads[first], 60);
        assert_eq!(state.seps[first], 60);
    }

    #[test]
    fn test_delta_cost_proxy_value() {
        // (60^2 - 50^2 - 2*50*10)/200 + 10 = 10.5
        assert!((delta_cost(60, 50, 50, 200) - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_greedy_fills_hot_server_first() {
        let topology = world(&[100, 100]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let mut day = DemandDay::new("t0".into());
        day.streams.push(StreamDemand::new(names.intern("a"), vec![70]));
        day.streams.push(StreamDemand::new(names.intern("b"), vec![20]));
        let mut state = AllocatorState::new(2, 50, 1);
        let hot = vec![topology.servers[0].id];
        let result = allocate_day(&topology, &config, &day, &hot, &mut state).unwrap();
        assert_eq!(result.server_loads[0], 90);
        assert_eq!(result.server_loads[1], 0);
        assert_eq!(state.full_times[0], 1);
        // The hot server's separator stays seeded at base cost.
        assert_eq!(state.seps[0], 50);
    }

    #[test]
    fn test_base_phase_groups_stream_on_one_server() {
        // Two clients both demand stream `a`; the non-hot server whose
        // reference clients hold the most of it takes the whole name.
        let servers = vec![
            Server::new(ServerId::new(0), "s0".into(), 100),
            Server::new(ServerId::new(1), "s1".into(), 100),
        ];
        let clients = (0..2)
            .map(|i| {
                let mut c = Client::new(ClientId::new(i), format!("c{i}"));
                c.reachable = vec![ServerId::new(0), ServerId::new(1)];
                c
            })
            .collect();
        let topology = Topology::build(servers, clients);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let mut day = DemandDay::new("t0".into());
        day.streams
            .push(StreamDemand::new(names.intern("a"), vec![20, 15]));
        let mut state = AllocatorState::new(2, 50, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        let loaded: Vec<i64> = result.server_loads.clone();
        assert!(loaded.contains(&35));
        assert!(loaded.contains(&0));
    }

    #[test]
    fn test_oversized_stream_is_infeasible() {
        let topology = world(&[50, 50]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let day = one_stream_day(&mut names, "x0", vec![80]);
        let mut state = AllocatorState::new(2, 50, 1);
        let err = allocate_day(&topology, &config, &day, &[], &mut state).unwrap_err();
        assert!(matches!(err, PlanError::Infeasible(_)));
    }

    #[test]
    fn test_indivisible_streams_split_across_servers() {
        // Two streams of 30 against two servers of capacity 40: one lands
        // on each (neither server can hold both).
        let topology = world(&[40, 40]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let mut day = DemandDay::new("t0".into());
        day.streams.push(StreamDemand::new(names.intern("a"), vec![30]));
        day.streams.push(StreamDemand::new(names.intern("b"), vec![30]));
        let mut state = AllocatorState::new(2, 50, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        assert_eq!(result.server_loads, vec![30, 30]);
    }

    #[test]
    fn test_quota_overrun_is_invariant_violation() {
        let topology = world(&[100]);
        let config = PlanConfig::new(400, 50);
        let mut names = StreamNames::new();
        let mut state = AllocatorState::new(1, 50, 1);
        let hot = vec![topology.servers[0].id];
        let day = one_stream_day(&mut names, "x0", vec![10]);
        allocate_day(&topology, &config, &day, &hot, &mut state).unwrap();
        let day2 = one_stream_day(&mut names, "x1", vec![10]);
        let err = allocate_day(&topology, &config, &day2, &hot, &mut state).unwrap_err();
        assert!(matches!(err, PlanError::Invariant(_)));
    }

    #[test]
    fn test_center_cost_co_locates_a_stream_name() {
        // Two clients each hold 40 of stream `a`. Without the center term
        // the second placement would spread to the emptier server; with a
        // dominant center cost it stays where the name's 40-peak already
        // is, since a matched peak adds nothing.
        let servers = vec![
            Server::new(ServerId::new(0), "s0".into(), 100),
            Server::new(ServerId::new(1), "s1".into(), 100),
        ];
        let clients = (0..2)
            .map(|i| {
                let mut c = Client::new(ClientId::new(i), format!("c{i}"));
                c.reachable = vec![ServerId::new(0), ServerId::new(1)];
                c
            })
            .collect();
        let topology = Topology::build(servers, clients);
        let config = PlanConfig::new(400, 10).with_center_cost(100.0);
        let mut names = StreamNames::new();
        let mut day = DemandDay::new("t0".into());
        day.streams
            .push(StreamDemand::new(names.intern("a"), vec![40, 40]));
        let mut state = AllocatorState::new(2, 10, 1);
        let result = allocate_day(&topology, &config, &day, &[], &mut state).unwrap();
        assert_eq!(result.server_loads, vec![80, 0]);
    }
}

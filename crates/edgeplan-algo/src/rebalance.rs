//! Post-pass rebalancer: migrate streams off over-separator days.
//!
//! A migrate pass walks each heavy server's non-free days from the top and
//! moves streams to reachable peers that still have room under their own
//! separator, lowering the 95th-percentile load the bill is computed from.
//! Targets are vetted against a finite-horizon look-ahead budget so a move
//! cannot starve the next few days of the receiving server.
//!
//! A top-5 adjust pass flattens the days *above* the separator: free from
//! a billing standpoint, but lowering them gives later migrate passes room
//! to move. Moves there run under capacity-only constraints and commit only
//! if the whole day simulates down to the separator.
//!
//! Every rejected move is skipped silently; the rebalancer never fails.

use edgeplan_core::{top5_count, Topology};
use serde::Serialize;
use tracing::debug;

use crate::result_set::{ResultSet, SepInfo};

/// How many future days a migration is checked against.
const LOOKAHEAD_HORIZON: usize = 3;
/// Discount per day of distance: a day `N` ahead admits `20^N` times its
/// remaining headroom, reflecting that it may itself be migrated later.
const LOOKAHEAD_DISCOUNT: f64 = 20.0;

/// Counters accumulated across rebalance passes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RebalanceStats {
    pub migrate_moves: usize,
    pub adjust_moves: usize,
    pub passes: usize,
}

impl ResultSet {
    /// One migrate pass over every server. Returns the number of stream
    /// moves committed.
    pub fn migrate_pass(&mut self, topology: &Topology) -> usize {
        let mut seps = self.compute_seps(true);
        let server_count = self.capacities.len();
        let day_count = self.days.len();

        // Discounted projection of future loads, updated as moves commit.
        let mut lookahead: Vec<Vec<f64>> = (0..server_count)
            .map(|s| (0..day_count).map(|d| self.days[d].server_loads[s] as f64).collect())
            .collect();

        // Noisy servers first: variance of the migrate-day loads.
        let variances: Vec<f64> = (0..server_count)
            .map(|s| variance(&seps[s].migrate_days))
            .collect();
        let mut order: Vec<usize> = (0..server_count)
            .filter(|&s| !seps[s].migrate_days.is_empty())
            .collect();
        order.sort_by(|&l, &r| variances[r].total_cmp(&variances[l]).then(l.cmp(&r)));

        let mut moves = 0;
        for s in order {
            let mut running = self.base_cost;
            let mut sep_day: Option<usize> = None;
            let migrate_days = seps[s].migrate_days.clone();
            for (recorded_load, day) in migrate_days {
                if recorded_load <= running {
                    break;
                }
                let (load_after, day_moves) =
                    self.migrate_day(topology, s, day, running, &seps, &mut lookahead);
                moves += day_moves;
                if load_after >= running {
                    running = load_after;
                    sep_day = Some(day);
                }
            }
            if let Some(day) = sep_day {
                seps[s].load = running;
                seps[s].day = day;
            }
        }
        debug!("migrate pass: {moves} moves");
        moves
    }

    /// Move streams off `(from, day)` until the day's load reaches
    /// `stop_at`. Returns the final load and the number of moves.
    fn migrate_day(
        &mut self,
        topology: &Topology,
        from: usize,
        day: usize,
        stop_at: i64,
        seps: &[SepInfo],
        lookahead: &mut [Vec<f64>],
    ) -> (i64, usize) {
        let mut moves = 0;
        let mut i = 0;
        while self.days[day].server_loads[from] > stop_at
            && i < self.days[day].server_streams[from].len()
        {
            let size = self.days[day].server_streams[from][i].size;
            let owner = self.days[day].server_streams[from][i].client;
            let target = {
                let client = &topology.clients[owner.value()];
                let mut best: Option<(usize, i64)> = None;
                for &t in &client.reachable {
                    let t = t.value();
                    if t == from {
                        continue;
                    }
                    let slack = seps[t].load - self.days[day].server_loads[t] - size;
                    if slack < 0 {
                        continue;
                    }
                    if !self.lookahead_allows(t, day, size, lookahead) {
                        continue;
                    }
                    best = match best {
                        Some((_, bs)) if slack >= bs => best,
                        _ => Some((t, slack)),
                    };
                }
                best.map(|(t, _)| t)
            };
            let Some(to) = target else {
                i += 1;
                continue;
            };

            let placed = self.days[day].server_streams[from].remove(i);
            self.days[day].server_loads[from] -= size;
            // Slack was measured against the target's separator, so the
            // receiving day stays at or under it.
            self.days[day].server_loads[to] += size;
            self.days[day].server_streams[to].push(placed);
            for n in 1..=LOOKAHEAD_HORIZON {
                let future = day + n;
                if future >= self.days.len() {
                    break;
                }
                let change = size as f64 / LOOKAHEAD_DISCOUNT.powi(n as i32);
                lookahead[to][future] += change;
                lookahead[from][future] -= change;
            }
            moves += 1;
        }
        (self.days[day].server_loads[from], moves)
    }

    /// Finite-horizon budget: the move must fit `20^N` times the projected
    /// headroom of each of the next `N ∈ {1,2,3}` days.
    fn lookahead_allows(&self, to: usize, day: usize, size: i64, lookahead: &[Vec<f64>]) -> bool {
        let mut budget = f64::INFINITY;
        for n in 1..=LOOKAHEAD_HORIZON {
            let future = day + n;
            if future >= self.days.len() {
                break;
            }
            let headroom = self.capacities[to] as f64 - lookahead[to][future];
            budget = budget.min(LOOKAHEAD_DISCOUNT.powi(n as i32) * headroom);
        }
        size as f64 <= budget
    }

    /// One top-5 adjust pass. Returns the number of stream moves committed.
    pub fn adjust_top5_pass(&mut self, topology: &Topology) -> usize {
        let seps = self.compute_seps(true);
        let server_count = self.capacities.len();
        let day_count = self.days.len();
        let near_band = self.base_cost / 2;

        // Servers whose separator has the most near ties go first; their
        // top-5 days block the most future migration.
        let near_counts: Vec<usize> = (0..server_count)
            .map(|s| {
                (0..day_count)
                    .filter(|&d| {
                        let load = self.days[d].server_loads[s];
                        load <= seps[s].load && seps[s].load - load <= near_band
                    })
                    .count()
            })
            .collect();
        let mut order: Vec<usize> = (0..server_count)
            .filter(|&s| !seps[s].top5_days.is_empty())
            .collect();
        order.sort_by(|&l, &r| near_counts[r].cmp(&near_counts[l]).then(l.cmp(&r)));

        // Days per server already strictly above the separator. A receiving
        // day may cross the separator only while there are free top-5
        // positions left, otherwise the target's own percentile would rise.
        let mut above_counts: Vec<usize> =
            (0..server_count).map(|s| seps[s].top5_days.len()).collect();
        let top5_room = top5_count(day_count);

        let mut moves = 0;
        for s in order {
            let top5 = seps[s].top5_days.clone();
            for (_, day) in top5 {
                moves += self.adjust_day(topology, s, day, &seps, &mut above_counts, top5_room);
            }
        }
        debug!("top-5 adjust pass: {moves} moves");
        moves
    }

    /// Simulate emptying `(from, day)` down to the separator under
    /// capacity-only constraints; commit only if the simulation gets there.
    #[allow(clippy::too_many_arguments)]
    fn adjust_day(
        &mut self,
        topology: &Topology,
        from: usize,
        day: usize,
        seps: &[SepInfo],
        above_counts: &mut [usize],
        top5_room: usize,
    ) -> usize {
        let server_count = self.capacities.len();
        let mut delta = vec![0i64; server_count];
        // Targets whose receiving day crosses their separator in this
        // simulation (counts once however many streams land).
        let mut crosses = vec![false; server_count];
        let mut planned: Vec<(usize, usize)> = Vec::new();
        let mut load_after = self.days[day].server_loads[from];

        for (idx, placed) in self.days[day].server_streams[from].iter().enumerate() {
            let client = &topology.clients[placed.client.value()];
            // Prefer room under a peer's separator, as in the migrate pass.
            let mut best: Option<(usize, i64)> = None;
            for &t in &client.reachable {
                let t = t.value();
                if t == from {
                    continue;
                }
                let load_t = self.days[day].server_loads[t] + delta[t];
                let slack = seps[t].load - load_t - placed.size;
                if slack < 0 {
                    continue;
                }
                best = match best {
                    Some((_, bs)) if slack >= bs => best,
                    _ => Some((t, slack)),
                };
            }
            // Capacity-only fallback: the peer with the most headroom left
            // whose percentile the landing cannot push up.
            let fallback = best.is_none().then(|| {
                let mut fb: Option<(usize, i64)> = None;
                for &t in &client.reachable {
                    let t = t.value();
                    if t == from {
                        continue;
                    }
                    let load_t = self.days[day].server_loads[t] + delta[t];
                    let headroom = self.capacities[t] - load_t - placed.size;
                    if headroom < 0 {
                        continue;
                    }
                    let was_above = self.days[day].server_loads[t] > seps[t].load;
                    let crossing =
                        !was_above && !crosses[t] && load_t + placed.size > seps[t].load;
                    if crossing && above_counts[t] >= top5_room {
                        continue;
                    }
                    fb = match fb {
                        Some((_, bh)) if headroom <= bh => fb,
                        _ => Some((t, headroom)),
                    };
                }
                fb
            });
            let target = best.or(fallback.flatten()).map(|(t, _)| t);
            if let Some(to) = target {
                if self.days[day].server_loads[to] <= seps[to].load
                    && self.days[day].server_loads[to] + delta[to] + placed.size > seps[to].load
                {
                    crosses[to] = true;
                }
                delta[to] += placed.size;
                load_after -= placed.size;
                planned.push((idx, to));
            }
        }

        if load_after > seps[from].load {
            return 0;
        }
        for &(idx, to) in planned.iter().rev() {
            let placed = self.days[day].server_streams[from].remove(idx);
            self.days[day].server_loads[from] -= placed.size;
            self.days[day].server_loads[to] += placed.size;
            self.days[day].server_streams[to].push(placed);
        }
        for (t, crossed) in crosses.into_iter().enumerate() {
            if crossed {
                above_counts[t] += 1;
            }
        }
        planned.len()
    }
}

fn variance(loads: &[(i64, usize)]) -> f64 {
    if loads.is_empty() {
        return 0.0;
    }
    let n = loads.len() as f64;
    let mean = loads.iter().map(|&(l, _)| l as f64).sum::<f64>() / n;
    loads
        .iter()
        .map(|&(l, _)| {
            let d = l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_set::{DayResult, PlacedStream};
    use edgeplan_core::{Client, ClientId, PlanConfig, Server, ServerId, StreamId};

    /// Two servers, both reachable from the single client.
    fn world(caps: [i64; 2]) -> Topology {
        let servers = vec![
            Server::new(ServerId::new(0), "s0".into(), caps[0]),
            Server::new(ServerId::new(1), "s1".into(), caps[1]),
        ];
        let mut c0 = Client::new(ClientId::new(0), "c0".into());
        c0.reachable = vec![ServerId::new(0), ServerId::new(1)];
        Topology::build(servers, vec![c0])
    }

    /// Result set where server loads are given per day as single streams.
    fn seeded(topology: &Topology, config: &PlanConfig, loads: &[[i64; 2]]) -> ResultSet {
        let mut rs = ResultSet::new(topology, config);
        for (d, day_loads) in loads.iter().enumerate() {
            let mut day = DayResult::new(2);
            for (s, &load) in day_loads.iter().enumerate() {
                if load > 0 {
                    day.server_loads[s] = load;
                    day.server_streams[s].push(PlacedStream {
                        client: ClientId::new(0),
                        stream: StreamId::new(d as u32),
                        size: load,
                    });
                }
            }
            rs.push_day(day);
        }
        rs
    }

    #[test]
    fn test_migrate_moves_load_under_peer_sep() {
        let topology = world([1000, 1000]);
        let config = PlanConfig::new(400, 50);
        // s0's separator day is day 1 (300); day 0's 400 sits in the free
        // top 5% and is left alone. On day 1 s1 runs at 100 under its own
        // separator of 500, so the 300 drains there and s0's separator
        // falls to zero.
        let mut loads = vec![[0i64, 500]; 20];
        loads[0] = [400, 500];
        loads[1] = [300, 100];
        let mut rs = seeded(&topology, &config, &loads);
        let before = rs.grade();
        let moved = rs.migrate_pass(&topology);
        assert!(moved >= 1);
        assert_eq!(rs.server_load(1, 0), 0);
        assert_eq!(rs.server_load(1, 1), 400);
        assert_eq!(rs.server_load(0, 0), 400);
        assert!(rs.grade() < before);
    }

    #[test]
    fn test_migrate_respects_capacity_and_lookahead() {
        let topology = world([1000, 450]);
        let config = PlanConfig::new(400, 50);
        // s1 runs at 440 of its 450 capacity on the look-ahead days; the
        // discounted budget (20^1 * 10 headroom) still admits the 200 move
        // on day 2, and no day may exceed capacity afterwards.
        let mut loads = vec![[0i64, 440]; 20];
        loads[0] = [0, 100];
        loads[1] = [300, 440];
        loads[2] = [200, 100];
        let mut rs = seeded(&topology, &config, &loads);
        let moved = rs.migrate_pass(&topology);
        assert_eq!(moved, 1);
        assert_eq!(rs.server_load(2, 0), 0);
        assert_eq!(rs.server_load(2, 1), 300);
        for d in 0..20 {
            assert!(rs.server_load(d, 1) <= 450);
        }
    }

    #[test]
    fn test_migrate_is_noop_when_no_room() {
        let topology = world([1000, 1000]);
        let config = PlanConfig::new(400, 50);
        // Both servers fully level: no slack anywhere, nothing moves.
        let loads = vec![[300i64, 300]; 20];
        let mut rs = seeded(&topology, &config, &loads);
        let before: Vec<i64> = (0..20).map(|d| rs.server_load(d, 0)).collect();
        let moved = rs.migrate_pass(&topology);
        assert_eq!(moved, 0);
        let after: Vec<i64> = (0..20).map(|d| rs.server_load(d, 0)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_migrate_pass_is_idempotent_at_fixpoint() {
        let topology = world([1000, 1000]);
        let config = PlanConfig::new(400, 50);
        let mut loads = vec![[0i64, 500]; 20];
        loads[0] = [400, 100];
        let mut rs = seeded(&topology, &config, &loads);
        while rs.migrate_pass(&topology) > 0 {}
        assert_eq!(rs.migrate_pass(&topology), 0);
    }

    #[test]
    fn test_adjust_flattens_top5_day() {
        let topology = world([1000, 1000]);
        let config = PlanConfig::new(400, 50);
        // s0: 19 days at 100, day 19 at 900 (its free top-5 day). Idle s1
        // offers no room under its zero separator, but the capacity
        // fallback takes the whole 900 and the day drops to s0's separator.
        let mut loads = vec![[100i64, 0]; 20];
        loads[19] = [900, 0];
        let mut rs = seeded(&topology, &config, &loads);
        let moved = rs.adjust_top5_pass(&topology);
        assert_eq!(moved, 1);
        assert_eq!(rs.server_load(19, 0), 0);
        assert_eq!(rs.server_load(19, 1), 900);
    }

    #[test]
    fn test_adjust_abandons_when_day_cannot_reach_sep() {
        let topology = world([1000, 120]);
        let config = PlanConfig::new(400, 50);
        // The spike day holds two streams of 450; the peer can take at most
        // 120, so the day cannot get back to sep and nothing commits.
        let mut rs = ResultSet::new(&topology, &config);
        for d in 0..20 {
            let mut day = DayResult::new(2);
            let load = if d == 19 { 450 } else { 100 };
            day.server_loads[0] = load;
            day.server_streams[0].push(PlacedStream {
                client: ClientId::new(0),
                stream: StreamId::new(d as u32),
                size: load,
            });
            if d == 19 {
                day.server_loads[0] += 450;
                day.server_streams[0].push(PlacedStream {
                    client: ClientId::new(0),
                    stream: StreamId::new(99),
                    size: 450,
                });
            }
            rs.push_day(day);
        }
        let moved = rs.adjust_top5_pass(&topology);
        assert_eq!(moved, 0);
        assert_eq!(rs.server_load(19, 0), 900);
    }

    #[test]
    fn test_rebalance_deterministic() {
        let topology = world([1000, 1000]);
        let config = PlanConfig::new(400, 50);
        let mut loads = vec![[120i64, 480]; 20];
        loads[3] = [400, 100];
        loads[7] = [50, 600];
        let run = || {
            let mut rs = seeded(&topology, &config, &loads);
            rs.migrate_pass(&topology);
            rs.adjust_top5_pass(&topology);
            (0..20)
                .map(|d| (rs.server_load(d, 0), rs.server_load(d, 1)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_variance_ranks_noisy_servers() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[(5, 0)]), 0.0);
        assert!(variance(&[(100, 0), (500, 1)]) > variance(&[(290, 0), (310, 1)]));
    }
}

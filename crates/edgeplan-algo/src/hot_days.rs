//! Hot-day selection pre-pass.
//!
//! The billing function ignores each server's top 5% of days, so the
//! selector pre-designates, for every server, up to `⌈D·0.05⌉` days worth
//! saturating. A day's value to a server is the demand its reference
//! clients could park there, weighted toward clients with few alternatives
//! (`size / |reach(c)|`) and capped by what actually fits in the server's
//! capacity under largest-first packing.
//!
//! Selection works on a private copy of the demand: chosen placements are
//! recorded only as reservations so later servers score against what is
//! left, and the per-day allocator re-derives the real placements so they
//! integrate with its base and residual phases.

use edgeplan_core::{free_day_quota, ClientId, DemandSet, ServerId, Topology};
use tracing::debug;

use crate::bounded_heap::BoundedHeap;

/// One candidate day and its packing potential for a server.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DayScore {
    score: f64,
    day: usize,
}

impl Eq for DayScore {}

impl PartialOrd for DayScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DayScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher score wins; ties go to the earlier day.
        self.score
            .total_cmp(&other.score)
            .then(other.day.cmp(&self.day))
    }
}

/// Output of the selector: which servers are free on which day.
#[derive(Debug, Clone, Default)]
pub struct HotDayPlan {
    /// For each day, the servers declared free that day, in selection order
    pub hot: Vec<Vec<ServerId>>,
    /// The per-server free-day quota the selection was computed with
    pub quota: usize,
}

impl HotDayPlan {
    /// Number of hot days chosen per server.
    pub fn server_day_counts(&self, server_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; server_count];
        for day in &self.hot {
            for &s in day {
                counts[s.value()] += 1;
            }
        }
        counts
    }
}

/// Choose up to `⌈D·0.05⌉` free days per server.
///
/// Servers are visited in topology order (descending reference count, then
/// descending capacity); servers referenced by no client are skipped.
pub fn select_hot_days(topology: &Topology, demand: &DemandSet) -> HotDayPlan {
    let day_count = demand.day_count();
    let quota = if day_count == 0 {
        0
    } else {
        free_day_quota(day_count)
    };
    let mut plan = HotDayPlan {
        hot: vec![Vec::new(); day_count],
        quota,
    };
    if quota == 0 {
        return plan;
    }

    // Working copy of all demand sizes; reservations are subtracted here.
    let mut remaining: Vec<Vec<Vec<i64>>> = demand
        .days
        .iter()
        .map(|d| d.streams.iter().map(|s| s.sizes.clone()).collect())
        .collect();

    for server in &topology.servers {
        if server.ref_clients.is_empty() || server.capacity == 0 {
            continue;
        }
        let mut best_days = BoundedHeap::new(quota);
        for (day, day_remaining) in remaining.iter().enumerate() {
            let score = day_score(topology, server.capacity, &server.ref_clients, day_remaining);
            if score > 0.0 {
                best_days.push(DayScore { score, day });
            }
        }
        let chosen = best_days.into_sorted_desc();
        for DayScore { day, .. } in chosen {
            reserve_day(server.capacity, &server.ref_clients, &mut remaining[day]);
            plan.hot[day].push(server.id);
        }
    }
    debug!(
        "hot-day selection: quota {} per server across {} days",
        quota, day_count
    );
    plan
}

/// Packing potential of one day for one server: simulate largest-first
/// placement of the reference clients' remaining streams into the capacity
/// and sum `size / |reach(c)|` over what fits.
fn day_score(
    topology: &Topology,
    capacity: i64,
    ref_clients: &[ClientId],
    day_remaining: &[Vec<i64>],
) -> f64 {
    let mut candidates: Vec<(i64, usize, usize)> = Vec::new();
    for (row, sizes) in day_remaining.iter().enumerate() {
        for &c in ref_clients {
            let size = sizes[c.value()];
            if size > 0 {
                candidates.push((size, row, c.value()));
            }
        }
    }
    candidates.sort_by(|&(ls, lr, lc), &(rs, rr, rc)| {
        rs.cmp(&ls).then(lr.cmp(&rr)).then(lc.cmp(&rc))
    });
    let mut used = 0i64;
    let mut score = 0.0;
    for (size, _, c) in candidates {
        if used + size > capacity {
            continue;
        }
        let reach = topology.clients[c].reach_count();
        if reach == 0 {
            continue;
        }
        used += size;
        score += size as f64 / reach as f64;
    }
    score
}

/// Greedily reserve streams on one chosen day, zeroing the working demand.
///
/// Stream names are taken by descending cross-client sum; within a name
/// the largest entry that still fits goes first, then the smaller ones.
fn reserve_day(capacity: i64, ref_clients: &[ClientId], day_remaining: &mut [Vec<i64>]) {
    let row_sums: Vec<i64> = day_remaining
        .iter()
        .map(|sizes| sizes.iter().sum())
        .collect();
    let mut rows: Vec<usize> = (0..day_remaining.len()).collect();
    rows.sort_by(|&l, &r| row_sums[r].cmp(&row_sums[l]).then(l.cmp(&r)));

    let mut cap_left = capacity;
    for row in rows {
        if cap_left == 0 {
            return;
        }
        let mut entries: Vec<(i64, usize)> = ref_clients
            .iter()
            .map(|&c| (day_remaining[row][c.value()], c.value()))
            .filter(|&(size, _)| size > 0)
            .collect();
        entries.sort_by(|&(ls, lc), &(rs, rc)| ls.cmp(&rs).then(lc.cmp(&rc)));
        for &(size, c) in entries.iter().rev() {
            if size > cap_left {
                continue;
            }
            day_remaining[row][c] = 0;
            cap_left -= size;
            if cap_left == 0 {
                return;
            }
        }
    }
}

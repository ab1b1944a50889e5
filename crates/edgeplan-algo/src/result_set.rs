//! Result retention and 95th-percentile statistics.
//!
//! The result set keeps the full plan: for every day, each server's total
//! load and the list of streams placed on it. Client allocation tables are
//! a derived view (a stream on server `s` owned by client `c` appears in
//! `c`'s line at `s`'s position), materialised only when the solution is
//! serialised, so stream moves touch a single list.
//!
//! Separators are percentiles over the daily load multiset and are
//! recomputed by sorting at each query; the rebalancer re-sorts at pass
//! start, which keeps the maintenance cost where the pass structure already
//! pays it.

use edgeplan_core::{
    sep_index, ClientAllocation, ClientId, PlanConfig, PlanError, PlanResult, ServerId, Solution,
    SolutionCell, SolutionDay, StreamId, Topology,
};

/// One stream placed on a server for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedStream {
    pub client: ClientId,
    pub stream: StreamId,
    pub size: i64,
}

/// One day of the plan: per-server loads and stream lists.
#[derive(Debug, Clone, Default)]
pub struct DayResult {
    pub server_loads: Vec<i64>,
    pub server_streams: Vec<Vec<PlacedStream>>,
}

impl DayResult {
    pub fn new(server_count: usize) -> Self {
        Self {
            server_loads: vec![0; server_count],
            server_streams: vec![Vec::new(); server_count],
        }
    }
}

/// Per-server separator statistics, derived from the retained plan.
#[derive(Debug, Clone)]
pub struct SepInfo {
    /// The 95th-percentile daily load
    pub load: i64,
    /// The day that produced it
    pub day: usize,
    /// True when the server carries zero load on every day
    pub always_empty: bool,
    /// Non-free days with load above base cost, load-descending
    pub migrate_days: Vec<(i64, usize)>,
    /// Days strictly above the separator, load-descending
    pub top5_days: Vec<(i64, usize)>,
}

/// The full plan across all days, plus the billing parameters needed to
/// grade it.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub days: Vec<DayResult>,
    pub(crate) base_cost: i64,
    pub(crate) capacities: Vec<i64>,
}

impl ResultSet {
    pub fn new(topology: &Topology, config: &PlanConfig) -> Self {
        Self {
            days: Vec::new(),
            base_cost: config.base_cost,
            capacities: topology.servers.iter().map(|s| s.capacity).collect(),
        }
    }

    pub fn push_day(&mut self, day: DayResult) {
        self.days.push(day);
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn base_cost(&self) -> i64 {
        self.base_cost
    }

    pub fn server_load(&self, day: usize, server: usize) -> i64 {
        self.days[day].server_loads[server]
    }

    /// Per-server separator statistics. `collect_lists` additionally fills
    /// the migrate-day and top-5 lists the rebalancer walks.
    pub fn compute_seps(&self, collect_lists: bool) -> Vec<SepInfo> {
        let day_count = self.days.len();
        let p = sep_index(day_count);
        let mut seps = Vec::with_capacity(self.capacities.len());
        for server in 0..self.capacities.len() {
            let mut arr: Vec<(i64, usize)> = (0..day_count)
                .map(|d| (self.days[d].server_loads[server], d))
                .collect();
            arr.sort_by(|&(ll, ld), &(rl, rd)| ll.cmp(&rl).then(ld.cmp(&rd)));
            let (load, day) = arr[p];
            let always_empty = arr[day_count - 1].0 == 0;
            let mut info = SepInfo {
                load,
                day,
                always_empty,
                migrate_days: Vec::new(),
                top5_days: Vec::new(),
            };
            if collect_lists {
                if load > self.base_cost {
                    for &(l, d) in arr[..=p].iter().rev() {
                        if l <= self.base_cost {
                            break;
                        }
                        info.migrate_days.push((l, d));
                    }
                }
                info.top5_days = arr[p + 1..]
                    .iter()
                    .rev()
                    .filter(|&&(l, _)| l > info.load)
                    .copied()
                    .collect();
            }
            seps.push(info);
        }
        seps
    }

    /// Total cost of the plan.
    ///
    /// Servers that never carry load cost nothing; a separator at or below
    /// base cost bills exactly the base; above it the quadratic overage
    /// term applies.
    pub fn grade(&self) -> f64 {
        let base = self.base_cost as f64;
        let mut grade = 0.0;
        for (server, info) in self.compute_seps(false).into_iter().enumerate() {
            if info.always_empty {
                continue;
            }
            let sep = info.load as f64;
            if sep <= base {
                grade += base;
            } else {
                grade += sep + (sep - base) * (sep - base) / self.capacities[server] as f64;
            }
        }
        grade
    }

    /// The companion center grade: the 95th percentile, across days, of the
    /// sum over servers of the largest single stream placed that day.
    pub fn center_grade(&self) -> i64 {
        let mut daily: Vec<i64> = self
            .days
            .iter()
            .map(|day| {
                day.server_streams
                    .iter()
                    .map(|streams| streams.iter().map(|p| p.size).max().unwrap_or(0))
                    .sum()
            })
            .collect();
        daily.sort_unstable();
        daily[sep_index(daily.len())]
    }

    /// Materialise the output form: per day, per client (input-header
    /// order), the `<server, streams>` cells in the client's reachable
    /// order.
    pub fn to_solution(&self, topology: &Topology) -> PlanResult<Solution> {
        let mut solution = Solution::default();
        for day in &self.days {
            // client id -> position in reachable list -> streams
            let mut tables: Vec<Vec<Vec<StreamId>>> = topology
                .clients
                .iter()
                .map(|c| vec![Vec::new(); c.reachable.len()])
                .collect();
            for (server, streams) in day.server_streams.iter().enumerate() {
                for placed in streams {
                    let client = &topology.clients[placed.client.value()];
                    let pos = client
                        .server_position(ServerId::new(server))
                        .ok_or_else(|| {
                            PlanError::Invariant(format!(
                                "stream {} of client {} placed on unreachable server {}",
                                placed.stream.value(),
                                client.name,
                                topology.servers[server].name
                            ))
                        })?;
                    tables[placed.client.value()][pos].push(placed.stream);
                }
            }
            let mut out_day = SolutionDay::default();
            for &client_id in &topology.output_order {
                let client = &topology.clients[client_id.value()];
                let cells: Vec<SolutionCell> = client
                    .reachable
                    .iter()
                    .zip(std::mem::take(&mut tables[client_id.value()]))
                    .filter(|(_, streams)| !streams.is_empty())
                    .map(|(&server, streams)| SolutionCell { server, streams })
                    .collect();
                out_day
                    .allocations
                    .push(ClientAllocation { client: client_id, cells });
            }
            solution.days.push(out_day);
        }
        Ok(solution)
    }
}

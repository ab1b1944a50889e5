//! `solution.txt` reader used by the checker.
//!
//! One line per client per day:
//! `clientName:<serverA,stream1,stream2>,<serverB,stream3>`; servers with
//! no streams for that client are omitted, a client with no assignments
//! emits the bare `clientName:` line. The reader resolves names back to
//! post-sort ids through the topology and the stream interner, producing
//! the shared [`Solution`] model.

use std::fs;
use std::path::Path;

use edgeplan_core::{
    ClientAllocation, ClientId, DemandSet, PlanError, PlanResult, ServerId, Solution,
    SolutionCell, SolutionDay, Topology,
};

/// Parse a `solution.txt` back into ids.
///
/// The file must contain exactly `days × clients` lines, each day covering
/// every client exactly once. Unknown client, server, or stream names are
/// parse errors.
pub fn read_solution(
    path: &Path,
    topology: &Topology,
    demand: &DemandSet,
) -> PlanResult<Solution> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let clients = topology.client_count();
    let days = demand.day_count();
    if lines.len() != clients * days {
        return Err(PlanError::Parse(format!(
            "{}: expected {} lines ({days} days x {clients} clients), got {}",
            path.display(),
            clients * days,
            lines.len()
        )));
    }

    let client_index: std::collections::HashMap<&str, ClientId> = topology
        .clients
        .iter()
        .map(|c| (c.name.as_str(), c.id))
        .collect();
    let server_index: std::collections::HashMap<&str, ServerId> = topology
        .servers
        .iter()
        .map(|s| (s.name.as_str(), s.id))
        .collect();

    let mut solution = Solution::default();
    for (day_idx, chunk) in lines.chunks(clients).enumerate() {
        let mut day = SolutionDay::default();
        let mut seen = vec![false; clients];
        for (offset, line) in chunk.iter().enumerate() {
            let line_no = day_idx * clients + offset + 1;
            let bad = |msg: String| PlanError::Parse(format!("{}:{line_no}: {msg}", path.display()));
            let (client_name, rest) = line
                .split_once(':')
                .ok_or_else(|| bad("missing `:` separator".into()))?;
            let &client = client_index
                .get(client_name)
                .ok_or_else(|| bad(format!("unknown client `{client_name}`")))?;
            if std::mem::replace(&mut seen[client.value()], true) {
                return Err(bad(format!("client `{client_name}` repeated within a day")));
            }
            let cells = parse_cells(rest, &server_index, demand)
                .map_err(|msg| bad(msg))?;
            day.allocations.push(ClientAllocation { client, cells });
        }
        solution.days.push(day);
    }
    Ok(solution)
}

/// Parse the `<server,stream,...>,<server,...>` tail of a client line.
fn parse_cells(
    rest: &str,
    server_index: &std::collections::HashMap<&str, ServerId>,
    demand: &DemandSet,
) -> Result<Vec<SolutionCell>, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let mut cells = Vec::new();
    let mut cursor = rest;
    loop {
        let Some(stripped) = cursor.strip_prefix('<') else {
            return Err(format!("expected `<` at `{cursor}`"));
        };
        let Some(close) = stripped.find('>') else {
            return Err("unterminated `<...>` group".into());
        };
        let body = &stripped[..close];
        let mut parts = body.split(',');
        let server_name = parts.next().unwrap_or("");
        let &server = server_index
            .get(server_name)
            .ok_or_else(|| format!("unknown server `{server_name}`"))?;
        let mut streams = Vec::new();
        for stream_name in parts {
            let stream = demand
                .names
                .get(stream_name)
                .ok_or_else(|| format!("unknown stream `{stream_name}`"))?;
            streams.push(stream);
        }
        if streams.is_empty() {
            return Err(format!("server `{server_name}` listed with no streams"));
        }
        cells.push(SolutionCell { server, streams });
        cursor = &stripped[close + 1..];
        if cursor.is_empty() {
            break;
        }
        cursor = cursor
            .strip_prefix(',')
            .ok_or_else(|| format!("expected `,` between groups at `{cursor}`"))?;
    }
    Ok(cells)
}

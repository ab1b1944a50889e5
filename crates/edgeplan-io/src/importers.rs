//! Importers for the four fixed input files.
//!
//! - `site_bandwidth.csv` - `site_name,bandwidth` rows
//! - `config.ini` - `qos_constraint`, `base_cost`, optional `center_cost`
//! - `qos.csv` - client names in the header, one QoS row per site
//! - `demand.csv` - `mtime,stream_id,<client columns>`; rows sharing an
//!   `mtime` label form one day, in file order
//!
//! Reachability is derived during the QoS parse (`qos < qos_constraint`).
//! The topology is sorted and remapped before the demand file is read, so
//! demand sizes land directly on post-sort client indices.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use edgeplan_core::{
    Client, ClientId, DemandDay, DemandSet, PlanConfig, PlanError, PlanResult, Server, ServerId,
    StreamDemand, Topology,
};

/// Everything the planner needs, parsed and index-remapped.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub config: PlanConfig,
    pub topology: Topology,
    pub demand: DemandSet,
}

/// Parse the whole input directory.
pub fn load_inputs(dir: &Path) -> PlanResult<PlanInputs> {
    let servers = load_servers(&dir.join("site_bandwidth.csv"))?;
    let config = load_config(&dir.join("config.ini"))?;
    let clients = load_qos(&dir.join("qos.csv"), &servers, config.qos_constraint)?;
    let topology = Topology::build(servers, clients);
    let demand = load_demand(&dir.join("demand.csv"), &topology)?;
    Ok(PlanInputs {
        config,
        topology,
        demand,
    })
}

fn csv_reader(path: &Path) -> PlanResult<csv::Reader<fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PlanError::Parse(format!("{}: {e}", path.display())))
}

fn record_err(path: &Path, line: usize, msg: impl std::fmt::Display) -> PlanError {
    PlanError::Parse(format!("{}:{line}: {msg}", path.display()))
}

/// Parse `site_bandwidth.csv` into servers in file order.
pub fn load_servers(path: &Path) -> PlanResult<Vec<Server>> {
    let mut rdr = csv_reader(path)?;
    let mut servers = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, record) in rdr.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| record_err(path, line, e))?;
        if record.len() != 2 {
            return Err(record_err(
                path,
                line,
                format!("expected 2 fields (site_name,bandwidth), got {}", record.len()),
            ));
        }
        let name = record[0].to_string();
        let capacity: i64 = record[1]
            .parse()
            .map_err(|_| record_err(path, line, format!("invalid bandwidth `{}`", &record[1])))?;
        if capacity < 0 {
            return Err(record_err(path, line, "bandwidth must be non-negative"));
        }
        if !seen.insert(name.clone()) {
            return Err(record_err(path, line, format!("duplicate site `{name}`")));
        }
        servers.push(Server::new(ServerId::new(servers.len()), name, capacity));
    }
    if servers.is_empty() {
        return Err(PlanError::Parse(format!(
            "{}: no site rows",
            path.display()
        )));
    }
    Ok(servers)
}

/// Parse `config.ini`.
///
/// A section header and `key=value` lines; `qos_constraint` and `base_cost`
/// are required, `center_cost` is optional and defaults to 0 (disabling the
/// center-cost term). Unknown keys are ignored.
pub fn load_config(path: &Path) -> PlanResult<PlanConfig> {
    let content = fs::read_to_string(path)?;
    let mut qos_constraint: Option<i64> = None;
    let mut base_cost: Option<i64> = None;
    let mut center_cost: f64 = 0.0;
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('[') || line.starts_with(';') || line.starts_with('#')
        {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(PlanError::Config(format!(
                "{}:{}: expected key=value, got `{line}`",
                path.display(),
                idx + 1
            )));
        };
        let (key, value) = (key.trim(), value.trim());
        let bad = |what: &str| {
            PlanError::Config(format!(
                "{}:{}: invalid {what} `{value}`",
                path.display(),
                idx + 1
            ))
        };
        match key {
            "qos_constraint" => {
                qos_constraint = Some(value.parse().map_err(|_| bad("qos_constraint"))?)
            }
            "base_cost" => base_cost = Some(value.parse().map_err(|_| bad("base_cost"))?),
            "center_cost" => center_cost = value.parse().map_err(|_| bad("center_cost"))?,
            _ => {}
        }
    }
    let qos_constraint = qos_constraint.ok_or_else(|| {
        PlanError::Config(format!("{}: missing qos_constraint", path.display()))
    })?;
    let base_cost = base_cost
        .ok_or_else(|| PlanError::Config(format!("{}: missing base_cost", path.display())))?;
    let config = PlanConfig::new(qos_constraint, base_cost).with_center_cost(center_cost);
    config.validate()?;
    Ok(config)
}

/// Parse `qos.csv` into clients (in header order) with their reachable
/// server sets derived from the constraint.
pub fn load_qos(path: &Path, servers: &[Server], qos_constraint: i64) -> PlanResult<Vec<Client>> {
    let mut rdr = csv_reader(path)?;
    let headers = rdr
        .headers()
        .map_err(|e| PlanError::Parse(format!("{}: {e}", path.display())))?
        .clone();
    if headers.is_empty() {
        return Err(PlanError::Parse(format!("{}: empty header", path.display())));
    }
    let mut clients: Vec<Client> = headers
        .iter()
        .skip(1)
        .enumerate()
        .map(|(idx, name)| Client::new(ClientId::new(idx), name.to_string()))
        .collect();
    if clients.is_empty() {
        return Err(PlanError::Parse(format!(
            "{}: header names no clients",
            path.display()
        )));
    }

    let server_index: HashMap<&str, usize> = servers
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.name.as_str(), idx))
        .collect();
    let mut seen = vec![false; servers.len()];
    for (idx, record) in rdr.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| record_err(path, line, e))?;
        if record.len() != clients.len() + 1 {
            return Err(record_err(
                path,
                line,
                format!(
                    "expected {} fields, got {}",
                    clients.len() + 1,
                    record.len()
                ),
            ));
        }
        let site = &record[0];
        let &server_idx = server_index
            .get(site)
            .ok_or_else(|| record_err(path, line, format!("unknown site `{site}`")))?;
        if std::mem::replace(&mut seen[server_idx], true) {
            return Err(record_err(path, line, format!("duplicate site row `{site}`")));
        }
        for (client_idx, field) in record.iter().skip(1).enumerate() {
            let qos: i64 = field
                .parse()
                .map_err(|_| record_err(path, line, format!("invalid qos `{field}`")))?;
            if qos < qos_constraint {
                clients[client_idx].reachable.push(ServerId::new(server_idx));
            }
        }
    }
    Ok(clients)
}

/// Parse `demand.csv` against a finalized topology.
///
/// Rows sharing an `mtime` label fold into one day; days appear in file
/// order. Stream names are interned as they are first seen.
pub fn load_demand(path: &Path, topology: &Topology) -> PlanResult<DemandSet> {
    let mut rdr = csv_reader(path)?;
    let headers = rdr
        .headers()
        .map_err(|e| PlanError::Parse(format!("{}: {e}", path.display())))?
        .clone();
    if headers.len() < 3 {
        return Err(PlanError::Parse(format!(
            "{}: header must be mtime,stream_id,<clients>",
            path.display()
        )));
    }

    let client_index: HashMap<&str, usize> = topology
        .clients
        .iter()
        .map(|c| (c.name.as_str(), c.id.value()))
        .collect();
    // Map each demand column to its post-sort client index.
    let columns: Vec<usize> = headers
        .iter()
        .skip(2)
        .map(|name| {
            client_index.get(name).copied().ok_or_else(|| {
                PlanError::Parse(format!("{}: unknown client column `{name}`", path.display()))
            })
        })
        .collect::<PlanResult<_>>()?;

    let client_count = topology.clients.len();
    let mut demand = DemandSet::default();
    // Streams already seen in the current day, to reject duplicate rows.
    let mut day_streams: HashSet<u32> = HashSet::new();
    for (idx, record) in rdr.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| record_err(path, line, e))?;
        if record.len() != columns.len() + 2 {
            return Err(record_err(
                path,
                line,
                format!("expected {} fields, got {}", columns.len() + 2, record.len()),
            ));
        }
        let label = &record[0];
        let stream_name = &record[1];
        let new_day = match demand.days.last() {
            Some(day) => day.label != label,
            None => true,
        };
        if new_day {
            demand.days.push(DemandDay::new(label.to_string()));
            day_streams.clear();
        }
        let stream = demand.names.intern(stream_name);
        if !day_streams.insert(stream.value()) {
            return Err(record_err(
                path,
                line,
                format!("duplicate stream `{stream_name}` within timestamp `{label}`"),
            ));
        }
        let mut sizes = vec![0i64; client_count];
        for (&client_idx, field) in columns.iter().zip(record.iter().skip(2)) {
            let size: i64 = field
                .parse()
                .map_err(|_| record_err(path, line, format!("invalid size `{field}`")))?;
            if size < 0 {
                return Err(record_err(path, line, "sizes must be non-negative"));
            }
            sizes[client_idx] = size;
        }
        let day = demand
            .days
            .last_mut()
            .ok_or_else(|| PlanError::Invariant("day list empty after push".into()))?;
        day.streams.push(StreamDemand::new(stream, sizes));
    }
    if demand.days.is_empty() {
        return Err(PlanError::Parse(format!(
            "{}: no demand rows",
            path.display()
        )));
    }
    Ok(demand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn fixture_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "site_bandwidth.csv",
            "site_name,bandwidth\ns0,100\ns1,50\n",
        );
        write_file(
            tmp.path(),
            "config.ini",
            "[config]\nqos_constraint=400\nbase_cost=20\n",
        );
        write_file(
            tmp.path(),
            "qos.csv",
            "site_name,c0,c1\ns0,100,500\ns1,200,300\n",
        );
        write_file(
            tmp.path(),
            "demand.csv",
            "mtime,stream_id,c0,c1\nt0,x0,30,10\nt0,x1,0,5\nt1,x0,8,0\n",
        );
        tmp
    }

    #[test]
    fn test_load_inputs_round_trip() {
        let tmp = fixture_dir();
        let inputs = load_inputs(tmp.path()).unwrap();
        assert_eq!(inputs.config.qos_constraint, 400);
        assert_eq!(inputs.config.base_cost, 20);
        assert!(!inputs.config.center_enabled());
        assert_eq!(inputs.topology.server_count(), 2);
        assert_eq!(inputs.topology.client_count(), 2);
        assert_eq!(inputs.demand.day_count(), 2);
        assert_eq!(inputs.demand.total_demand(), 53);

        // c0 reaches both servers, c1 only s1 (qos 500 >= 400 blocks s0).
        let c1 = inputs
            .topology
            .clients
            .iter()
            .find(|c| c.name == "c1")
            .unwrap();
        assert_eq!(c1.reach_count(), 1);
        let c0 = inputs
            .topology
            .clients
            .iter()
            .find(|c| c.name == "c0")
            .unwrap();
        assert_eq!(c0.reach_count(), 2);
    }

    #[test]
    fn test_demand_sizes_follow_post_sort_indices() {
        let tmp = fixture_dir();
        let inputs = load_inputs(tmp.path()).unwrap();
        // c1 sorts first (fewer reachable servers); day t0 stream x0 gives
        // c1 size 10 and c0 size 30.
        let c1_idx = inputs
            .topology
            .clients
            .iter()
            .position(|c| c.name == "c1")
            .unwrap();
        let c0_idx = inputs
            .topology
            .clients
            .iter()
            .position(|c| c.name == "c0")
            .unwrap();
        let x0 = inputs.demand.names.get("x0").unwrap();
        let day0 = &inputs.demand.days[0];
        let row = day0.streams.iter().find(|s| s.stream == x0).unwrap();
        assert_eq!(row.sizes[c1_idx], 10);
        assert_eq!(row.sizes[c0_idx], 30);
    }

    #[test]
    fn test_config_optional_center_cost() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "config.ini",
            "[config]\nqos_constraint=400\nbase_cost=20\ncenter_cost=0.5\n",
        );
        let cfg = load_config(&tmp.path().join("config.ini")).unwrap();
        assert!(cfg.center_enabled());
        assert!((cfg.center_cost - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_config_missing_key_rejected() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "config.ini", "[config]\nbase_cost=20\n");
        let err = load_config(&tmp.path().join("config.ini")).unwrap_err();
        assert!(matches!(err, PlanError::Config(_)));
    }

    #[test]
    fn test_negative_size_rejected() {
        let tmp = fixture_dir();
        write_file(
            tmp.path(),
            "demand.csv",
            "mtime,stream_id,c0,c1\nt0,x0,-3,10\n",
        );
        let err = load_inputs(tmp.path()).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_duplicate_stream_in_day_rejected() {
        let tmp = fixture_dir();
        write_file(
            tmp.path(),
            "demand.csv",
            "mtime,stream_id,c0,c1\nt0,x0,3,1\nt0,x0,2,0\n",
        );
        let err = load_inputs(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate stream"));
    }

    #[test]
    fn test_unknown_demand_column_rejected() {
        let tmp = fixture_dir();
        write_file(
            tmp.path(),
            "demand.csv",
            "mtime,stream_id,c0,cX\nt0,x0,3,1\n",
        );
        let err = load_inputs(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unknown client column"));
    }

    #[test]
    fn test_unknown_qos_site_rejected() {
        let tmp = fixture_dir();
        write_file(tmp.path(), "qos.csv", "site_name,c0,c1\nsX,100,500\n");
        let err = load_inputs(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unknown site"));
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_servers(&tmp.path().join("site_bandwidth.csv")).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn test_same_label_non_adjacent_starts_new_day() {
        // Days are encountered in file order; a label that reappears later
        // opens a fresh day rather than merging backwards.
        let tmp = fixture_dir();
        write_file(
            tmp.path(),
            "demand.csv",
            "mtime,stream_id,c0,c1\nt0,x0,1,0\nt1,x0,1,0\nt0,x1,1,0\n",
        );
        let inputs = load_inputs(tmp.path()).unwrap();
        assert_eq!(inputs.demand.day_count(), 3);
    }
}

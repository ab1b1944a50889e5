//! # edgeplan-core: Bandwidth Allocation Planning Core
//!
//! Fundamental data structures for the batch bandwidth allocation planner:
//! the immutable topology (edge servers, client regions, QoS reachability),
//! the per-day demand model, and the shared error/diagnostic types.
//!
//! ## Design Philosophy
//!
//! Servers and clients reference each other **by index into shared arrays**
//! owned by [`Topology`]: a server's `ref_clients` and a client's
//! `reachable` are vectors of stable ids, so every "from x find y" traversal
//! is a cheap lookup. [`Topology::build`] applies the planner's ordering
//! policies exactly once and remaps all indices consistently; downstream
//! components observe only the post-sort order, while `output_order`
//! remembers the input-header client order for serialisation.
//!
//! Stream names are interned to [`StreamId`]s at parse time
//! ([`demand::StreamNames`]); the string form is needed only when the
//! solution file is written.
//!
//! ## Quick Start
//!
//! ```rust
//! use edgeplan_core::{Client, ClientId, Server, ServerId, Topology};
//!
//! let servers = vec![
//!     Server::new(ServerId::new(0), "s0".to_string(), 100),
//!     Server::new(ServerId::new(1), "s1".to_string(), 50),
//! ];
//! let mut c0 = Client::new(ClientId::new(0), "c0".to_string());
//! c0.reachable = vec![ServerId::new(0), ServerId::new(1)];
//! let topo = Topology::build(servers, vec![c0]);
//!
//! assert_eq!(topo.clients.len(), 1);
//! assert_eq!(topo.clients[0].reach_capacity, 150);
//! ```
//!
//! ## Modules
//!
//! - [`demand`] - Per-day demand matrix and stream-name interning
//! - [`diagnostics`] - Validation issue reporting
//! - [`error`] - Unified [`PlanError`] / [`PlanResult`]
//! - [`percentile`] - Integer arithmetic for the 95th-percentile billing indices

use serde::{Deserialize, Serialize};

pub mod config;
pub mod demand;
pub mod diagnostics;
pub mod error;
mod order;
pub mod percentile;
pub mod solution;

pub use config::PlanConfig;
pub use demand::{DemandDay, DemandSet, StreamDemand, StreamNames};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{PlanError, PlanResult};
pub use percentile::{free_day_quota, sep_index, top5_count};
pub use solution::{ClientAllocation, Solution, SolutionCell, SolutionDay};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u32);

impl ServerId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ServerId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl ClientId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ClientId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl StreamId {
    #[inline]
    pub fn new(value: u32) -> Self {
        StreamId(value)
    }
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// An edge server with a fixed daily capacity.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    /// Maximum bytes placeable on this server in one day
    pub capacity: i64,
    /// Clients that can reach this server, sorted by ascending reachable
    /// capacity of the client (clients with fewer alternatives first)
    pub ref_clients: Vec<ClientId>,
}

impl Server {
    pub fn new(id: ServerId, name: String, capacity: i64) -> Self {
        Self {
            id,
            name,
            capacity,
            ref_clients: Vec::new(),
        }
    }

    /// Number of clients that can reach this server
    pub fn ref_count(&self) -> usize {
        self.ref_clients.len()
    }
}

/// A client region with its reachable server set.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    /// Servers reachable under the QoS constraint, sorted by ascending
    /// server reference count (less popular servers first)
    pub reachable: Vec<ServerId>,
    /// Combined capacity of every reachable server
    pub reach_capacity: i64,
}

impl Client {
    pub fn new(id: ClientId, name: String) -> Self {
        Self {
            id,
            name,
            reachable: Vec::new(),
            reach_capacity: 0,
        }
    }

    pub fn reach_count(&self) -> usize {
        self.reachable.len()
    }

    /// Position of `server` in this client's reachable list, if reachable.
    ///
    /// Reachable lists are short (bounded by the server count), so a linear
    /// scan beats a side map.
    pub fn server_position(&self, server: ServerId) -> Option<usize> {
        self.reachable.iter().position(|&s| s == server)
    }
}

/// The immutable planning topology: servers, clients, reachability.
///
/// After [`Topology::build`] the arrays are in post-sort order and every id
/// equals its array index. The topology is read-only for the rest of the
/// run.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub servers: Vec<Server>,
    pub clients: Vec<Client>,
    /// For each input-header client position, the post-sort client id; used
    /// to restore the original client order at output time
    pub output_order: Vec<ClientId>,
}

impl Topology {
    /// Assemble a topology from parsed servers and clients (both in input
    /// order, clients carrying their reachable server ids), apply the
    /// ordering policies, and remap all indices consistently.
    pub fn build(servers: Vec<Server>, clients: Vec<Client>) -> Self {
        let (servers, clients, output_order) = order::apply_sort_policies(servers, clients);
        Self {
            servers,
            clients,
            output_order,
        }
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Compute basic statistics about the topology
    pub fn stats(&self) -> TopologyStats {
        let mut stats = TopologyStats {
            num_servers: self.servers.len(),
            num_clients: self.clients.len(),
            ..TopologyStats::default()
        };
        for server in &self.servers {
            stats.total_capacity += server.capacity;
            stats.num_links += server.ref_clients.len();
        }
        if !self.clients.is_empty() {
            stats.min_reach = self.clients.iter().map(Client::reach_count).min().unwrap_or(0);
            stats.max_reach = self.clients.iter().map(Client::reach_count).max().unwrap_or(0);
            stats.avg_reach = stats.num_links as f64 / self.clients.len() as f64;
        }
        stats
    }

    /// Validate topology data for issues that make planning impossible or
    /// wasteful. Populates the provided `Diagnostics`.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.servers.is_empty() {
            diag.add_error("structure", "topology has no servers");
        }
        if self.clients.is_empty() {
            diag.add_error("structure", "topology has no clients");
        }
        for client in &self.clients {
            if client.reachable.is_empty() {
                diag.add_warning_with_entity(
                    "structure",
                    "client can reach no server under the QoS constraint",
                    &format!("client {}", client.name),
                );
            }
        }
        for server in &self.servers {
            if !server.ref_clients.is_empty() && server.capacity == 0 {
                diag.add_warning_with_entity(
                    "capacity",
                    "referenced server has zero capacity",
                    &format!("server {}", server.name),
                );
            }
        }
        let unreferenced = self.servers.iter().filter(|s| s.ref_clients.is_empty()).count();
        if unreferenced > 0 {
            diag.add_warning(
                "structure",
                &format!("{unreferenced} server(s) are referenced by no client"),
            );
        }
    }
}

/// Statistics about a topology's size and connectivity
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologyStats {
    pub num_servers: usize,
    pub num_clients: usize,
    /// Reachable (client, server) pairs
    pub num_links: usize,
    pub total_capacity: i64,
    pub min_reach: usize,
    pub max_reach: usize,
    pub avg_reach: f64,
}

impl std::fmt::Display for TopologyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} servers ({} total capacity), {} clients, {} links (reach {}/{:.2}/{})",
            self.num_servers,
            self.total_capacity,
            self.num_clients,
            self.num_links,
            self.min_reach,
            self.avg_reach,
            self.max_reach,
        )
    }
}

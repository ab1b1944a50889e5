//! Ordering policies applied to the topology before planning.
//!
//! The planner is sensitive to visit order, so the order is fixed here once
//! and every downstream component observes the post-sort indices:
//!
//! - servers: descending reference count, then descending capacity;
//! - clients: ascending reachable-server count (fewer options first);
//! - a server's ref-client list: ascending total reachable capacity of the
//!   client (clients with fewer alternatives first);
//! - a client's reachable-server list: ascending server reference count.
//!
//! All remaining ties break on the pre-sort index, keeping the permutation
//! deterministic for identical inputs.

use crate::{Client, ClientId, Server, ServerId};

/// Permute servers and clients per the ordering policies, rewrite every
/// cross-reference to the new indices, and return the input-header client
/// order as a vector of post-sort ids.
pub(crate) fn apply_sort_policies(
    servers: Vec<Server>,
    clients: Vec<Client>,
) -> (Vec<Server>, Vec<Client>, Vec<ClientId>) {
    // Reference counts and reachable-capacity totals over the pre-sort ids.
    let mut ref_count = vec![0usize; servers.len()];
    for client in &clients {
        for &s in &client.reachable {
            ref_count[s.value()] += 1;
        }
    }
    let reach_capacity: Vec<i64> = clients
        .iter()
        .map(|c| c.reachable.iter().map(|&s| servers[s.value()].capacity).sum())
        .collect();

    let mut server_order: Vec<usize> = (0..servers.len()).collect();
    server_order.sort_by(|&l, &r| {
        ref_count[r]
            .cmp(&ref_count[l])
            .then(servers[r].capacity.cmp(&servers[l].capacity))
            .then(l.cmp(&r))
    });
    let mut client_order: Vec<usize> = (0..clients.len()).collect();
    client_order.sort_by(|&l, &r| {
        clients[l]
            .reachable
            .len()
            .cmp(&clients[r].reachable.len())
            .then(l.cmp(&r))
    });

    // Old index -> new index maps.
    let mut server_new = vec![0usize; servers.len()];
    for (new, &old) in server_order.iter().enumerate() {
        server_new[old] = new;
    }
    let mut client_new = vec![0usize; clients.len()];
    for (new, &old) in client_order.iter().enumerate() {
        client_new[old] = new;
    }

    let mut sorted_servers: Vec<Server> = server_order
        .iter()
        .map(|&old| servers[old].clone())
        .collect();
    let mut sorted_clients: Vec<Client> = client_order
        .iter()
        .map(|&old| clients[old].clone())
        .collect();

    // Ref counts and reach capacities carried over to the new indices, for
    // the per-list sorts below.
    let ref_count_new: Vec<usize> = server_order.iter().map(|&old| ref_count[old]).collect();
    let reach_capacity_new: Vec<i64> =
        client_order.iter().map(|&old| reach_capacity[old]).collect();

    for (new, server) in sorted_servers.iter_mut().enumerate() {
        server.id = ServerId::new(new);
        server.ref_clients.clear();
    }
    for (new, client) in sorted_clients.iter_mut().enumerate() {
        client.id = ClientId::new(new);
        client.reach_capacity = reach_capacity_new[new];
        for s in client.reachable.iter_mut() {
            *s = ServerId::new(server_new[s.value()]);
        }
        client.reachable.sort_by(|&l, &r| {
            ref_count_new[l.value()]
                .cmp(&ref_count_new[r.value()])
                .then(l.value().cmp(&r.value()))
        });
    }

    // Rebuild each server's ref-client list from the remapped reachability,
    // then order it by ascending client reach capacity.
    for (new, client) in sorted_clients.iter().enumerate() {
        for &s in &client.reachable {
            sorted_servers[s.value()].ref_clients.push(ClientId::new(new));
        }
    }
    for server in sorted_servers.iter_mut() {
        server.ref_clients.sort_by(|&l, &r| {
            reach_capacity_new[l.value()]
                .cmp(&reach_capacity_new[r.value()])
                .then(l.value().cmp(&r.value()))
        });
    }

    let output_order: Vec<ClientId> = (0..clients.len())
        .map(|old| ClientId::new(client_new[old]))
        .collect();

    (sorted_servers, sorted_clients, output_order)
}

use std::path::Path;

use anyhow::Result;
use edgeplan_core::{free_day_quota, Diagnostics};
use edgeplan_io::load_inputs;

pub fn run(data: &Path) -> Result<()> {
    let inputs = load_inputs(data)?;
    let topo = inputs.topology.stats();
    let demand = inputs.demand.stats();

    println!("Inputs in {}:", data.display());
    println!("  Servers        : {} ({} total capacity)", topo.num_servers, topo.total_capacity);
    println!("  Clients        : {}", topo.num_clients);
    println!(
        "  Reachability   : {} links, {}/{:.2}/{} min/avg/max per client",
        topo.num_links, topo.min_reach, topo.avg_reach, topo.max_reach
    );
    println!("  Days           : {}", demand.num_days);
    println!("  Stream names   : {}", demand.num_stream_names);
    println!(
        "  Demand         : {} total ({} avg/day, {} peak day, {} peak stream)",
        demand.total_demand, demand.avg_day_total, demand.max_day_total, demand.max_stream_size
    );
    println!("  Free-day quota : {}", free_day_quota(demand.num_days.max(1)));
    println!(
        "  Billing        : qos_constraint={} base_cost={} center_cost={}",
        inputs.config.qos_constraint, inputs.config.base_cost, inputs.config.center_cost
    );

    let mut diag = Diagnostics::new();
    inputs.topology.validate_into(&mut diag);
    if !diag.is_empty() {
        println!("Diagnostics:");
        for issue in &diag.issues {
            println!("  {}", issue);
        }
    }
    Ok(())
}

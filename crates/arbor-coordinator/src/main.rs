//! Entry point for the arbor coordinator binary.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use arbor_coordinator::{Coordinator, CoordinatorConfig};

/// Coordinator for one arbor spanning-tree round.
#[derive(Debug, Parser)]
#[command(name = "arbor-coordinator", version, about)]
struct Args {
    /// Minimum number of peers to wait for (floors at 3).
    #[arg(default_value_t = 3)]
    min_peers: usize,

    /// Registration listener address.
    #[arg(long, default_value = "127.0.0.1:8081")]
    listen: String,

    /// Milliseconds to let peer connections settle between phases.
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("arbor_coordinator=debug,arbor_transport=info")
        .init();

    let args = Args::parse();
    let config = CoordinatorConfig::default()
        .with_listen_addr(args.listen)
        .with_min_peers(args.min_peers)
        .with_settle_delay(Duration::from_millis(args.settle_ms));

    let coordinator = match Coordinator::bind(config).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!(error = %e, "Coordinator failed to start");
            std::process::exit(e.exit_code());
        }
    };

    match coordinator.run().await {
        Ok(summary) => {
            info!(
                peers = summary.contacts.len(),
                edges = summary.edges.len(),
                root = %summary.contacts[summary.root].id,
                "Round finished"
            );
        }
        Err(e) => {
            error!(error = %e, "Coordinator failed");
            std::process::exit(e.exit_code());
        }
    }
}

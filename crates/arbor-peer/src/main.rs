//! Entry point for the arbor peer binary.

use clap::Parser;
use tracing::{error, info};

use arbor_peer::{PeerConfig, run_peer};

/// One peer of an arbor overlay.
#[derive(Debug, Parser)]
#[command(name = "arbor-peer", version, about)]
struct Args {
    /// Coordinator address to register with.
    #[arg(long, default_value = "127.0.0.1:8081")]
    coordinator: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("arbor_peer=debug,arbor_transport=info,arbor_bfs=info")
        .init();

    let args = Args::parse();
    let config = PeerConfig::default().with_coordinator_addr(args.coordinator);

    match run_peer(config).await {
        Ok(report) => {
            for child in &report.children {
                info!(parent = %report.id, child = %child, "Tree edge");
            }
        }
        Err(e) => {
            error!(error = %e, "Peer failed");
            std::process::exit(e.exit_code());
        }
    }
}

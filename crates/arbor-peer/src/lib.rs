//! # Arbor Peer
//!
//! One peer of an arbor overlay.
//!
//! A peer binds an ephemeral accept socket, registers with the coordinator
//! (ID + callback address), then follows the coordinator's control frames:
//! introductions spawn dialers, `StopListening` seals the neighbor set and
//! builds the labeling machine, `Init` makes this peer the root, and
//! `Final` asks for the tree report that [`run_peer`] returns.
//!
//! All inbound frames are linearized by a single dispatcher task; see
//! [`dispatch`](self) internals for the task topology.

mod dispatch;
pub mod error;

pub use error::PeerError;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::info;

use arbor_core::{PeerContact, PeerId};
use arbor_transport::dial_coordinator;

use crate::dispatch::{Dispatcher, LinkSource, spawn_accept_loop, spawn_link_reader};

/// Peer runtime configuration.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Coordinator address to register with.
    pub coordinator_addr: String,
    /// Local accept socket address; port 0 picks an ephemeral port.
    pub listen_addr: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            coordinator_addr: "127.0.0.1:8081".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
        }
    }
}

impl PeerConfig {
    /// Set the coordinator address.
    pub fn with_coordinator_addr(mut self, addr: impl Into<String>) -> Self {
        self.coordinator_addr = addr.into();
        self
    }

    /// Set the local accept socket address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }
}

/// Final tree position of one peer.
#[derive(Debug, Clone)]
pub struct TreeReport {
    /// The peer's identity.
    pub id: PeerId,
    /// Adopted parent; equal to `id` iff this peer was the root, unset if
    /// the peer was never labeled.
    pub parent: Option<PeerId>,
    /// BFS depth, unset if never labeled.
    pub tree_level: Option<u64>,
    /// Neighbors that adopted this peer as parent.
    pub children: Vec<PeerId>,
}

impl TreeReport {
    /// Whether this peer ended up as the root.
    pub fn is_root(&self) -> bool {
        self.parent.as_ref() == Some(&self.id)
    }
}

/// Run one peer to completion: register, join the overlay, take part in
/// the labeling round, and return the final tree report.
pub async fn run_peer(config: PeerConfig) -> Result<TreeReport, PeerError> {
    let id = PeerId::generate();

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(PeerError::Bind)?;
    let local_addr = listener.local_addr().map_err(PeerError::Bind)?;

    info!(peer = %id, address = %local_addr, "Peer listening");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let contact = PeerContact::new(id.clone(), local_addr.to_string());
    let (coordinator_reader, coordinator_writer) =
        dial_coordinator(&config.coordinator_addr, &contact)
            .await
            .map_err(PeerError::Coordinator)?;

    spawn_link_reader(LinkSource::Coordinator, coordinator_reader, events_tx.clone());
    spawn_accept_loop(listener, events_tx.clone(), shutdown_rx);

    let dispatcher = Dispatcher::new(id, events_tx, coordinator_writer, shutdown_tx);
    let report = dispatcher.run(events_rx).await?;

    info!(
        peer = %report.id,
        parent = ?report.parent,
        level = ?report.tree_level,
        children = report.children.len(),
        "Round finished"
    );
    Ok(report)
}

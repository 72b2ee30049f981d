//! # Arbor Coordinator
//!
//! Orchestrates one spanning-tree construction round.
//!
//! The coordinator accepts a fixed number of peer registrations, wires the
//! peers into a random undirected graph by sending introductions, seals
//! their listeners, initializes one root, waits for the root's completion
//! notice, and finally asks every peer to report its tree children.
//!
//! Phases are strictly sequential; the only inbound traffic the
//! coordinator acts on is the single `Complete` envelope.

pub mod error;
pub mod graph;

pub use error::CoordinatorError;
pub use graph::Edge;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use arbor_core::{Command, Message, Payload, PeerContact, PeerId};
use arbor_transport::{FramedReader, FramedWriter, WireError, split};

/// Minimum number of peers in a round.
pub const MIN_PEER_COUNT: usize = 3;

/// Coordinator runtime configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Registration listener address; port 0 picks an ephemeral port.
    pub listen_addr: String,
    /// Requested peer count; the effective count floors at
    /// [`MIN_PEER_COUNT`].
    pub min_peers: usize,
    /// Wall-clock pause after introductions and again after sealing, so
    /// peer-to-peer connections settle before the next phase.
    pub settle_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".to_string(),
            min_peers: MIN_PEER_COUNT,
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl CoordinatorConfig {
    /// Set the registration listener address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the requested peer count.
    pub fn with_min_peers(mut self, min_peers: usize) -> Self {
        self.min_peers = min_peers;
        self
    }

    /// Set the quiescence delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Effective peer count for the round.
    pub fn peer_count(&self) -> usize {
        self.min_peers.max(MIN_PEER_COUNT)
    }
}

/// Outcome of a finished round.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Registered peers in dense-index (arrival) order.
    pub contacts: Vec<PeerContact>,
    /// The synthesized neighbor graph over dense indices.
    pub edges: Vec<Edge>,
    /// Dense index of the initialized root.
    pub root: usize,
}

/// Events forwarded by the per-peer inbound pumps.
enum InboundEvent {
    Frame(Message),
    LinkFailed(WireError),
}

/// One registered peer: its contact record and outbound encoder.
struct RegisteredPeer {
    contact: PeerContact,
    writer: FramedWriter,
}

/// A bound coordinator, ready to run one round.
pub struct Coordinator {
    config: CoordinatorConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Coordinator {
    /// Bind the registration listener.
    pub async fn bind(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(CoordinatorError::Bind)?;
        let local_addr = listener.local_addr().map_err(CoordinatorError::Bind)?;

        info!(address = %local_addr, peers = config.peer_count(), "Coordinator listening");
        Ok(Self {
            config,
            listener,
            local_addr,
        })
    }

    /// The bound registration address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run every phase to completion and return the round summary.
    pub async fn run(self) -> Result<RunSummary, CoordinatorError> {
        let Self {
            config, listener, ..
        } = self;

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();

        let mut peers = accept_registrations(&listener, config.peer_count(), &inbound_tx).await;
        drop(listener);
        drop(inbound_tx);

        let edges = graph::synthesize(peers.len());
        for (i, j) in &edges {
            debug!(from = %peers[*i].contact.id, to = %peers[*j].contact.id, "Graph edge");
        }
        info!(peers = peers.len(), edges = edges.len(), "Graph synthesized");

        // One-directional instruction: the first endpoint dials, the
        // second keeps listening.
        for (i, j) in &edges {
            let introduction = Message::new(
                PeerId::coordinator(),
                peers[*i].contact.id.clone(),
                Command::NewNeighbor,
                Payload::Introduction(peers[*j].contact.clone()),
            );
            peers[*i].writer.write(&introduction).await?;
        }
        info!("Introductions sent");

        sleep(config.settle_delay).await;

        for peer in &mut peers {
            let seal = Message::plain(
                PeerId::coordinator(),
                peer.contact.id.clone(),
                Command::StopListening,
            );
            peer.writer.write(&seal).await?;
        }
        info!("Peers sealed");

        sleep(config.settle_delay).await;

        let root = edges.first().map(|(i, _)| *i).unwrap_or(0);
        let init = Message::plain(
            PeerId::coordinator(),
            peers[root].contact.id.clone(),
            Command::Init,
        );
        peers[root].writer.write(&init).await?;
        info!(root = %peers[root].contact.id, "Root initialized");

        loop {
            let Some(event) = inbound_rx.recv().await else {
                return Err(CoordinatorError::QueueClosed);
            };
            match event {
                InboundEvent::Frame(message)
                    if message.receiver.is_coordinator()
                        && message.command == Command::Complete =>
                {
                    info!(root = %message.sender, "Construction complete");
                    break;
                }
                InboundEvent::Frame(message) => {
                    warn!(
                        sender = %message.sender,
                        command = ?message.command,
                        "Unexpected envelope, ignoring"
                    );
                }
                InboundEvent::LinkFailed(error) => return Err(error.into()),
            }
        }

        for peer in &mut peers {
            let done = Message::plain(PeerId::coordinator(), peer.contact.id.clone(), Command::Final);
            peer.writer.write(&done).await?;
        }
        info!("Final broadcast, tearing down");

        Ok(RunSummary {
            contacts: peers.into_iter().map(|peer| peer.contact).collect(),
            edges,
            root,
        })
    }
}

/// Accept exactly `target` registrations, assigning dense indices by
/// arrival order. Accept and handshake failures are logged and do not
/// count toward the target.
async fn accept_registrations(
    listener: &TcpListener,
    target: usize,
    inbound: &mpsc::UnboundedSender<InboundEvent>,
) -> Vec<RegisteredPeer> {
    let mut peers = Vec::with_capacity(target);

    while peers.len() < target {
        debug!(waiting = target - peers.len(), "Waiting for peers");

        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!(error = %e, "Accept failed, continuing");
                continue;
            }
        };

        let (mut reader, writer) = split(stream);
        let contact: PeerContact = match reader.read().await {
            Ok(contact) => contact,
            Err(e) => {
                warn!(error = %e, "Registration handshake failed, dropping connection");
                continue;
            }
        };

        info!(
            index = peers.len(),
            peer = %contact.id,
            address = %contact.address,
            "Peer joined"
        );
        spawn_inbound_pump(reader, inbound.clone());
        peers.push(RegisteredPeer { contact, writer });
    }

    peers
}

/// Spawn a task draining one peer link into the inbound queue.
fn spawn_inbound_pump(mut reader: FramedReader, inbound: mpsc::UnboundedSender<InboundEvent>) {
    tokio::spawn(async move {
        loop {
            match reader.read::<Message>().await {
                Ok(message) => {
                    if inbound.send(InboundEvent::Frame(message)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    let _ = inbound.send(InboundEvent::LinkFailed(error));
                    break;
                }
            }
        }
    });
}

//! Single-threaded dispatch of inbound frames
//!
//! Every frame a peer observes funnels through one unbounded queue drained
//! by the [`Dispatcher`]. The dispatcher owns the neighbor registry, the
//! coordinator encoder, and the sealed labeling machine, so all BFS state
//! transitions are totally ordered without cross-task locking. Loopback
//! sends from the machine re-enter the same queue.
//!
//! Teardown: `Final` stores the tree report but keeps every link open; the
//! dispatcher returns once the coordinator closes its link. This makes the
//! coordinator's exit the teardown barrier, so neighbor links collapsing
//! while other peers shut down are not mistaken for mid-round failures.

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use arbor_bfs::{BfsNode, Outbox};
use arbor_core::{Command, Message, Payload, PeerContact, PeerId};
use arbor_transport::{FramedReader, FramedWriter, NeighborTable, WireError, accept_peer, dial_peer};

use crate::TreeReport;
use crate::error::PeerError;

/// Which link an event originated from.
#[derive(Clone)]
pub(crate) enum LinkSource {
    /// The peer-to-coordinator link.
    Coordinator,
    /// A peer link; the ID is unknown until the hello handshake finishes.
    Peer(Option<PeerId>),
}

/// Events drained by the dispatcher.
pub(crate) enum PeerEvent {
    /// A decoded envelope from any link, or a loopback send.
    Frame(Message),
    /// A completed handshake: register the neighbor's outbound encoder.
    Register { id: PeerId, writer: FramedWriter },
    /// A link reader, dialer, or accept handshake failed.
    LinkFailed {
        source: LinkSource,
        error: WireError,
    },
    /// The accept loop failed.
    AcceptFailed(std::io::Error),
}

/// Outbox that feeds the labeling machine's sends back into the dispatch
/// queue.
#[derive(Clone)]
pub(crate) struct QueueOutbox(mpsc::UnboundedSender<PeerEvent>);

impl Outbox for QueueOutbox {
    fn send(&self, message: Message) {
        // A closed queue means the round is already over.
        let _ = self.0.send(PeerEvent::Frame(message));
    }
}

/// Spawn a task draining one link into the dispatch queue.
pub(crate) fn spawn_link_reader(
    source: LinkSource,
    mut reader: FramedReader,
    events: mpsc::UnboundedSender<PeerEvent>,
) {
    tokio::spawn(async move {
        loop {
            match reader.read::<Message>().await {
                Ok(message) => {
                    if events.send(PeerEvent::Frame(message)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    let _ = events.send(PeerEvent::LinkFailed {
                        source: source.clone(),
                        error,
                    });
                    break;
                }
            }
        }
    });
}

/// Spawn the accept loop. Each accepted connection completes its hello
/// handshake on its own task, then registers through the dispatch queue.
///
/// The loop ends (dropping the accept socket) when `shutdown` flips.
pub(crate) fn spawn_accept_loop(
    listener: TcpListener,
    events: mpsc::UnboundedSender<PeerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("Accept loop sealed");
                    break;
                }
                result = listener.accept() => match result {
                    Ok((stream, _)) => {
                        let events = events.clone();
                        tokio::spawn(async move {
                            match accept_peer(stream).await {
                                Ok((id, reader, writer)) => {
                                    spawn_link_reader(
                                        LinkSource::Peer(Some(id.clone())),
                                        reader,
                                        events.clone(),
                                    );
                                    let _ = events.send(PeerEvent::Register { id, writer });
                                }
                                Err(error) => {
                                    let _ = events.send(PeerEvent::LinkFailed {
                                        source: LinkSource::Peer(None),
                                        error,
                                    });
                                }
                            }
                        });
                    }
                    Err(e) => {
                        let _ = events.send(PeerEvent::AcceptFailed(e));
                        break;
                    }
                }
            }
        }
    });
}

/// Spawn a dialer for one introduction.
fn spawn_dialer(contact: PeerContact, local_id: PeerId, events: mpsc::UnboundedSender<PeerEvent>) {
    tokio::spawn(async move {
        match dial_peer(&contact.address, &local_id).await {
            Ok((reader, writer)) => {
                spawn_link_reader(
                    LinkSource::Peer(Some(contact.id.clone())),
                    reader,
                    events.clone(),
                );
                let _ = events.send(PeerEvent::Register {
                    id: contact.id,
                    writer,
                });
            }
            Err(error) => {
                let _ = events.send(PeerEvent::LinkFailed {
                    source: LinkSource::Peer(Some(contact.id)),
                    error,
                });
            }
        }
    });
}

/// Drains the dispatch queue and owns every outbound encoder.
pub(crate) struct Dispatcher {
    id: PeerId,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    coordinator: FramedWriter,
    neighbors: NeighborTable,
    node: Option<tokio::sync::Mutex<BfsNode<QueueOutbox>>>,
    shutdown: watch::Sender<bool>,
    sealed: bool,
    /// Set when `Final` has been handled; the round is over and only
    /// teardown remains.
    pending_report: Option<TreeReport>,
}

impl Dispatcher {
    pub(crate) fn new(
        id: PeerId,
        events_tx: mpsc::UnboundedSender<PeerEvent>,
        coordinator: FramedWriter,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            id,
            events_tx,
            coordinator,
            neighbors: NeighborTable::new(),
            node: None,
            shutdown,
            sealed: false,
            pending_report: None,
        }
    }

    /// Drain events until teardown completes or the round aborts.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> Result<TreeReport, PeerError> {
        while let Some(event) = events.recv().await {
            match event {
                PeerEvent::Frame(message) => self.route(message).await?,
                PeerEvent::Register { id, writer } => {
                    if self.sealed {
                        warn!(peer = %id, "Neighbor registered after seal; kept for routing only");
                    }
                    if self.neighbors.insert(id.clone(), writer) {
                        debug!(peer = %id, "Neighbor registered");
                    }
                }
                PeerEvent::LinkFailed {
                    source: LinkSource::Coordinator,
                    error,
                } => {
                    return match self.pending_report.take() {
                        Some(report) => {
                            debug!("Coordinator link closed after Final");
                            Ok(report)
                        }
                        None => Err(PeerError::Wire(error)),
                    };
                }
                PeerEvent::LinkFailed {
                    source: LinkSource::Peer(peer),
                    error,
                } => {
                    if self.pending_report.is_some() {
                        debug!(peer = ?peer, "Peer link closed during teardown, ignoring");
                    } else {
                        warn!(peer = ?peer, error = %error, "Peer link failed");
                        return Err(PeerError::Wire(error));
                    }
                }
                PeerEvent::AcceptFailed(e) => return Err(PeerError::Accept(e)),
            }
        }
        Err(PeerError::QueueClosed)
    }

    /// Routing rules, in order: coordinator control first, then the
    /// coordinator link, then loopback, then the neighbor registry.
    async fn route(&mut self, message: Message) -> Result<(), PeerError> {
        if message.sender.is_coordinator() {
            return self.handle_control(message).await;
        }

        if message.receiver.is_coordinator() {
            self.coordinator.write(&message).await?;
            return Ok(());
        }

        if message.receiver == self.id {
            self.deliver_to_node(&message).await;
            return Ok(());
        }

        let Some(writer) = self.neighbors.writer_mut(&message.receiver) else {
            return Err(PeerError::RoutingMiss(message.receiver));
        };
        writer.write(&message).await?;
        Ok(())
    }

    async fn handle_control(&mut self, message: Message) -> Result<(), PeerError> {
        match message.command {
            Command::NewNeighbor => {
                match &message.payload {
                    Payload::Introduction(contact) => {
                        debug!(peer = %contact.id, address = %contact.address, "Introduction received");
                        spawn_dialer(contact.clone(), self.id.clone(), self.events_tx.clone());
                    }
                    other => {
                        warn!(payload = ?other, "Introduction without a contact, ignoring");
                    }
                }
            }
            Command::StopListening => self.seal(),
            Command::Init => self.deliver_to_node(&message).await,
            Command::Final => {
                let report = self.report().await;
                info!(
                    peer = %report.id,
                    children = report.children.len(),
                    "Final received, awaiting teardown"
                );
                self.pending_report = Some(report);
            }
            other => {
                warn!(command = ?other, "Unknown control command, ignoring");
            }
        }
        Ok(())
    }

    /// Close the accept socket and build the labeling machine over the
    /// now-frozen neighbor set. Built exactly once.
    fn seal(&mut self) {
        if self.sealed {
            return;
        }
        self.sealed = true;
        let _ = self.shutdown.send(true);

        let neighbors = self.neighbors.ids();
        info!(peer = %self.id, neighbors = neighbors.len(), "Neighbor set sealed");

        self.node = Some(tokio::sync::Mutex::new(BfsNode::new(
            QueueOutbox(self.events_tx.clone()),
            self.id.clone(),
            neighbors,
        )));
    }

    /// Feed one envelope to the labeling machine, holding its guard for
    /// the whole handler.
    async fn deliver_to_node(&self, message: &Message) {
        let Some(node) = &self.node else {
            warn!(command = ?message.command, "Frame for the labeling machine before seal, dropping");
            return;
        };
        let mut node = node.lock().await;
        node.handle(message);
    }

    async fn report(&self) -> TreeReport {
        let Some(node) = &self.node else {
            warn!(peer = %self.id, "Final before seal; reporting an empty tree");
            return TreeReport {
                id: self.id.clone(),
                parent: None,
                tree_level: None,
                children: Vec::new(),
            };
        };

        let node = node.lock().await;
        TreeReport {
            id: self.id.clone(),
            parent: node.parent().cloned(),
            tree_level: node.tree_level(),
            children: node.children(),
        }
    }
}

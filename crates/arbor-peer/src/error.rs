//! Peer error types and exit codes

use thiserror::Error;

use arbor_core::PeerId;
use arbor_transport::WireError;

/// Errors that abort a peer's round.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The accept socket could not be bound.
    #[error("Failed to bind listener: {0}")]
    Bind(std::io::Error),

    /// The accept loop failed.
    #[error("Failed to accept a neighbor connection: {0}")]
    Accept(std::io::Error),

    /// The coordinator could not be reached or the registration frame
    /// could not be sent.
    #[error("Failed to register with coordinator: {0}")]
    Coordinator(WireError),

    /// A wire failure on an established link.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The dispatcher was asked to route to a peer with no registered
    /// link. This is an invariant violation, never a recoverable miss.
    #[error("No link for receiver {0}")]
    RoutingMiss(PeerId),

    /// Every event producer hung up before the round finished.
    #[error("Dispatch queue closed before completion")]
    QueueClosed,
}

impl PeerError {
    /// Distinct process exit code per failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bind(_) => 10,
            Self::Accept(_) => 11,
            Self::Coordinator(_) | Self::Wire(WireError::ConnectFailed { .. }) => 12,
            Self::Wire(WireError::Encode(_)) | Self::Wire(WireError::FrameTooLarge { .. }) => 13,
            Self::Wire(WireError::Decode(_)) => 14,
            Self::Wire(WireError::LinkBroken(_)) => 15,
            Self::RoutingMiss(_) => 16,
            Self::QueueClosed => 17,
        }
    }
}

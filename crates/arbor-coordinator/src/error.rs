//! Coordinator error types and exit codes

use thiserror::Error;

use arbor_transport::WireError;

/// Errors that abort a coordinator run.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The registration listener could not be bound.
    #[error("Failed to bind coordinator listener: {0}")]
    Bind(std::io::Error),

    /// A wire failure on an established peer link.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Every inbound pump hung up before a completion arrived.
    #[error("Inbound queue closed before completion")]
    QueueClosed,
}

impl CoordinatorError {
    /// Distinct process exit code per failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bind(_) => 10,
            Self::Wire(WireError::ConnectFailed { .. }) => 12,
            Self::Wire(WireError::Encode(_)) | Self::Wire(WireError::FrameTooLarge { .. }) => 13,
            Self::Wire(WireError::Decode(_)) => 14,
            Self::Wire(WireError::LinkBroken(_)) => 15,
            Self::QueueClosed => 17,
        }
    }
}

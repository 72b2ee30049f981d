//! Transport error types

use thiserror::Error;

/// Errors raised by framed links.
#[derive(Debug, Error)]
pub enum WireError {
    /// Read or write failed on an established link, including EOF.
    #[error("Link broken: {0}")]
    LinkBroken(String),

    /// A frame exceeded the size bound, on either side of the codec.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Record could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Record could not be decoded; indicates protocol drift.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound connection could not be established.
    #[error("Connect failed to {address}: {source}")]
    ConnectFailed {
        address: String,
        source: std::io::Error,
    },
}

impl WireError {
    pub(crate) fn link_broken(e: std::io::Error) -> Self {
        Self::LinkBroken(e.to_string())
    }
}

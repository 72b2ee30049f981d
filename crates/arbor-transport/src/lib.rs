//! # Arbor Transport
//!
//! Framed TCP links for the arbor overlay.
//!
//! Every link carries length-delimited, postcard-encoded records: a 4-byte
//! big-endian length prefix followed by the record body, bounded by
//! [`MAX_FRAME_SIZE`]. Links are split into a [`FramedReader`] and a
//! [`FramedWriter`] half so one task can drain inbound frames while the
//! dispatcher owns the outbound encoder.
//!
//! Handshakes:
//! - peer ↔ peer: the dialer sends its bare ID as the first frame
//!   ([`dial_peer`] / [`accept_peer`]);
//! - peer → coordinator: the peer sends its contact record as the first
//!   frame ([`dial_coordinator`]).
//!
//! All subsequent frames on any link are full message envelopes.

pub mod error;
pub mod frame;
pub mod link;
pub mod neighbors;

pub use error::WireError;
pub use frame::{MAX_FRAME_SIZE, encode_frame, read_frame, write_frame};
pub use link::{FramedReader, FramedWriter, accept_peer, dial_coordinator, dial_peer, split};
pub use neighbors::NeighborTable;

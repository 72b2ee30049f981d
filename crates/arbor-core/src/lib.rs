//! # Arbor Core
//!
//! Core wire types for the arbor overlay.
//!
//! Every process in an arbor network speaks the same small vocabulary:
//! opaque string [`PeerId`]s, a closed [`Command`] enum with wire-stable
//! ordinals, and a [`Message`] envelope whose [`Payload`] is one of three
//! closed shapes. The transport, state machine, and orchestrator crates all
//! build on these types.

pub mod identity;
pub mod message;

pub use identity::{COORDINATOR_ID, PeerId};
pub use message::{Command, Message, Payload, PeerContact};

//! # Arbor BFS
//!
//! The per-peer spanning-tree state machine.
//!
//! Each peer owns one [`BfsNode`] built after its neighbor set is sealed.
//! The root broadcasts `Label` waves downward through the growing tree;
//! peers answer every `Label` with exactly one echo (`End`, `Keepon`, or
//! `Stop`), and a subtree commits upward with `End` once its frontier has
//! drained. The root's frontier draining is global termination, reported
//! to the coordinator with a single `Complete`.
//!
//! The machine is pure bookkeeping: it never performs I/O and emits
//! envelopes through the [`Outbox`] seam, so the peer runtime and the test
//! harness plug in different sinks.

pub mod node;

pub use node::{BfsNode, Outbox};

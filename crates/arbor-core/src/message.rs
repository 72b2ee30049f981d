//! Message envelopes exchanged between peers and the coordinator
//!
//! Every frame after a link's handshake is a [`Message`]: sender, receiver,
//! a [`Command`], and a closed-variant [`Payload`]. Dispatchers route
//! envelopes purely by `sender`/`receiver`; only the BFS state machine and
//! the control handlers look at the command.

use serde::{Deserialize, Serialize};

use crate::identity::PeerId;

/// Commands understood by peers and the coordinator.
///
/// The wire ordinal of a command is its declaration index; the order below
/// is wire-stable and must not be rearranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Introduction of a peer to dial (coordinator to peer).
    NewNeighbor,
    /// Close the accept socket and freeze the neighbor set.
    StopListening,
    /// Become the root and start labeling.
    Init,
    /// Offer the sender's tree level to a neighbor.
    Label,
    /// Echo: the sender's subtree is complete.
    End,
    /// Echo: the sender's subtree is still growing.
    Keepon,
    /// Echo: the sender already has a parent, the edge is a non-tree edge.
    Stop,
    /// The root's one-shot completion notice to the coordinator.
    Complete,
    /// Ask peers to report their tree children.
    Final,
}

/// A peer's identity together with its dialable listener address.
///
/// Sent as the first frame on the peer-to-coordinator link, and embedded in
/// [`Command::NewNeighbor`] introductions so the receiving peer can dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerContact {
    /// The peer's identity.
    pub id: PeerId,
    /// The address of the peer's accept socket.
    pub address: String,
}

impl PeerContact {
    /// Create a contact record.
    pub fn new(id: PeerId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

/// Closed payload variant carried by an envelope.
///
/// The codec accepts exactly these three shapes and rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// No payload.
    None,
    /// A tree level, carried by [`Command::Label`].
    Level(u64),
    /// An introduction record, carried by [`Command::NewNeighbor`].
    Introduction(PeerContact),
}

/// Envelope routed by peer dispatchers and the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Originating identity (`"server"` for coordinator control frames).
    pub sender: PeerId,
    /// Destination identity (`"server"` routes to the coordinator link).
    pub receiver: PeerId,
    /// What the receiver should do.
    pub command: Command,
    /// Command-specific payload.
    pub payload: Payload,
}

impl Message {
    /// Create an envelope.
    pub fn new(sender: PeerId, receiver: PeerId, command: Command, payload: Payload) -> Self {
        Self {
            sender,
            receiver,
            command,
            payload,
        }
    }

    /// Create an envelope with no payload.
    pub fn plain(sender: PeerId, receiver: PeerId, command: Command) -> Self {
        Self::new(sender, receiver, command, Payload::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_ordinals_are_stable() {
        let expected = [
            (Command::NewNeighbor, 0u8),
            (Command::StopListening, 1),
            (Command::Init, 2),
            (Command::Label, 3),
            (Command::End, 4),
            (Command::Keepon, 5),
            (Command::Stop, 6),
            (Command::Complete, 7),
            (Command::Final, 8),
        ];
        for (command, ordinal) in expected {
            let encoded = postcard::to_allocvec(&command).unwrap();
            assert_eq!(encoded, vec![ordinal], "{command:?}");
        }
    }

    #[test]
    fn test_unknown_command_ordinal_is_rejected() {
        assert!(postcard::from_bytes::<Command>(&[9]).is_err());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let msg = Message::new(
            PeerId::new("a1"),
            PeerId::new("b2"),
            Command::Label,
            Payload::Level(3),
        );
        let bytes = postcard::to_allocvec(&msg).unwrap();
        let decoded: Message = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_introduction_payload_roundtrip() {
        let contact = PeerContact::new(PeerId::new("c3"), "127.0.0.1:4000");
        let msg = Message::new(
            PeerId::coordinator(),
            PeerId::new("a1"),
            Command::NewNeighbor,
            Payload::Introduction(contact.clone()),
        );
        let bytes = postcard::to_allocvec(&msg).unwrap();
        let decoded: Message = postcard::from_bytes(&bytes).unwrap();
        match decoded.payload {
            Payload::Introduction(c) => assert_eq!(c, contact),
            other => panic!("expected introduction, got {other:?}"),
        }
    }
}

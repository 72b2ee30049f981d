//! Peer identity
//!
//! Peers are identified by opaque strings that are generated once at
//! startup and stay stable for the session. The coordinator is addressed
//! by the reserved identity [`COORDINATOR_ID`].

use std::fmt::{self, Display};

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Reserved identity naming the coordinator on the wire.
pub const COORDINATOR_ID: &str = "server";

/// Opaque session-unique peer identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an existing identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identity from process entropy.
    pub fn generate() -> Self {
        let mut raw = [0u8; 8];
        rand::rng().fill_bytes(&mut raw);
        Self(hex::encode(raw))
    }

    /// The identity naming the coordinator.
    pub fn coordinator() -> Self {
        Self(COORDINATOR_ID.to_string())
    }

    /// Whether this identity names the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.0 == COORDINATOR_ID
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

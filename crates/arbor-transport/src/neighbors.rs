//! Insertion-ordered neighbor registry

use tokio::net::tcp::OwnedWriteHalf;

use arbor_core::PeerId;

use crate::link::FramedWriter;

/// Registry of confirmed neighbors, in registration order.
///
/// Holds the outbound encoder for every peer link. Owned exclusively by the
/// dispatcher task and append-only once the listener is sealed, so no lock
/// is needed.
pub struct NeighborTable<W = OwnedWriteHalf> {
    entries: Vec<(PeerId, FramedWriter<W>)>,
}

impl<W> NeighborTable<W> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a neighbor, append-if-absent.
    ///
    /// Returns false (dropping the writer) when the ID was already
    /// registered.
    pub fn insert(&mut self, id: PeerId, writer: FramedWriter<W>) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.entries.push((id, writer));
        true
    }

    /// Whether a neighbor is registered.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.entries.iter().any(|(entry_id, _)| entry_id == id)
    }

    /// Outbound encoder for a neighbor.
    pub fn writer_mut(&mut self, id: &PeerId) -> Option<&mut FramedWriter<W>> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, writer)| writer)
    }

    /// Neighbor IDs in registration order.
    pub fn ids(&self) -> Vec<PeerId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Number of registered neighbors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<W> Default for NeighborTable<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> FramedWriter<Vec<u8>> {
        FramedWriter::new(Vec::new())
    }

    #[test]
    fn test_insert_preserves_registration_order() {
        let mut table = NeighborTable::new();
        assert!(table.insert(PeerId::new("c"), writer()));
        assert!(table.insert(PeerId::new("a"), writer()));
        assert!(table.insert(PeerId::new("b"), writer()));

        assert_eq!(
            table.ids(),
            vec![PeerId::new("c"), PeerId::new("a"), PeerId::new("b")]
        );
    }

    #[test]
    fn test_insert_is_append_if_absent() {
        let mut table = NeighborTable::new();
        assert!(table.insert(PeerId::new("a"), writer()));
        assert!(!table.insert(PeerId::new("a"), writer()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_writer_lookup() {
        let mut table = NeighborTable::new();
        table.insert(PeerId::new("a"), writer());

        assert!(table.writer_mut(&PeerId::new("a")).is_some());
        assert!(table.writer_mut(&PeerId::new("missing")).is_none());
    }

    #[test]
    fn test_empty_table() {
        let table: NeighborTable<Vec<u8>> = NeighborTable::new();
        assert!(table.is_empty());
        assert!(table.ids().is_empty());
    }
}

//! Random graph synthesis
//!
//! The coordinator wires registered peers into a random simple undirected
//! graph over their dense indices: start from the complete graph, then
//! thin it by removing a uniformly chosen number of edges.

use rand::Rng;

/// An undirected edge between two dense peer indices, first < second.
pub type Edge = (usize, usize);

/// Synthesize the neighbor graph over `peer_count` dense indices.
///
/// Enumerates all pairs `(i, j)` with `i < j`, picks `k` uniformly in
/// `[1, |E| / 2]`, and removes `k` edges one at a time, each chosen
/// uniformly from the shrinking list. Removal is skipped entirely when the
/// upper bound is zero. At least half the complete graph always remains;
/// connectedness is not guaranteed.
pub fn synthesize(peer_count: usize) -> Vec<Edge> {
    let mut rng = rand::rng();

    let mut edges = Vec::new();
    for i in 0..peer_count {
        for j in (i + 1)..peer_count {
            edges.push((i, j));
        }
    }

    let max_removals = edges.len() / 2;
    if max_removals == 0 {
        return edges;
    }

    let removals = rng.random_range(1..=max_removals);
    for _ in 0..removals {
        let index = rng.random_range(0..edges.len());
        edges.remove(index);
    }

    edges
}

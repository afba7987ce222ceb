//! # bastion-hierarchy: Hierarchy graphs for `Bastion`
//!
//! A [`HierarchyGraph`] is a directed acyclic graph over named nodes. One
//! instance exists per [`GraphKind`](bastion_types::GraphKind): roles, admin
//! roles, user org units and permission org units.
//!
//! Edges are `(parent, child)` pairs. A node's *ascendants* are every node
//! reachable by following parent links; its *descendants* are every node
//! reachable through child links. Neither closure contains the node itself.
//!
//! # Concurrency
//!
//! Readers load the current [`Snapshot`] without locking. Writers take a
//! writer lock, build a new snapshot from the current one and publish it with
//! a single atomic swap, so readers see either the old graph or the new one.
//! Closures are computed lazily, once per snapshot, on first read.

mod graph;

#[cfg(test)]
mod tests;

pub use graph::{HierarchyGraph, NodeName, Snapshot};

/// Default bound on the length of any parent chain.
pub const DEFAULT_MAX_DEPTH: usize = 64;

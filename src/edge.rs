//! Edges and the append-only edge registry.
//!
//! All edges, original and shortcut, live in one registry addressed by
//! `EdgeId`. Shortcuts reference the two child edges they abbreviate, which
//! is what lets a query unpack a hierarchy path back to original edges.
//! Workers only produce `Edge` values; the contraction driver commits them
//! to the registry between levels, so id issuance stays serial.

use anyhow::{ensure, Result};

use crate::cost::Cost;
use crate::graph::NodeId;

/// Index into the [`EdgeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Original,
    /// Replaces the path `first` then `second` over a contracted node.
    Shortcut { first: EdgeId, second: EdgeId },
}

#[derive(Debug, Clone, Copy)]
pub struct Edge<const D: usize> {
    pub source: NodeId,
    pub dest: NodeId,
    pub cost: Cost<D>,
    pub kind: EdgeKind,
}

impl<const D: usize> Edge<D> {
    pub fn original(source: NodeId, dest: NodeId, cost: Cost<D>) -> Self {
        Edge {
            source,
            dest,
            cost,
            kind: EdgeKind::Original,
        }
    }
}

/// Process-wide edge storage. Append-only: ids handed out by
/// [`administer_edges`](EdgeRegistry::administer_edges) stay valid forever.
#[derive(Debug, Default)]
pub struct EdgeRegistry<const D: usize> {
    edges: Vec<Edge<D>>,
}

impl<const D: usize> EdgeRegistry<D> {
    pub fn new() -> Self {
        EdgeRegistry { edges: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Look up an edge. An unknown id is a programmer error and panics.
    pub fn get(&self, id: EdgeId) -> &Edge<D> {
        &self.edges[id.idx()]
    }

    /// Append a batch of edges and return their new ids.
    pub fn administer_edges(&mut self, new_edges: Vec<Edge<D>>) -> Vec<EdgeId> {
        let first = self.edges.len() as u32;
        let ids = (first..first + new_edges.len() as u32)
            .map(EdgeId)
            .collect();
        self.edges.extend(new_edges);
        ids
    }

    /// Every id currently in the registry, in issuance order.
    pub fn ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }
}

/// Combine two adjacent edges into a shortcut. The shortcut runs from
/// `first`'s source to `second`'s dest and costs their sum.
pub fn create_shortcut<const D: usize>(
    registry: &EdgeRegistry<D>,
    first: EdgeId,
    second: EdgeId,
) -> Result<Edge<D>> {
    let e1 = registry.get(first);
    let e2 = registry.get(second);
    ensure!(
        e1.dest == e2.source,
        "edges {} and {} are not connected",
        first.0,
        second.0
    );
    Ok(Edge {
        source: e1.source,
        dest: e2.dest,
        cost: e1.cost + e2.cost,
        kind: EdgeKind::Shortcut { first, second },
    })
}

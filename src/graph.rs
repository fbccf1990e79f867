//! Level-local routing graph with CSR adjacency.
//!
//! A `Graph` is a snapshot for one contraction level: a node array indexed
//! by `NodePos` plus in- and out-adjacency over a subset of the registry's
//! edges. Contraction produces a fresh, smaller `Graph` per level; nodes
//! keep their stable `NodeId` across levels while their `NodePos` changes.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use crate::cost::Cost;
use crate::dijkstra::NormalDijkstra;
use crate::edge::{EdgeId, EdgeRegistry};

/// Stable node identifier, valid across all levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Index into one graph's node array. Only meaningful for that graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePos(pub u32);

impl NodePos {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    /// Contraction depth; 0 until the node is contracted.
    pub level: u32,
}

impl Node {
    pub fn new(id: NodeId, lat: f64, lon: f64) -> Self {
        Node {
            id,
            lat,
            lon,
            level: 0,
        }
    }
}

/// One directed edge seen from one of its endpoints: `begin` is the node
/// whose adjacency list this entry sits in, `end` the node across the edge.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<const D: usize> {
    pub id: EdgeId,
    pub begin: NodePos,
    pub end: NodePos,
    pub cost: Cost<D>,
}

#[derive(Debug)]
pub struct Graph<const D: usize> {
    nodes: Vec<Node>,
    edge_ids: Vec<EdgeId>,
    positions: HashMap<NodeId, NodePos>,
    out_offsets: Vec<u32>,
    out_edges: Vec<HalfEdge<D>>,
    in_offsets: Vec<u32>,
    in_edges: Vec<HalfEdge<D>>,
}

impl<const D: usize> Graph<D> {
    /// Build adjacency for `nodes` over `edge_ids`. Every edge endpoint must
    /// be present in `nodes`; the contraction driver guarantees this by only
    /// keeping edges between surviving nodes.
    pub fn new(
        nodes: Vec<Node>,
        edge_ids: Vec<EdgeId>,
        registry: &EdgeRegistry<D>,
    ) -> Result<Self> {
        let mut positions = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if positions.insert(node.id, NodePos(i as u32)).is_some() {
                bail!("duplicate node id {}", node.id.0);
            }
        }

        let n = nodes.len();
        let mut resolved = Vec::with_capacity(edge_ids.len());
        let mut out_counts = vec![0u32; n];
        let mut in_counts = vec![0u32; n];
        for &id in &edge_ids {
            let edge = registry.get(id);
            let source = *positions
                .get(&edge.source)
                .with_context(|| format!("edge {} has unknown source {}", id.0, edge.source.0))?;
            let dest = *positions
                .get(&edge.dest)
                .with_context(|| format!("edge {} has unknown dest {}", id.0, edge.dest.0))?;
            out_counts[source.idx()] += 1;
            in_counts[dest.idx()] += 1;
            resolved.push((source, dest, id, edge.cost));
        }

        let out_offsets = prefix_sum(&out_counts);
        let in_offsets = prefix_sum(&in_counts);

        let placeholder = HalfEdge {
            id: EdgeId(0),
            begin: NodePos(0),
            end: NodePos(0),
            cost: Cost::zero(),
        };
        let mut out_edges = vec![placeholder; resolved.len()];
        let mut in_edges = vec![placeholder; resolved.len()];
        let mut out_cursor: Vec<u32> = out_offsets[..n].to_vec();
        let mut in_cursor: Vec<u32> = in_offsets[..n].to_vec();
        for &(source, dest, id, cost) in &resolved {
            out_edges[out_cursor[source.idx()] as usize] = HalfEdge {
                id,
                begin: source,
                end: dest,
                cost,
            };
            out_cursor[source.idx()] += 1;
            in_edges[in_cursor[dest.idx()] as usize] = HalfEdge {
                id,
                begin: dest,
                end: source,
                cost,
            };
            in_cursor[dest.idx()] += 1;
        }

        Ok(Graph {
            nodes,
            edge_ids,
            positions,
            out_offsets,
            out_edges,
            in_offsets,
            in_edges,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn node(&self, pos: NodePos) -> &Node {
        &self.nodes[pos.idx()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    pub fn position_of(&self, id: NodeId) -> Option<NodePos> {
        self.positions.get(&id).copied()
    }

    pub fn outgoing(&self, pos: NodePos) -> &[HalfEdge<D>] {
        let start = self.out_offsets[pos.idx()] as usize;
        let end = self.out_offsets[pos.idx() + 1] as usize;
        &self.out_edges[start..end]
    }

    pub fn ingoing(&self, pos: NodePos) -> &[HalfEdge<D>] {
        let start = self.in_offsets[pos.idx()] as usize;
        let end = self.in_offsets[pos.idx() + 1] as usize;
        &self.in_edges[start..end]
    }

    /// A fresh probe bound to this graph, with its own search buffers.
    pub fn normal_dijkstra(&self) -> NormalDijkstra<'_, D> {
        NormalDijkstra::new(self)
    }
}

fn prefix_sum(counts: &[u32]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut total = 0;
    for &c in counts {
        offsets.push(total);
        total += c;
    }
    offsets.push(total);
    offsets
}

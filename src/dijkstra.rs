//! Single-criterion Dijkstra used as the witness-search probe.
//!
//! Costs are scalarized with a weight vector before comparison. Besides the
//! best route the search reports how many co-optimal paths reach the target
//! (`path_count`), which the contractor uses to detect ambiguous optima.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cost::{Config, Cost};
use crate::edge::EdgeId;
use crate::graph::{Graph, NodePos};

/// Best route between two positions under one weight vector.
#[derive(Debug, Clone)]
pub struct RouteWithCount<const D: usize> {
    /// Edge ids from source to target.
    pub edges: Vec<EdgeId>,
    /// Multi-dimensional cost accumulated along `edges`.
    pub costs: Cost<D>,
    /// Number of paths tying the optimal scalarized cost (saturating).
    pub path_count: usize,
}

struct HeapEntry {
    dist: f64,
    node: NodePos,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap; ties broken by position for determinism.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.0.cmp(&self.node.0))
    }
}

/// Graph-bound search with reusable buffers. One instance per worker; the
/// buffers carry no state between calls beyond their allocation.
pub struct NormalDijkstra<'g, const D: usize> {
    graph: &'g Graph<D>,
    dist: Vec<f64>,
    costs: Vec<Cost<D>>,
    counts: Vec<usize>,
    prev: Vec<Option<(NodePos, EdgeId)>>,
    touched: Vec<NodePos>,
    heap: BinaryHeap<HeapEntry>,
}

impl<'g, const D: usize> NormalDijkstra<'g, D> {
    pub fn new(graph: &'g Graph<D>) -> Self {
        let n = graph.node_count();
        NormalDijkstra {
            graph,
            dist: vec![f64::INFINITY; n],
            costs: vec![Cost::zero(); n],
            counts: vec![0; n],
            prev: vec![None; n],
            touched: Vec::new(),
            heap: BinaryHeap::new(),
        }
    }

    fn clear(&mut self) {
        for pos in self.touched.drain(..) {
            self.dist[pos.idx()] = f64::INFINITY;
            self.counts[pos.idx()] = 0;
            self.prev[pos.idx()] = None;
        }
        self.heap.clear();
    }

    /// Best route from `from` to `to` under `config`, or `None` if `to` is
    /// unreachable. The search keeps settling nodes that tie the target's
    /// distance so the returned `path_count` covers every co-optimal path.
    pub fn find_best_route(
        &mut self,
        from: NodePos,
        to: NodePos,
        config: &Config<D>,
    ) -> Option<RouteWithCount<D>> {
        self.clear();
        self.dist[from.idx()] = 0.0;
        self.costs[from.idx()] = Cost::zero();
        self.counts[from.idx()] = 1;
        self.touched.push(from);
        self.heap.push(HeapEntry {
            dist: 0.0,
            node: from,
        });

        let mut best = None;
        while let Some(HeapEntry { dist, node }) = self.heap.pop() {
            if let Some(b) = best {
                if dist > b {
                    break;
                }
            }
            if dist > self.dist[node.idx()] {
                continue;
            }
            if node == to {
                best = Some(dist);
                continue;
            }
            for half_edge in self.graph.outgoing(node) {
                let next = half_edge.end;
                let next_dist = dist + half_edge.cost.dot(config);
                let known = self.dist[next.idx()];
                if next_dist < known {
                    if known.is_infinite() {
                        self.touched.push(next);
                    }
                    self.dist[next.idx()] = next_dist;
                    self.costs[next.idx()] = self.costs[node.idx()] + half_edge.cost;
                    self.counts[next.idx()] = self.counts[node.idx()];
                    self.prev[next.idx()] = Some((node, half_edge.id));
                    self.heap.push(HeapEntry {
                        dist: next_dist,
                        node: next,
                    });
                } else if next_dist == known {
                    self.counts[next.idx()] =
                        self.counts[next.idx()].saturating_add(self.counts[node.idx()]);
                }
            }
        }

        best?;
        let mut edges = Vec::new();
        let mut node = to;
        while node != from {
            let (parent, edge) = self.prev[node.idx()]?;
            edges.push(edge);
            node = parent;
        }
        edges.reverse();
        Some(RouteWithCount {
            edges,
            costs: self.costs[to.idx()],
            path_count: self.counts[to.idx()],
        })
    }
}

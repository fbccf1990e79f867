//! Multi-criteria contraction hierarchy construction.
//!
//! Each level picks an independent set of cheap-looking nodes, removes them,
//! and asks a worker pool whether every in/out edge pair around a removed
//! node needs a shortcut (see [`worker`]). Levels repeat until only a small
//! fraction of the input survives; the finished hierarchy is the union of
//! all contracted nodes and every edge ever registered.

pub mod lp;
pub mod queue;
pub mod stats;
pub mod worker;

use std::collections::BTreeSet;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::edge::{Edge, EdgeId, EdgeRegistry};
use crate::graph::{Graph, Node, NodePos};
use self::queue::WorkQueue;
use self::stats::StatsCollector;
use self::worker::{ContractionWorker, EdgePair};

/// Pairs per enumeration batch, scaled by the worker count below.
const BATCH_PER_THREAD: usize = 30;

pub struct Contractor<const D: usize> {
    print_statistics: bool,
    thread_count: usize,
    level: u32,
    contracted_nodes: Vec<Node>,
    contracted_edges: Vec<EdgeId>,
}

impl<const D: usize> Contractor<D> {
    /// Contractor using all available hardware threads.
    pub fn new(print_statistics: bool) -> Self {
        let threads = thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_threads(print_statistics, threads)
    }

    pub fn with_threads(print_statistics: bool, max_threads: usize) -> Self {
        Contractor {
            print_statistics,
            thread_count: max_threads.max(1),
            level: 0,
            contracted_nodes: Vec::new(),
            contracted_edges: Vec::new(),
        }
    }

    /// Run one contraction level: select nodes, decide shortcuts, and build
    /// the graph the next level works on. Removed nodes are remembered with
    /// the level they were contracted at.
    pub fn contract(&mut self, registry: &mut EdgeRegistry<D>, graph: &Graph<D>) -> Result<Graph<D>> {
        let start = Instant::now();
        self.level += 1;

        let selected = reduce(independent_set(graph), graph);

        let mut nodes = Vec::with_capacity(graph.node_count() - selected.len());
        let mut edges: Vec<EdgeId> = Vec::new();
        let mut nodes_to_contract = Vec::with_capacity(selected.len());
        for i in 0..graph.node_count() {
            let pos = NodePos(i as u32);
            if !selected.contains(&pos) {
                nodes.push(*graph.node(pos));
                for half_edge in graph.outgoing(pos) {
                    if !selected.contains(&half_edge.end) {
                        edges.push(half_edge.id);
                    }
                }
            } else {
                nodes_to_contract.push(pos);
                let mut node = *graph.node(pos);
                node.level = self.level;
                self.contracted_nodes.push(node);
                for half_edge in graph.outgoing(pos) {
                    self.contracted_edges.push(half_edge.id);
                }
                for half_edge in graph.ingoing(pos) {
                    self.contracted_edges.push(half_edge.id);
                }
            }
        }

        let mut shortcuts =
            self.run_workers(registry, graph, &selected, &nodes_to_contract)?;

        shortcuts.sort_unstable_by(|left, right| {
            left.source
                .cmp(&right.source)
                .then(left.dest.cmp(&right.dest))
                .then_with(|| {
                    for i in 0..D {
                        let ord = left.cost.0[i].total_cmp(&right.cost.0[i]);
                        if ord.is_ne() {
                            return ord;
                        }
                    }
                    std::cmp::Ordering::Equal
                })
        });
        let found = shortcuts.len();
        shortcuts.dedup_by(|a, b| {
            a.source == b.source && a.dest == b.dest && a.cost.approx_eq(&b.cost)
        });
        println!("...Erasing {} duplicate shortcuts.", found - shortcuts.len());
        println!("...Created {} shortcuts.", shortcuts.len());

        edges.extend(registry.administer_edges(shortcuts));

        println!(
            "...Last contraction step took {}s",
            start.elapsed().as_secs()
        );
        Graph::new(nodes, edges, registry)
    }

    /// Contract level by level until at most `rest` percent of the input
    /// nodes survive, then merge everything back into one hierarchical
    /// graph carrying all original and shortcut edges.
    pub fn contract_completely(
        &mut self,
        registry: &mut EdgeRegistry<D>,
        graph: &Graph<D>,
        rest: f64,
    ) -> Result<Graph<D>> {
        let initial_nodes = graph.node_count();
        let mut current = self.contract(registry, graph)?;
        let mut percent = uncontracted_percent(current.node_count(), initial_nodes);
        println!(
            "{}% of the graph is contracted ({} nodes left)",
            100.0 - percent,
            current.node_count()
        );

        while percent > rest {
            let next = self.contract(registry, &current)?;
            if next.node_count() == current.node_count() {
                println!("...no node was contracted in the last level, stopping early");
                current = next;
                break;
            }
            current = next;
            println!(
                "...total number of edges: {}",
                current.edge_count() + self.contracted_edges.len()
            );
            percent = uncontracted_percent(current.node_count(), initial_nodes);
            println!(
                "{}% of the graph is contracted ({} nodes left)",
                100.0 - percent,
                current.node_count()
            );
        }

        self.merge_with_contracted(registry, &current)
    }

    fn run_workers(
        &self,
        registry: &EdgeRegistry<D>,
        graph: &Graph<D>,
        selected: &BTreeSet<NodePos>,
        nodes_to_contract: &[NodePos],
    ) -> Result<Vec<Edge<D>>> {
        let batch_size = self.thread_count * BATCH_PER_THREAD;
        let (mut work_queue, receiver) = WorkQueue::bounded(batch_size * 4);
        let print_statistics = self.print_statistics;

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.thread_count)
                .map(|_| {
                    let receiver = receiver.clone();
                    let worker = ContractionWorker::new(graph, registry, selected, print_statistics);
                    scope.spawn(move || worker.run(receiver))
                })
                .collect();
            drop(receiver);

            let mut pair_count = 0usize;
            let mut batch = Vec::with_capacity(batch_size);
            let mut send_error = None;
            'enumerate: for &pos in nodes_to_contract {
                for in_edge in graph.ingoing(pos) {
                    for out_edge in graph.outgoing(pos) {
                        if in_edge.end == out_edge.end {
                            continue;
                        }
                        if in_edge.begin != out_edge.begin {
                            send_error =
                                Some(anyhow!("enumerated edge pair does not meet at its node"));
                            break 'enumerate;
                        }
                        batch.push(EdgePair {
                            in_edge: *in_edge,
                            out_edge: *out_edge,
                        });
                        pair_count += 1;
                        if batch.len() >= batch_size {
                            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                            if let Err(e) = work_queue.send(full) {
                                send_error = Some(e);
                                break 'enumerate;
                            }
                        }
                    }
                }
            }
            if send_error.is_none() {
                if let Err(e) = work_queue.send(batch) {
                    send_error = Some(e);
                }
            }
            work_queue.close();

            if print_statistics {
                println!("...{} edge pairs to contract", pair_count);
                StatsCollector::print_header();
            }

            let mut shortcuts = Vec::new();
            let mut worker_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(worker_shortcuts)) => shortcuts.extend(worker_shortcuts),
                    Ok(Err(e)) => worker_error = worker_error.or(Some(e)),
                    Err(_) => {
                        worker_error =
                            worker_error.or_else(|| Some(anyhow!("contraction worker panicked")))
                    }
                }
            }
            if let Some(e) = worker_error {
                return Err(e);
            }
            if let Some(e) = send_error {
                return Err(e);
            }
            Ok(shortcuts)
        })
    }

    /// Put the contracted nodes back in front of the survivors (which get
    /// one final level) and expose every edge the registry knows about.
    fn merge_with_contracted(
        &mut self,
        registry: &EdgeRegistry<D>,
        graph: &Graph<D>,
    ) -> Result<Graph<D>> {
        let mut nodes = std::mem::take(&mut self.contracted_nodes);
        nodes.reserve(graph.node_count());
        self.level += 1;
        for node in graph.nodes() {
            let mut node = *node;
            node.level = self.level;
            nodes.push(node);
        }
        self.contracted_edges.clear();

        let edges: Vec<EdgeId> = registry.ids().collect();
        println!(
            "Final graph has {} nodes and {} edges.",
            nodes.len(),
            edges.len()
        );
        Graph::new(nodes, edges, registry)
    }
}

fn uncontracted_percent(remaining: usize, initial: usize) -> f64 {
    if initial == 0 {
        return 0.0;
    }
    (remaining as f64 * 10000.0 / initial as f64).round() / 100.0
}

fn degree_product<const D: usize>(graph: &Graph<D>, pos: NodePos) -> usize {
    graph.ingoing(pos).len() * graph.outgoing(pos).len()
}

/// Greedy independent set, cheapest degree product first. No two selected
/// nodes share an edge, so their contractions cannot interfere.
fn independent_set<const D: usize>(graph: &Graph<D>) -> BTreeSet<NodePos> {
    let node_count = graph.node_count();
    let mut scored: Vec<(usize, NodePos)> = (0..node_count as u32)
        .into_par_iter()
        .map(|i| {
            let pos = NodePos(i);
            (degree_product(graph, pos), pos)
        })
        .collect();
    scored.sort_unstable();

    let mut selectable = vec![true; node_count];
    let mut selected = BTreeSet::new();
    for &(_, pos) in &scored {
        if !selectable[pos.idx()] {
            continue;
        }
        for half_edge in graph.ingoing(pos) {
            selectable[half_edge.end.idx()] = false;
        }
        for half_edge in graph.outgoing(pos) {
            selectable[half_edge.end.idx()] = false;
        }
        selected.insert(pos);
    }
    println!("...calculated greedy independent set of {}", selected.len());
    selected
}

/// Keep only the cheapest quarter of the selected nodes. Contracting just
/// the low-degree part of the set keeps the shortcut blowup per level small.
fn reduce<const D: usize>(selected: BTreeSet<NodePos>, graph: &Graph<D>) -> BTreeSet<NodePos> {
    let mut metric: Vec<(usize, NodePos)> = selected
        .into_iter()
        .map(|pos| (degree_product(graph, pos), pos))
        .collect();

    let divider = 4;
    let keep = if metric.len() < divider {
        metric.len()
    } else {
        metric.len() / divider
    };
    if keep < metric.len() {
        metric.select_nth_unstable(keep);
        metric.truncate(keep);
    }

    let reduced: BTreeSet<NodePos> = metric.into_iter().map(|(_, pos)| pos).collect();
    println!("...reduced greedy independent set to {}", reduced.len());
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Cost;
    use crate::graph::NodeId;

    fn line_graph(n: u32) -> (Graph<2>, EdgeRegistry<2>) {
        let mut registry = EdgeRegistry::new();
        let edges = (0..n - 1)
            .map(|i| Edge::original(NodeId(i), NodeId(i + 1), Cost([1.0, 1.0])))
            .collect();
        let ids = registry.administer_edges(edges);
        let nodes = (0..n).map(|i| Node::new(NodeId(i), 0.0, 0.0)).collect();
        let graph = Graph::new(nodes, ids, &registry).unwrap();
        (graph, registry)
    }

    #[test]
    fn independent_set_has_no_internal_edges() {
        let (graph, _registry) = line_graph(12);
        let selected = independent_set(&graph);
        assert!(!selected.is_empty());
        for &pos in &selected {
            for half_edge in graph.outgoing(pos) {
                assert!(!selected.contains(&half_edge.end));
            }
            for half_edge in graph.ingoing(pos) {
                assert!(!selected.contains(&half_edge.end));
            }
        }
    }

    #[test]
    fn reduce_keeps_the_cheap_quarter() {
        let (graph, _registry) = line_graph(40);
        let selected = independent_set(&graph);
        let size = selected.len();
        let reduced = reduce(selected, &graph);
        if size >= 4 {
            assert_eq!(reduced.len(), size / 4);
        } else {
            assert_eq!(reduced.len(), size);
        }
    }

    #[test]
    fn reduce_keeps_tiny_sets_whole() {
        let (graph, _registry) = line_graph(4);
        let selected: BTreeSet<NodePos> = [NodePos(0), NodePos(2)].into();
        let reduced = reduce(selected.clone(), &graph);
        assert_eq!(reduced, selected);
    }

    #[test]
    fn contracting_a_line_produces_bridging_shortcuts() {
        let (graph, mut registry) = line_graph(5);
        let mut contractor: Contractor<2> = Contractor::with_threads(false, 2);
        let next = contractor.contract(&mut registry, &graph).unwrap();

        // Some nodes were removed and every removed node got this level.
        assert!(next.node_count() < graph.node_count());
        assert!(contractor
            .contracted_nodes
            .iter()
            .all(|node| node.level == 1));

        // The ends and the middle go first on this line; nodes 1 and 3
        // survive and the shortcut over node 2 keeps them connected.
        let start = next.position_of(NodeId(1)).unwrap();
        let goal = next.position_of(NodeId(3)).unwrap();
        let mut dijkstra = next.normal_dijkstra();
        let route = dijkstra
            .find_best_route(start, goal, &crate::cost::Config::uniform())
            .unwrap();
        assert_eq!(route.costs, Cost([2.0, 2.0]));
    }

    #[test]
    fn contracting_an_empty_graph_is_a_no_op() {
        let mut registry: EdgeRegistry<2> = EdgeRegistry::new();
        let graph = Graph::new(Vec::new(), Vec::new(), &registry).unwrap();
        let mut contractor: Contractor<2> = Contractor::with_threads(false, 1);
        let next = contractor.contract(&mut registry, &graph).unwrap();
        assert_eq!(next.node_count(), 0);
        assert_eq!(next.edge_count(), 0);
    }
}

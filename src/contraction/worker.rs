//! Witness search: decides per edge pair whether a shortcut is necessary.
//!
//! For a pair `(in, out)` meeting at the node being contracted, the worker
//! alternates Dijkstra probes with LP solves. A probe under the current
//! weight vector either proves the two-edge path optimal (shortcut), finds
//! a witness that Pareto-dominates it (no shortcut), or yields a witness
//! that merely wins under these weights. In the last case the witness
//! becomes an LP constraint and the LP proposes new weights under which no
//! known witness beats the shortcut. A repeated proposal means the weight
//! region has collapsed; the conservative call is to keep the shortcut.

use std::collections::BTreeSet;

use anyhow::{bail, Result};

use super::lp::ContractionLp;
use super::queue::QueueReceiver;
use super::stats::{ShortcutReason, StatsCollector};
use crate::cost::{Config, Cost, COST_ACCURACY};
use crate::dijkstra::{NormalDijkstra, RouteWithCount};
use crate::edge::{create_shortcut, Edge, EdgeRegistry};
use crate::graph::{Graph, HalfEdge, NodePos};

/// How many pairs a worker pulls from the queue at once.
const RECEIVE_BATCH: usize = 20;

/// An in/out edge pair around one contraction candidate.
#[derive(Debug, Clone, Copy)]
pub struct EdgePair<const D: usize> {
    pub in_edge: HalfEdge<D>,
    pub out_edge: HalfEdge<D>,
}

/// Probe whether the two-edge path through the contracted node is optimal
/// under `config`. The comparison is on the accumulated cost vectors, which
/// match bit-for-bit when the probe walks exactly those two edges.
fn probe_shortest_path<const D: usize>(
    dijkstra: &mut NormalDijkstra<'_, D>,
    in_edge: &HalfEdge<D>,
    out_edge: &HalfEdge<D>,
    config: &Config<D>,
) -> (bool, Option<RouteWithCount<D>>) {
    let Some(route) = dijkstra.find_best_route(in_edge.end, out_edge.end, config) else {
        return (false, None);
    };
    let shortcut_cost = in_edge.cost + out_edge.cost;
    let is_shortest = route.costs == shortcut_cost;
    (is_shortest, Some(route))
}

enum TestOutcome<const D: usize> {
    /// The pair is decided (shortcut stored, witnessed, or dominated).
    Finished,
    /// A witness won under these weights; its cost joined the constraints.
    Open(Cost<D>),
}

pub struct ContractionWorker<'g, const D: usize> {
    graph: &'g Graph<D>,
    registry: &'g EdgeRegistry<D>,
    selected: &'g BTreeSet<NodePos>,
    dijkstra: NormalDijkstra<'g, D>,
    lp: ContractionLp<D>,
    pub(crate) stats: StatsCollector,
    shortcuts: Vec<Edge<D>>,
    constraints: Vec<Cost<D>>,
    lp_count: usize,
    last_ends: Option<(NodePos, NodePos)>,
}

impl<'g, const D: usize> ContractionWorker<'g, D> {
    pub fn new(
        graph: &'g Graph<D>,
        registry: &'g EdgeRegistry<D>,
        selected: &'g BTreeSet<NodePos>,
        print_statistics: bool,
    ) -> Self {
        ContractionWorker {
            graph,
            registry,
            selected,
            dijkstra: graph.normal_dijkstra(),
            lp: ContractionLp::new(),
            stats: StatsCollector::new(print_statistics),
            shortcuts: Vec::new(),
            constraints: Vec::new(),
            lp_count: 0,
            last_ends: None,
        }
    }

    /// Drain the queue until it closes, then hand back the shortcuts.
    pub fn run(mut self, receiver: QueueReceiver<EdgePair<D>>) -> Result<Vec<Edge<D>>> {
        let mut batch = Vec::with_capacity(RECEIVE_BATCH);
        loop {
            batch.clear();
            if receiver.receive_some(&mut batch, RECEIVE_BATCH) == 0 {
                return Ok(self.shortcuts);
            }
            for pair in batch.drain(..) {
                self.process_pair(&pair)?;
            }
        }
    }

    pub fn process_pair(&mut self, pair: &EdgePair<D>) -> Result<()> {
        let in_edge = pair.in_edge;
        let out_edge = pair.out_edge;
        if in_edge.begin != out_edge.begin {
            bail!("edge pair does not meet at the contracted node");
        }
        if self.registry.get(in_edge.id).dest != self.registry.get(out_edge.id).source {
            bail!("edge pair is not connected in the registry");
        }

        // Consecutive pairs with the same endpoints keep their witness
        // costs; the constraint set is still valid for the new pair.
        let warm = self.last_ends == Some((in_edge.end, out_edge.end));
        if !warm {
            self.constraints.clear();
        }
        self.last_ends = Some((in_edge.end, out_edge.end));

        let shortcut_cost = in_edge.cost + out_edge.cost;
        self.lp_count = 0;

        if !warm {
            for i in 0..D {
                let outcome = self.test_config(&in_edge, &out_edge, shortcut_cost, &Config::axis(i))?;
                if matches!(outcome, TestOutcome::Finished) {
                    return Ok(());
                }
            }
        }

        let mut config = Config::uniform();
        loop {
            let current_cost = match self.test_config(&in_edge, &out_edge, shortcut_cost, &config)? {
                TestOutcome::Finished => return Ok(()),
                TestOutcome::Open(cost) => cost,
            };

            self.constraints
                .sort_unstable_by(|a, b| cmp_costs(a, b));
            self.constraints.dedup();
            for &c in &self.constraints {
                self.lp.add_constraint((c - shortcut_cost).0);
            }

            self.lp_count += 1;
            if !self.lp.solve() {
                self.stats
                    .record_max_values(self.lp_count, self.constraints.len());
                return Ok(());
            }

            let new_config = Config(self.lp.variable_values());
            if new_config == config {
                let reason = if current_cost.dot(&config)
                    >= shortcut_cost.dot(&config) - COST_ACCURACY
                {
                    ShortcutReason::RepeatingConfig
                } else {
                    ShortcutReason::UnknownReason
                };
                self.store_shortcut(&in_edge, &out_edge, reason)?;
                return Ok(());
            }
            config = new_config;
        }
    }

    fn test_config(
        &mut self,
        in_edge: &HalfEdge<D>,
        out_edge: &HalfEdge<D>,
        shortcut_cost: Cost<D>,
        config: &Config<D>,
    ) -> Result<TestOutcome<D>> {
        let (is_shortest, route) =
            probe_shortest_path(&mut self.dijkstra, in_edge, out_edge, config);
        let Some(route) = route else {
            self.stats
                .record_max_values(self.lp_count, self.constraints.len());
            return Ok(TestOutcome::Finished);
        };
        if route.edges.is_empty() {
            self.stats
                .record_max_values(self.lp_count, self.constraints.len());
            return Ok(TestOutcome::Finished);
        }

        let current_cost = route.costs;
        self.constraints.push(current_cost);

        if is_shortest {
            if route.path_count == 1 || self.route_touches_selected(&route, in_edge.begin) {
                self.store_shortcut(in_edge, out_edge, ShortcutReason::ShortestPath)?;
            }
            return Ok(TestOutcome::Finished);
        }

        if current_cost.dominates(&shortcut_cost) {
            return Ok(TestOutcome::Finished);
        }
        Ok(TestOutcome::Open(current_cost))
    }

    /// True when the route runs through a selected node other than the one
    /// being contracted here. That node disappears in this level too, so
    /// the witness it provides will not survive.
    fn route_touches_selected(&self, route: &RouteWithCount<D>, contracted: NodePos) -> bool {
        route.edges.iter().any(|&id| {
            let dest = self.registry.get(id).dest;
            match self.graph.position_of(dest) {
                Some(pos) => pos != contracted && self.selected.contains(&pos),
                None => false,
            }
        })
    }

    fn store_shortcut(
        &mut self,
        in_edge: &HalfEdge<D>,
        out_edge: &HalfEdge<D>,
        reason: ShortcutReason,
    ) -> Result<()> {
        self.stats.count_shortcut(reason);
        self.stats
            .record_max_values(self.lp_count, self.constraints.len());
        let shortcut = create_shortcut(self.registry, in_edge.id, out_edge.id)?;
        self.shortcuts.push(shortcut);
        Ok(())
    }

    #[cfg(test)]
    fn shortcuts(&self) -> &[Edge<D>] {
        &self.shortcuts
    }
}

fn cmp_costs<const D: usize>(a: &Cost<D>, b: &Cost<D>) -> std::cmp::Ordering {
    for i in 0..D {
        let ord = a.0[i].total_cmp(&b.0[i]);
        if ord.is_ne() {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{EdgeId, EdgeKind};
    use crate::graph::{Node, NodeId};

    fn build(edges: &[(u32, u32, [f64; 2])], node_count: u32) -> (Graph<2>, EdgeRegistry<2>) {
        let mut registry = EdgeRegistry::new();
        let ids = registry.administer_edges(
            edges
                .iter()
                .map(|&(s, d, c)| Edge::original(NodeId(s), NodeId(d), Cost(c)))
                .collect(),
        );
        let nodes = (0..node_count).map(|i| Node::new(NodeId(i), 0.0, 0.0)).collect();
        let graph = Graph::new(nodes, ids, &registry).unwrap();
        (graph, registry)
    }

    fn pairs_around(graph: &Graph<2>, pos: NodePos) -> Vec<EdgePair<2>> {
        let mut pairs = Vec::new();
        for in_edge in graph.ingoing(pos) {
            for out_edge in graph.outgoing(pos) {
                if in_edge.end == out_edge.end {
                    continue;
                }
                pairs.push(EdgePair {
                    in_edge: *in_edge,
                    out_edge: *out_edge,
                });
            }
        }
        pairs
    }

    #[test]
    fn lone_path_needs_a_shortcut() {
        // 0 -> 1 -> 2, contract node 1.
        let (graph, registry) = build(&[(0, 1, [1.0, 1.0]), (1, 2, [1.0, 1.0])], 3);
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(1)) {
            worker.process_pair(&pair).unwrap();
        }

        assert_eq!(worker.shortcuts().len(), 1);
        let shortcut = worker.shortcuts()[0];
        assert_eq!(shortcut.source, NodeId(0));
        assert_eq!(shortcut.dest, NodeId(2));
        assert_eq!(shortcut.cost, Cost([2.0, 2.0]));
        assert_eq!(
            shortcut.kind,
            EdgeKind::Shortcut {
                first: EdgeId(0),
                second: EdgeId(1)
            }
        );
        let (short, same, unknown) = worker.stats.counts();
        assert_eq!((short, same, unknown), (1, 0, 0));
    }

    #[test]
    fn tied_witness_through_kept_nodes_suppresses_the_shortcut() {
        // 0 -> 1 -> 2 plus the equal-cost detour 0 -> 3 -> 2; node 3 stays.
        let (graph, registry) = build(
            &[
                (0, 1, [1.0, 1.0]),
                (1, 2, [1.0, 1.0]),
                (0, 3, [1.0, 1.0]),
                (3, 2, [1.0, 1.0]),
            ],
            4,
        );
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(1)) {
            worker.process_pair(&pair).unwrap();
        }
        assert!(worker.shortcuts().is_empty());
    }

    #[test]
    fn dominated_pair_yields_nothing() {
        // The detour 0 -> 3 -> 2 beats the two-edge path on both dimensions.
        let (graph, registry) = build(
            &[
                (0, 1, [1.0, 1.0]),
                (1, 2, [1.0, 1.0]),
                (0, 3, [0.5, 0.5]),
                (3, 2, [0.5, 0.5]),
            ],
            4,
        );
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(1)) {
            worker.process_pair(&pair).unwrap();
        }
        assert!(worker.shortcuts().is_empty());
    }

    #[test]
    fn tied_witness_through_another_selected_node_keeps_the_shortcut() {
        // Contract node 3; the equal-cost detour runs through node 1,
        // which is selected as well. Its edges die in this level, so the
        // witness it provides does not survive and the shortcut stays.
        let (graph, registry) = build(
            &[
                (0, 3, [1.0, 1.0]),
                (3, 2, [1.0, 1.0]),
                (0, 1, [1.0, 1.0]),
                (1, 2, [1.0, 1.0]),
            ],
            4,
        );
        let selected: BTreeSet<NodePos> = [NodePos(1), NodePos(3)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(3)) {
            worker.process_pair(&pair).unwrap();
        }
        assert_eq!(worker.shortcuts().len(), 1);
        assert_eq!(worker.shortcuts()[0].cost, Cost([2.0, 2.0]));
        let (short, _, _) = worker.stats.counts();
        assert_eq!(short, 1);
    }

    #[test]
    fn axis_winning_witnesses_force_the_lp_fixed_point() {
        // Witnesses (3,0) and (0,3) each beat the shortcut (2,2) on one
        // axis but neither dominates it. The LP collapses to its maximin
        // weights and the shortcut is kept.
        let (graph, registry) = build(
            &[
                (0, 1, [2.0, 0.0]),
                (1, 2, [0.0, 2.0]),
                (0, 2, [3.0, 0.0]),
                (0, 2, [0.0, 3.0]),
            ],
            3,
        );
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(1)) {
            worker.process_pair(&pair).unwrap();
        }

        assert_eq!(worker.shortcuts().len(), 1);
        assert_eq!(worker.shortcuts()[0].cost, Cost([2.0, 2.0]));
        let (short, same, unknown) = worker.stats.counts();
        assert_eq!(short, 0);
        assert_eq!(same + unknown, 1);
    }

    #[test]
    fn warm_start_reuses_witnesses_for_parallel_in_edges() {
        // Two parallel edges 0 -> 1; the cheap one witnesses the pair built
        // from the expensive one, via the constraints kept across pairs.
        let (graph, registry) = build(
            &[
                (0, 1, [1.0, 1.0]),
                (0, 1, [5.0, 5.0]),
                (1, 2, [1.0, 1.0]),
            ],
            3,
        );
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        for pair in pairs_around(&graph, NodePos(1)) {
            worker.process_pair(&pair).unwrap();
        }

        // Only the cheap pair produces a shortcut; the expensive one is
        // dominated by the route over the cheap parallel edge.
        assert_eq!(worker.shortcuts().len(), 1);
        assert_eq!(worker.shortcuts()[0].cost, Cost([2.0, 2.0]));
    }

    #[test]
    fn mismatched_pair_fails_the_level() {
        let (graph, registry) = build(&[(0, 1, [1.0, 1.0]), (1, 2, [1.0, 1.0])], 3);
        let selected: BTreeSet<NodePos> = [NodePos(1)].into();
        let mut worker = ContractionWorker::new(&graph, &registry, &selected, false);

        let in_edge = graph.ingoing(NodePos(1))[0];
        let mut out_edge = graph.outgoing(NodePos(1))[0];
        out_edge.begin = NodePos(2);
        let pair = EdgePair { in_edge, out_edge };
        assert!(worker.process_pair(&pair).is_err());
    }
}

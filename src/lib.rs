//! Multi-criteria contraction hierarchies.
//!
//! Preprocesses a routing graph whose edges carry a `D`-dimensional cost
//! vector (e.g. distance, travel time, ascent for bicycle routing) into a
//! hierarchy: nodes are removed level by level and replaced by shortcut
//! edges that preserve every Pareto-optimal path under all non-negative
//! linear combinations of the cost dimensions.
//!
//! The interesting part is deciding, per candidate edge pair, whether a
//! shortcut is necessary: a cutting-plane loop alternates single-criterion
//! Dijkstra probes with a small LP that proposes new scalarization weights
//! until the pair is proven witnessed, dominated, or in need of a shortcut.
//! See [`contraction`] for the contractor and [`contraction::worker`] for
//! that loop.
//!
//! ```no_run
//! use pareto_ch::{formats, Contractor};
//! # fn main() -> anyhow::Result<()> {
//! let (graph, mut registry) = formats::read_graph::<3>("input.graph".as_ref())?;
//! let mut contractor = Contractor::new(false);
//! let hierarchy = contractor.contract_completely(&mut registry, &graph, 2.0)?;
//! formats::write_graph("hierarchy.graph".as_ref(), &hierarchy, &registry)?;
//! # Ok(())
//! # }
//! ```

pub mod contraction;
pub mod cost;
pub mod dijkstra;
pub mod edge;
pub mod formats;
pub mod graph;

pub use contraction::Contractor;
pub use cost::{Config, Cost, COST_ACCURACY};
pub use dijkstra::{NormalDijkstra, RouteWithCount};
pub use edge::{create_shortcut, Edge, EdgeId, EdgeKind, EdgeRegistry};
pub use graph::{Graph, HalfEdge, Node, NodeId, NodePos};

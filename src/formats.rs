//! Plain-text graph files.
//!
//! Layout, after any number of `#` comment lines:
//!
//! ```text
//! <cost dimension>
//! <node count>
//! <edge count>
//! id lat lon level                                  (one line per node)
//! source dest c_0 .. c_{D-1} first second           (one line per edge)
//! ```
//!
//! `first`/`second` are the child edge ids of a shortcut, or `-1 -1` for an
//! original edge. The writer emits every edge the registry holds, so a
//! finished hierarchy round-trips with its shortcuts intact.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cost::Cost;
use crate::edge::{Edge, EdgeId, EdgeKind, EdgeRegistry};
use crate::graph::{Graph, Node, NodeId};

pub fn read_graph<const D: usize>(path: &Path) -> Result<(Graph<D>, EdgeRegistry<D>)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading graph file {}", path.display()))?;
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let dim: usize = parse_line(&mut lines, "cost dimension")?;
    if dim != D {
        bail!("graph file has cost dimension {dim}, this build expects {D}");
    }
    let node_count: usize = parse_line(&mut lines, "node count")?;
    let edge_count: usize = parse_line(&mut lines, "edge count")?;

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let line = next_line(&mut lines, "node line")?;
        let mut fields = line.split_whitespace();
        let id: u32 = parse_field(&mut fields, line, "node id")?;
        let lat: f64 = parse_field(&mut fields, line, "latitude")?;
        let lon: f64 = parse_field(&mut fields, line, "longitude")?;
        let level: u32 = parse_field(&mut fields, line, "level")?;
        nodes.push(Node {
            id: NodeId(id),
            lat,
            lon,
            level,
        });
    }

    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let line = next_line(&mut lines, "edge line")?;
        let mut fields = line.split_whitespace();
        let source: u32 = parse_field(&mut fields, line, "edge source")?;
        let dest: u32 = parse_field(&mut fields, line, "edge dest")?;
        let mut cost = [0.0; D];
        for value in cost.iter_mut() {
            *value = parse_field(&mut fields, line, "cost component")?;
        }
        let first: i64 = parse_field(&mut fields, line, "first child")?;
        let second: i64 = parse_field(&mut fields, line, "second child")?;
        let kind = match (first, second) {
            (-1, -1) => EdgeKind::Original,
            (first, second) if first >= 0 && second >= 0 => {
                if first as usize >= edge_count || second as usize >= edge_count {
                    bail!("shortcut children out of range in line '{line}'");
                }
                EdgeKind::Shortcut {
                    first: EdgeId(first as u32),
                    second: EdgeId(second as u32),
                }
            }
            _ => bail!("malformed shortcut children in line '{line}'"),
        };
        edges.push(Edge {
            source: NodeId(source),
            dest: NodeId(dest),
            cost: Cost(cost),
            kind,
        });
    }

    let mut registry = EdgeRegistry::new();
    let ids = registry.administer_edges(edges);
    let graph = Graph::new(nodes, ids, &registry)?;
    Ok((graph, registry))
}

pub fn write_graph<const D: usize>(
    path: &Path,
    graph: &Graph<D>,
    registry: &EdgeRegistry<D>,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating graph file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# contraction hierarchy graph")?;
    writeln!(writer, "{D}")?;
    writeln!(writer, "{}", graph.node_count())?;
    writeln!(writer, "{}", registry.len())?;
    for node in graph.nodes() {
        writeln!(writer, "{} {} {} {}", node.id.0, node.lat, node.lon, node.level)?;
    }
    for id in registry.ids() {
        let edge = registry.get(id);
        write!(writer, "{} {}", edge.source.0, edge.dest.0)?;
        for value in edge.cost.0 {
            write!(writer, " {value}")?;
        }
        match edge.kind {
            EdgeKind::Original => writeln!(writer, " -1 -1")?,
            EdgeKind::Shortcut { first, second } => writeln!(writer, " {} {}", first.0, second.0)?,
        }
    }
    writer.flush()?;
    Ok(())
}

fn next_line<'a>(lines: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str> {
    lines
        .next()
        .with_context(|| format!("graph file ended early, expected {what}"))
}

fn parse_line<'a, T: std::str::FromStr>(
    lines: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<T> {
    let line = next_line(lines, what)?;
    line.parse()
        .ok()
        .with_context(|| format!("cannot parse {what} from '{line}'"))
}

fn parse_field<'a, T: std::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    line: &str,
    what: &str,
) -> Result<T> {
    let field = fields
        .next()
        .with_context(|| format!("missing {what} in line '{line}'"))?;
    field
        .parse()
        .ok()
        .with_context(|| format!("cannot parse {what} from '{field}'"))
}

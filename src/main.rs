//! CLI for building a multi-criteria contraction hierarchy.
//!
//! Reads a plain-text graph, contracts it until only `--rest` percent of
//! the nodes remain uncontracted, and writes the merged hierarchy back out.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use pareto_ch::{formats, Contractor};

/// Cost dimensions of the bundled binary: distance, travel time, ascent.
const DIM: usize = 3;

#[derive(Parser)]
#[command(name = "pareto-ch")]
#[command(about = "Build a multi-criteria contraction hierarchy from a routing graph")]
struct Cli {
    /// Input graph file
    input: PathBuf,

    /// Output file for the contracted hierarchy
    output: PathBuf,

    /// Stop once at most this percentage of nodes is uncontracted
    #[arg(long, default_value_t = 2.0)]
    rest: f64,

    /// Worker threads (defaults to the hardware thread count)
    #[arg(long)]
    threads: Option<usize>,

    /// Print per-worker contraction statistics
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (graph, mut registry) = formats::read_graph::<DIM>(&cli.input)?;
    println!(
        "Loaded graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    let mut contractor = match cli.threads {
        Some(threads) => Contractor::with_threads(cli.stats, threads),
        None => Contractor::new(cli.stats),
    };
    let hierarchy = contractor.contract_completely(&mut registry, &graph, cli.rest)?;

    formats::write_graph(&cli.output, &hierarchy, &registry)?;
    println!("Wrote hierarchy to {}", cli.output.display());
    Ok(())
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use buildgraph::dot;
use buildgraph::FsArtifacts;

use crate::args::{Args, Command};

mod args;

fn main() -> Result<()> {
    let args = Args::parse();
    buildgraph::tracing::init(args.verbose);
    tracing::debug!("{args:?}");

    match args.command {
        Command::Stats { graph } => stats(&graph),
        Command::MakeDag { input, output } => make_dag(&input, &output),
    }
}

fn stats(path: &Path) -> Result<()> {
    let graph = dot::read_dot_file(path)
        .with_context(|| format!("Failed to read graph from {}", path.display()))?;

    let mut states: BTreeMap<String, usize> = BTreeMap::new();
    let mut roles: BTreeMap<String, usize> = BTreeMap::new();
    for node in graph.nodes() {
        *states.entry(node.state.to_string()).or_default() += 1;
        *roles.entry(node.role.to_string()).or_default() += 1;
    }

    println!("{} nodes, {} edges", graph.node_count(), graph.edge_count());
    for (state, count) in &states {
        println!("  state {state}: {count}");
    }
    for (role, count) in &roles {
        println!("  role {role}: {count}");
    }
    println!(
        "acyclic: {}",
        graph.find_any_directed_cycle().is_none()
    );
    Ok(())
}

fn make_dag(input: &Path, output: &Path) -> Result<()> {
    let mut graph = dot::read_dot_file(input)
        .with_context(|| format!("Failed to read graph from {}", input.display()))?;
    graph
        .make_dag(&FsArtifacts, None)
        .context("Failed to break dependency cycles")?;
    dot::write_dot_file(&graph, output)
        .with_context(|| format!("Failed to write graph to {}", output.display()))?;
    tracing::info!("Wrote acyclic graph to {}", output.display());
    Ok(())
}

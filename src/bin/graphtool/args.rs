use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print node and edge statistics for a graph description file
    Stats {
        /// Graph description file to read
        #[arg()]
        graph: PathBuf,
    },
    /// Break dependency cycles and write the resulting acyclic graph
    MakeDag {
        /// Graph description file to read
        #[arg()]
        input: PathBuf,
        /// Where to write the repaired graph
        #[arg()]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "graphtool", author, about, version)]
pub struct Args {
    /// Be verbose. Specify twice to be more verbose
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

mod cli;

use clap::{Parser, Subcommand};

use cli::check::{cmd_check, CheckArgs};
use cli::explain::{cmd_explain, ExplainArgs};
use cli::graph::{cmd_graph, GraphArgs};
use cli::hash::{cmd_hash, HashArgs};
use cli::run::{cmd_run, RunArgs};

#[derive(Parser)]
#[command(
    name = "fastats",
    version,
    about = "fastats: call-graph specialization for numeric functions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Call a function, substituting call sites with --override
    Run(RunArgs),
    /// Load a module and compile every function in it
    Check(CheckArgs),
    /// Show the functions reachable from a function
    Graph(GraphArgs),
    /// Print the rewritten source of a specialization
    Explain(ExplainArgs),
    /// Print content fingerprints of every function
    Hash(HashArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Check(args) => cmd_check(args),
        Command::Graph(args) => cmd_graph(args),
        Command::Explain(args) => cmd_explain(args),
        Command::Hash(args) => cmd_hash(args),
    }
}

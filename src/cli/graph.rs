use std::collections::BTreeSet;

use clap::Args;

use super::{fail, load_module, LoadArgs};
use fastats::CallGraph;

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub load: LoadArgs,
    /// Root function
    pub function: String,
    /// Print Graphviz DOT instead of a list
    #[arg(long)]
    pub dot: bool,
}

pub fn cmd_graph(args: GraphArgs) {
    let module = load_module(&args.load);
    let graph = module
        .function(&args.function)
        .and_then(|func| CallGraph::build(&func, &BTreeSet::new()));
    let graph = match graph {
        Ok(graph) => graph,
        Err(e) => fail(&module, e),
    };

    if args.dot {
        print!("{}", graph.to_dot());
        return;
    }

    for name in graph.reachable() {
        println!("{}", name);
    }
    eprintln!(
        "{} function(s), {} call edge(s)",
        graph.reachable().len(),
        graph.edge_count()
    );
    if let Some(cycle) = graph.find_cycle() {
        eprintln!("warning: recursive call graph: {}", cycle.join(" -> "));
    }
}

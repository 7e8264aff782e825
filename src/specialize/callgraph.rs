//! The call graph of user-defined functions reachable from a function.
//!
//! Only unqualified call sites bound to plain functions or gateways become
//! edges. Builtins, library calls, natives, compiled artifacts, and names
//! being substituted are leaves the rewriter never descends into.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::ast::navigate::call_sites;
use crate::diagnostic::Diagnostic;
use crate::runtime::{Callable, Function, Global};

pub struct CallGraph {
    graph: DiGraph<String, ()>,
    root: NodeIndex,
}

impl CallGraph {
    /// Walk the graph from `func`, skipping call sites named in `excluded`.
    pub fn build(func: &Arc<Function>, excluded: &BTreeSet<String>) -> Result<Self, Diagnostic> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<u64, NodeIndex> = HashMap::new();
        let root = graph.add_node(func.name().to_string());
        nodes.insert(func.id(), root);

        let mut queue = VecDeque::from([func.clone()]);
        while let Some(caller) = queue.pop_front() {
            let from = nodes[&caller.id()];
            let namespace = caller.namespace()?;
            let mut seen = BTreeSet::new();
            for site in call_sites(&caller.def().body.node) {
                if site.qualified || excluded.contains(&site.callee) || !seen.insert(site.callee.clone()) {
                    continue;
                }
                let callee = match namespace.get(&site.callee) {
                    Some(Global::Callable(Callable::Function(f))) => f,
                    Some(Global::Callable(Callable::Gateway(g))) => g.function().clone(),
                    _ => continue,
                };
                let to = match nodes.get(&callee.id()) {
                    Some(&node) => node,
                    None => {
                        let node = graph.add_node(callee.name().to_string());
                        nodes.insert(callee.id(), node);
                        queue.push_back(callee);
                        node
                    }
                };
                graph.add_edge(from, to, ());
            }
        }

        Ok(Self { graph, root })
    }

    pub fn root(&self) -> &str {
        &self.graph[self.root]
    }

    /// Names of every function reachable from the root, root excluded,
    /// in discovery order.
    pub fn reachable(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|&n| n != self.root)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// A cycle in the graph, as a path that returns to its first name.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        for component in tarjan_scc(&self.graph) {
            let looped = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&n| self.graph.contains_edge(n, n));
            if looped {
                let mut path: Vec<String> = component.iter().rev().map(|&n| self.graph[n].clone()).collect();
                if let Some(first) = path.first().cloned() {
                    path.push(first);
                }
                return Some(path);
            }
        }
        None
    }

    /// Graphviz rendering.
    pub fn to_dot(&self) -> String {
        let labelled = self.graph.map(|_, name| name.clone(), |_, _| "");
        format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::runtime::Module;
    use crate::specialize::Engine;

    fn graph(source: &str, root: &str, excluded: &[&str]) -> CallGraph {
        let module = Module::load(&Engine::new(EngineConfig::default()), "m", source).unwrap();
        let excluded = excluded.iter().map(|s| s.to_string()).collect();
        CallGraph::build(&module.function(root).unwrap(), &excluded).unwrap()
    }

    const CHAIN: &str = "use math.erf\nfn square(x) { x * x }\nfn cube(x) { square(x) * x }\nfn quad(x) { cube(x) * x }\n@fs\nfn parent(a) { quad(a + 1) + erf(a) + math.exp(a) + len([a]) }";

    #[test]
    fn test_reachable_skips_leaves() {
        let g = graph(CHAIN, "parent", &[]);
        assert_eq!(g.root(), "parent");
        assert_eq!(g.reachable(), vec!["quad", "cube", "square"]);
        assert!(g.find_cycle().is_none());
    }

    #[test]
    fn test_excluded_names_cut_the_graph() {
        let g = graph(CHAIN, "parent", &["cube"]);
        assert_eq!(g.reachable(), vec!["quad"]);
    }

    #[test]
    fn test_cycle_found() {
        let g = graph(
            "fn even(n) { if n == 0 { return true }\n odd(n - 1) }\nfn odd(n) { if n == 0 { return false }\n even(n - 1) }\n@fs\nfn f(n) { even(n) }",
            "f",
            &[],
        );
        let cycle = g.find_cycle().unwrap();
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let g = graph("fn down(n) { if n > 0 { return down(n - 1) }\n 0 }", "down", &[]);
        assert_eq!(g.find_cycle(), Some(vec!["down".to_string(), "down".to_string()]));
    }

    #[test]
    fn test_dot_output() {
        let dot = graph(CHAIN, "parent", &[]).to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"cube\""));
    }
}

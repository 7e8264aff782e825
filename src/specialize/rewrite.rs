//! The call-graph rewriter.
//!
//! A pass walks a function's call sites and decides, per unqualified
//! callee name:
//!
//! - a name in the substitution table is renamed to its override alias,
//!   and the alias is bound to the replacement;
//! - a name bound to a user-defined function is specialized recursively
//!   against the same table, compiled, and bound in place of the original;
//! - anything else (builtins, natives, compiled code, constants, names
//!   that resolve to nothing, module-qualified calls) is left alone.
//!
//! Every binding goes through the pass's [`Restorer`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::reassemble::reassemble;
use super::restore::{Restorer, SymbolTable};
use super::source::extract;
use crate::ast::navigate::call_sites;
use crate::ast::visit::walk_block_mut;
use crate::ast::{Expr, File, Item, ModulePath};
use crate::diagnostic::Diagnostic;
use crate::jit::{self, Compiled, Resolve};
use crate::runtime::{Callable, Function, Global, Namespace};
use crate::span::Spanned;

/// Substitution table: call-site symbol to replacement.
pub type Table = BTreeMap<String, Callable>;

/// The name an override is bound under. It cannot be written in source,
/// so it never collides with a real binding.
pub fn override_alias(name: &str) -> String {
    format!("{}@override", name)
}

/// One specialization pass over a call graph.
pub struct Pass<'p, T: SymbolTable + Resolve> {
    table: &'p Table,
    restorer: &'p mut Restorer<T>,
    debug: bool,
    active: Vec<(u64, String)>,
    matched: BTreeSet<String>,
}

impl<'p, T: SymbolTable + Resolve> Pass<'p, T> {
    pub fn new(table: &'p Table, restorer: &'p mut Restorer<T>, debug: bool) -> Self {
        Self {
            table,
            restorer,
            debug,
            active: Vec::new(),
            matched: BTreeSet::new(),
        }
    }

    /// Table keys that matched at least one call site.
    pub fn matched(&self) -> &BTreeSet<String> {
        &self.matched
    }

    /// Rewrite `func` and everything it reaches; returns the reassembled
    /// top-level unit.
    pub fn specialize(&mut self, func: &Arc<Function>) -> Result<Arc<Function>, Diagnostic> {
        if let Some(pos) = self.active.iter().position(|(id, _)| *id == func.id()) {
            let mut cycle: Vec<&str> = self.active[pos..].iter().map(|(_, n)| n.as_str()).collect();
            cycle.push(func.name());
            return Err(Diagnostic::unsupported(
                format!("cannot specialize recursive call graph {}", cycle.join(" -> ")),
                func.def().name.span,
            ));
        }
        super::trace!(self.debug, "specializing `{}`", func.name());

        let mut unit = extract(func)?;
        let namespace = func.namespace()?;
        self.active.push((func.id(), func.name().to_string()));
        let rewritten = self.rewrite_unit(&namespace, &mut unit);
        self.active.pop();
        rewritten?;

        Ok(Arc::new(reassemble(func, unit)?))
    }

    /// [`specialize`](Self::specialize), then compile against the pass's
    /// bindings.
    pub fn specialize_compiled(&mut self, func: &Arc<Function>) -> Result<Arc<Compiled>, Diagnostic> {
        let rewritten = self.specialize(func)?;
        jit::compile(&rewritten, self.restorer.table())
    }

    fn rewrite_unit(&mut self, namespace: &Namespace, unit: &mut File) -> Result<(), Diagnostic> {
        let Some(Spanned {
            node: Item::Fn(def),
            ..
        }) = unit.items.first_mut()
        else {
            return Ok(());
        };

        let mut renames: HashMap<String, String> = HashMap::new();
        let mut seen = BTreeSet::new();
        for site in call_sites(&def.body.node) {
            if site.qualified || !seen.insert(site.callee.clone()) {
                continue;
            }
            if let Some(alias) = self.rewrite_call(namespace, &site.callee)? {
                renames.insert(site.callee, alias);
            }
        }
        if renames.is_empty() {
            return Ok(());
        }

        walk_block_mut(&mut def.body.node, &mut |expr| {
            if let Expr::Call { path, .. } = &mut expr.node {
                let alias = path.node.as_single().and_then(|name| renames.get(name)).cloned();
                if let Some(alias) = alias {
                    path.node = ModulePath::single(alias);
                }
            }
            Ok::<(), Diagnostic>(())
        })
    }

    /// Decide one callee. Returns the alias to rename its call sites to.
    fn rewrite_call(&mut self, namespace: &Namespace, name: &str) -> Result<Option<String>, Diagnostic> {
        let Some(current) = self.restorer.lookup(namespace, name) else {
            return Ok(None);
        };

        if let Some(replacement) = self.table.get(name) {
            let alias = override_alias(name);
            if !self.restorer.is_recorded(namespace, &alias) {
                super::trace!(
                    self.debug,
                    "replacing `{}` with {} in `{}`",
                    name,
                    replacement.describe(),
                    namespace.name()
                );
                self.restorer
                    .install(namespace, &alias, name, Global::Callable(replacement.clone()));
            }
            self.matched.insert(name.to_string());
            return Ok(Some(alias));
        }

        let callee = match current {
            Global::Callable(Callable::Function(func)) => func,
            Global::Callable(Callable::Gateway(gateway)) => gateway.function().clone(),
            _ => return Ok(None),
        };
        let compiled = self
            .specialize_compiled(&callee)
            .map_err(|d| d.with_note(format!("while specializing callee `{}`", name)))?;
        self.restorer
            .install(namespace, name, name, Global::Callable(Callable::Compiled(compiled)));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::display::format_function;
    use crate::config::EngineConfig;
    use crate::runtime::{Module, Value};
    use crate::specialize::restore::{PassEnv, SharedTable};
    use crate::specialize::Engine;

    const TRIPLE: &str = "fn single(x) { x }\nfn double(x) { single(x) + single(x) }\nfn triple(x) { double(x) + single(x) }\nfn twice(x) { x + x }\n";

    fn module(source: &str) -> Module {
        Module::load(&Engine::new(EngineConfig::default()), "m", source).unwrap()
    }

    fn table(module: &Module, pairs: &[(&str, &str)]) -> Table {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), jit::convert(&module.callable(v).unwrap()).unwrap()))
            .collect()
    }

    #[test]
    fn test_overrides_reach_nested_callees() {
        let module = module(TRIPLE);
        let triple = module.function("triple").unwrap();
        let table = table(&module, &[("single", "twice")]);
        let mut restorer = Restorer::new(PassEnv::new(), false);
        let compiled = Pass::new(&table, &mut restorer, false)
            .specialize_compiled(&triple)
            .unwrap();

        assert_eq!(compiled.call(&[Value::Num(1.0)]).unwrap(), Value::Num(6.0));
        let symbols = restorer.symbols();
        assert!(symbols.contains(&"double"));
        assert!(symbols.contains(&"single"));
        // the shared namespace was never written
        assert_eq!(triple.call(&[Value::Num(1.0)]).unwrap(), Value::Num(3.0));
    }

    #[test]
    fn test_empty_table_still_walks_graph() {
        let module = module(TRIPLE);
        let triple = module.function("triple").unwrap();
        let table = Table::new();
        let mut restorer = Restorer::new(SharedTable, false);
        let compiled = Pass::new(&table, &mut restorer, false)
            .specialize_compiled(&triple)
            .unwrap();
        assert_eq!(compiled.call(&[Value::Num(2.0)]).unwrap(), Value::Num(6.0));
        assert_eq!(restorer.symbols(), vec!["single", "double"]);
        assert!(matches!(
            module.callable("double").unwrap(),
            Callable::Compiled(_)
        ));

        drop(restorer);
        assert!(matches!(
            module.callable("double").unwrap(),
            Callable::Function(_)
        ));
        assert_eq!(module.call("triple", &[Value::Num(1.0)]).unwrap(), Value::Num(3.0));
    }

    #[test]
    fn test_rename_only_matching_unqualified_sites() {
        let module = module("fn exp(x) { x }\nfn f(x) { exp(x) + math.exp(x) + len([x]) }\nfn one(x) { 1 }");
        let f = module.function("f").unwrap();
        let table = table(&module, &[("exp", "one"), ("len", "one")]);
        let mut restorer = Restorer::new(PassEnv::new(), false);
        let mut pass = Pass::new(&table, &mut restorer, false);
        let rewritten = pass.specialize(&f).unwrap();
        assert_eq!(
            format_function(rewritten.def()),
            "fn f(x) {\n    exp@override(x) + math.exp(x) + len([x])\n}\n"
        );
        assert_eq!(pass.matched().iter().collect::<Vec<_>>(), vec!["exp"]);
    }

    #[test]
    fn test_error_midway_rolls_back() {
        let module = module("fn bad(x) { missing(x) }\nfn good(x) { x }\nfn top(x) { good(x) + bad(x) }");
        let top = module.function("top").unwrap();
        let table = Table::new();
        {
            let mut restorer = Restorer::new(SharedTable, false);
            let err = Pass::new(&table, &mut restorer, false)
                .specialize_compiled(&top)
                .unwrap_err();
            assert!(err.message.contains("`missing`"));
            assert!(matches!(module.callable("good").unwrap(), Callable::Compiled(_)));
        }
        assert!(matches!(module.callable("good").unwrap(), Callable::Function(_)));
    }
}

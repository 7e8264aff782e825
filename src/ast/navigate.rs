//! AST navigation: find definitions, call sites, and free names.

use std::collections::BTreeSet;

use super::visit::walk_block;
use super::{Block, Expr, File, FnDef, Item, Pattern, Place, Stmt};
use crate::span::Span;

/// Find a function by name in a parsed file.
pub fn find_function<'a>(file: &'a File, name: &str) -> Option<&'a FnDef> {
    file.functions().find(|func| func.name.node == name)
}

/// Find the item index of a function definition by name.
pub fn find_function_index(file: &File, name: &str) -> Option<usize> {
    file.items
        .iter()
        .position(|item| matches!(&item.node, Item::Fn(func) if func.name.node == name))
}

/// A call expression found in a body.
#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    /// Dotted callee path as written.
    pub callee: String,
    /// True for `module.name(...)` calls.
    pub qualified: bool,
    pub span: Span,
}

/// All call sites in a block, in evaluation order (arguments first).
pub fn call_sites(block: &Block) -> Vec<CallSite> {
    let mut sites = Vec::new();
    walk_block(block, &mut |expr| {
        if let Expr::Call { path, .. } = &expr.node {
            sites.push(CallSite {
                callee: path.node.as_dotted(),
                qualified: path.node.is_qualified(),
                span: path.span,
            });
        }
    });
    sites
}

/// Unqualified callee names used in a block, deduplicated and sorted.
pub fn called_names(block: &Block) -> BTreeSet<String> {
    call_sites(block)
        .into_iter()
        .filter(|site| !site.qualified)
        .map(|site| site.callee)
        .collect()
}

/// Names a function binds: parameters, `let` names, loop variables, and
/// plain assignment targets. Bindings are function-wide, so a name bound
/// anywhere in the body counts as local everywhere in it.
pub fn bound_names(func: &FnDef) -> BTreeSet<String> {
    let mut bound: BTreeSet<String> = func.params.iter().map(|p| p.node.clone()).collect();
    collect_bindings(&func.body.node, &mut bound);
    for_each_place(&func.body.node, &mut |place| {
        if let Place::Var(name) = place {
            bound.insert(name.clone());
        }
    });
    bound
}

/// Names a function reads without binding them itself: captured values,
/// module constants, and arrays it stores into without rebinding.
pub fn free_names(func: &FnDef) -> BTreeSet<String> {
    let bound = bound_names(func);
    let mut free = BTreeSet::new();
    walk_block(&func.body.node, &mut |expr| {
        if let Expr::Var(name) = &expr.node {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
        }
    });
    for_each_place(&func.body.node, &mut |place| {
        if let Place::Index { base, .. } = place {
            if !bound.contains(&base.node) {
                free.insert(base.node.clone());
            }
        }
    });
    free
}

/// Base names of indexed stores (`xs[i] = v`).
pub fn stored_arrays(func: &FnDef) -> BTreeSet<String> {
    let mut bases = BTreeSet::new();
    for_each_place(&func.body.node, &mut |place| {
        if let Place::Index { base, .. } = place {
            bases.insert(base.node.clone());
        }
    });
    bases
}

fn collect_bindings(block: &Block, bound: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        match &stmt.node {
            Stmt::Let { pattern, .. } => match pattern {
                Pattern::Name(name) => {
                    bound.insert(name.node.clone());
                }
                Pattern::Tuple(names) => {
                    bound.extend(names.iter().map(|n| n.node.clone()));
                }
            },
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                collect_bindings(&then_block.node, bound);
                if let Some(else_block) = else_block {
                    collect_bindings(&else_block.node, bound);
                }
            }
            Stmt::For { var, body, .. } => {
                bound.insert(var.node.clone());
                collect_bindings(&body.node, bound);
            }
            Stmt::While { body, .. } => collect_bindings(&body.node, bound),
            _ => {}
        }
    }
}

fn for_each_place(block: &Block, f: &mut impl FnMut(&Place)) {
    for stmt in &block.stmts {
        match &stmt.node {
            Stmt::Assign { place, .. } => f(&place.node),
            Stmt::TupleAssign { places, .. } => {
                for place in places {
                    f(&place.node);
                }
            }
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                for_each_place(&then_block.node, f);
                if let Some(else_block) = else_block {
                    for_each_place(&else_block.node, f);
                }
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } => for_each_place(&body.node, f),
            _ => {}
        }
    }
}

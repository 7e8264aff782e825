//! Turning a rewritten unit back into a Function Unit.

use crate::ast::visit::visit_block_mut;
use crate::ast::{File, FnDef, Item};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::runtime::{Function, Origin};
use crate::span::{Span, Spanned};

/// Build a new unit from `unit`, whose first item must be the rewritten
/// definition of `original`. The `fs` marker is dropped so the result is
/// never routed back into a gateway. Captured values, origin, and
/// namespace carry over from `original`.
pub fn reassemble(original: &Function, unit: File) -> Result<Function, Diagnostic> {
    match unit.items.first() {
        Some(Spanned {
            node: Item::Fn(_), ..
        }) => {}
        Some(item) => {
            return Err(Diagnostic::unsupported(
                "rewritten unit does not start with a function definition".to_string(),
                item.span,
            ))
        }
        None => {
            return Err(Diagnostic::unsupported(
                "rewritten unit is empty".to_string(),
                original.def().name.span,
            ))
        }
    }

    let declared_at = match original.origin() {
        Origin::Source { span, .. } => Some(span.start),
        Origin::Interactive => None,
    };
    let mut def = locate(unit, original.name(), declared_at).ok_or_else(|| {
        Diagnostic::unsupported(
            format!("definition of `{}` not found in rewritten unit", original.name()),
            original.def().name.span,
        )
        .with_kind(ErrorKind::DefinitionNotFound)
    })?;

    def.decorators.retain(|d| d.node != "fs");
    fix_spans(&mut def);
    Ok(original.rebuilt(def))
}

/// Find the definition named `name` declared at `declared_at`.
fn locate(unit: File, name: &str, declared_at: Option<u32>) -> Option<FnDef> {
    unit.items.into_iter().find_map(|item| match item.node {
        Item::Fn(def) if def.name.node == name && declared_at.map_or(true, |at| item.span.start == at) => {
            Some(def)
        }
        _ => None,
    })
}

/// Give synthesized nodes the body's location so errors raised in them
/// still point into the definition.
fn fix_spans(def: &mut FnDef) {
    let body: Span = def.body.span;
    visit_block_mut(&mut def.body.node, &mut |expr| {
        if expr.span.is_dummy() {
            expr.span = body;
        }
    });
}

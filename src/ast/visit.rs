//! Tree walkers over function bodies.
//!
//! Both walkers are post-order: the children of an expression (call
//! arguments, operands, indices) are visited before the expression itself.

use std::convert::Infallible;

use super::{Block, Expr, Place, Stmt};
use crate::span::Spanned;

/// Visit every expression in `block`, children first.
pub fn walk_block<'a>(block: &'a Block, f: &mut impl FnMut(&'a Spanned<Expr>)) {
    for stmt in &block.stmts {
        walk_stmt(&stmt.node, f);
    }
    if let Some(tail) = &block.tail_expr {
        walk_expr(tail, f);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Spanned<Expr>)) {
    match stmt {
        Stmt::Let { init, .. } => walk_expr(init, f),
        Stmt::Assign { place, value } => {
            walk_place(&place.node, f);
            walk_expr(value, f);
        }
        Stmt::TupleAssign { places, value } => {
            for place in places {
                walk_place(&place.node, f);
            }
            walk_expr(value, f);
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            walk_expr(cond, f);
            walk_block(&then_block.node, f);
            if let Some(else_block) = else_block {
                walk_block(&else_block.node, f);
            }
        }
        Stmt::For {
            start, end, body, ..
        } => {
            walk_expr(start, f);
            walk_expr(end, f);
            walk_block(&body.node, f);
        }
        Stmt::While { cond, body } => {
            walk_expr(cond, f);
            walk_block(&body.node, f);
        }
        Stmt::Expr(expr) => walk_expr(expr, f),
        Stmt::Return(value) => {
            if let Some(value) = value {
                walk_expr(value, f);
            }
        }
    }
}

fn walk_place<'a>(place: &'a Place, f: &mut impl FnMut(&'a Spanned<Expr>)) {
    if let Place::Index { index, .. } = place {
        walk_expr(index, f);
    }
}

pub fn walk_expr<'a>(expr: &'a Spanned<Expr>, f: &mut impl FnMut(&'a Spanned<Expr>)) {
    match &expr.node {
        Expr::Literal(_) | Expr::Var(_) | Expr::Path(_) => {}
        Expr::BinOp { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        Expr::Unary { operand, .. } => walk_expr(operand, f),
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::Index { expr: base, index } => {
            walk_expr(base, f);
            walk_expr(index, f);
        }
        Expr::Slice {
            expr: base,
            start,
            end,
        } => {
            walk_expr(base, f);
            walk_expr(start, f);
            walk_expr(end, f);
        }
        Expr::ArrayInit(elements) | Expr::Tuple(elements) => {
            for element in elements {
                walk_expr(element, f);
            }
        }
    }
    f(expr);
}

/// Visit every expression in `block` mutably, children first.
pub fn visit_block_mut(block: &mut Block, f: &mut impl FnMut(&mut Spanned<Expr>)) {
    let walked = walk_block_mut(block, &mut |expr| {
        f(expr);
        Ok::<(), Infallible>(())
    });
    if let Err(never) = walked {
        match never {}
    }
}

/// Visit every expression in `block` mutably, children first, stopping at
/// the first error.
pub fn walk_block_mut<E>(
    block: &mut Block,
    f: &mut impl FnMut(&mut Spanned<Expr>) -> Result<(), E>,
) -> Result<(), E> {
    for stmt in &mut block.stmts {
        walk_stmt_mut(&mut stmt.node, f)?;
    }
    if let Some(tail) = &mut block.tail_expr {
        walk_expr_mut(tail, f)?;
    }
    Ok(())
}

fn walk_stmt_mut<E>(
    stmt: &mut Stmt,
    f: &mut impl FnMut(&mut Spanned<Expr>) -> Result<(), E>,
) -> Result<(), E> {
    match stmt {
        Stmt::Let { init, .. } => walk_expr_mut(init, f),
        Stmt::Assign { place, value } => {
            walk_place_mut(&mut place.node, f)?;
            walk_expr_mut(value, f)
        }
        Stmt::TupleAssign { places, value } => {
            for place in places {
                walk_place_mut(&mut place.node, f)?;
            }
            walk_expr_mut(value, f)
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            walk_expr_mut(cond, f)?;
            walk_block_mut(&mut then_block.node, f)?;
            if let Some(else_block) = else_block {
                walk_block_mut(&mut else_block.node, f)?;
            }
            Ok(())
        }
        Stmt::For {
            start, end, body, ..
        } => {
            walk_expr_mut(start, f)?;
            walk_expr_mut(end, f)?;
            walk_block_mut(&mut body.node, f)
        }
        Stmt::While { cond, body } => {
            walk_expr_mut(cond, f)?;
            walk_block_mut(&mut body.node, f)
        }
        Stmt::Expr(expr) => walk_expr_mut(expr, f),
        Stmt::Return(value) => match value {
            Some(value) => walk_expr_mut(value, f),
            None => Ok(()),
        },
    }
}

fn walk_place_mut<E>(
    place: &mut Place,
    f: &mut impl FnMut(&mut Spanned<Expr>) -> Result<(), E>,
) -> Result<(), E> {
    match place {
        Place::Index { index, .. } => walk_expr_mut(index, f),
        Place::Var(_) | Place::Discard => Ok(()),
    }
}

pub fn walk_expr_mut<E>(
    expr: &mut Spanned<Expr>,
    f: &mut impl FnMut(&mut Spanned<Expr>) -> Result<(), E>,
) -> Result<(), E> {
    match &mut expr.node {
        Expr::Literal(_) | Expr::Var(_) | Expr::Path(_) => {}
        Expr::BinOp { lhs, rhs, .. } => {
            walk_expr_mut(lhs, f)?;
            walk_expr_mut(rhs, f)?;
        }
        Expr::Unary { operand, .. } => walk_expr_mut(operand, f)?,
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr_mut(arg, f)?;
            }
        }
        Expr::Index { expr: base, index } => {
            walk_expr_mut(base, f)?;
            walk_expr_mut(index, f)?;
        }
        Expr::Slice {
            expr: base,
            start,
            end,
        } => {
            walk_expr_mut(base, f)?;
            walk_expr_mut(start, f)?;
            walk_expr_mut(end, f)?;
        }
        Expr::ArrayInit(elements) | Expr::Tuple(elements) => {
            for element in elements {
                walk_expr_mut(element, f)?;
            }
        }
    }
    f(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::File;

    fn parse(source: &str) -> File {
        crate::parse_source_silent(source, "test.fst").unwrap()
    }

    #[test]
    fn test_calls_visited_arguments_first() {
        let file = parse("fn f(x) { outer(inner(x), math.log(x)) }");
        let body = &file.functions().next().unwrap().body.node;
        let mut order = Vec::new();
        walk_block(body, &mut |e| {
            if let Expr::Call { path, .. } = &e.node {
                order.push(path.node.as_dotted());
            }
        });
        assert_eq!(order, vec!["inner", "math.log", "outer"]);
    }

    #[test]
    fn test_place_indices_are_visited() {
        let file = parse("fn f(x) { x[idx(0)] = 1 }");
        let body = &file.functions().next().unwrap().body.node;
        let mut calls = 0;
        walk_block(body, &mut |e| {
            if matches!(e.node, Expr::Call { .. }) {
                calls += 1;
            }
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_mut_walk_stops_on_error() {
        let mut file = parse("fn f(x) { a(b(x)) }");
        let crate::ast::Item::Fn(func) = &mut file.items[0].node else {
            panic!("expected fn");
        };
        let mut seen = 0;
        let result: Result<(), String> = walk_block_mut(&mut func.body.node, &mut |e| {
            if matches!(e.node, Expr::Call { .. }) {
                seen += 1;
                return Err("stop".to_string());
            }
            Ok(())
        });
        assert_eq!(result, Err("stop".to_string()));
        assert_eq!(seen, 1);
    }
}

//! Pretty-printing for AST nodes.
//!
//! This module is the single source of truth for turning a tree back into
//! `.fst` source text. Rewritten definitions are shown through it by
//! `explain`, and the output re-parses to an equal tree (modulo spans).

use super::{Block, Expr, File, FnDef, Item, Literal, Pattern, Place, Stmt, UnaryOp};
use crate::span::Spanned;

const INDENT: &str = "    ";

/// Format a whole file, one blank line between functions.
pub fn format_file(file: &File) -> String {
    let mut out = String::new();
    let mut prev_was_fn = false;
    for (i, item) in file.items.iter().enumerate() {
        let is_fn = matches!(item.node, Item::Fn(_));
        if i > 0 && (is_fn || prev_was_fn) {
            out.push('\n');
        }
        match &item.node {
            Item::Use(decl) => {
                out.push_str(&format!("use {}\n", decl.path.node));
            }
            Item::Const(def) => {
                out.push_str(&format!(
                    "const {} = {}\n",
                    def.name.node,
                    format_expr(&def.value.node)
                ));
            }
            Item::Fn(func) => out.push_str(&format_function(func)),
        }
        prev_was_fn = is_fn;
    }
    out
}

/// Format a single function definition, markers included.
pub fn format_function(func: &FnDef) -> String {
    let mut out = String::new();
    for marker in &func.decorators {
        out.push_str(&format!("@{}\n", marker.node));
    }
    out.push_str(&format_fn_signature(func));
    out.push(' ');
    emit_block(&mut out, &func.body.node, 0);
    out.push('\n');
    out
}

/// `fn name(a, b)`
pub fn format_fn_signature(func: &FnDef) -> String {
    let params: Vec<&str> = func.params.iter().map(|p| p.node.as_str()).collect();
    format!("fn {}({})", func.name.node, params.join(", "))
}

// ─── Statements ────────────────────────────────────────────────────

fn emit_block(out: &mut String, block: &Block, depth: usize) {
    if block.stmts.is_empty() && block.tail_expr.is_none() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    let indent = INDENT.repeat(depth + 1);
    for (i, stmt) in block.stmts.iter().enumerate() {
        out.push_str(&indent);
        emit_stmt(out, &stmt.node, depth + 1);
        let next_starts_open = match block.stmts.get(i + 1) {
            Some(next) => stmt_starts_open(&next.node),
            None => block
                .tail_expr
                .as_ref()
                .is_some_and(|tail| expr_starts_open(&tail.node)),
        };
        if next_starts_open && ends_with_expr(&stmt.node) {
            out.push(';');
        }
        out.push('\n');
    }
    if let Some(tail) = &block.tail_expr {
        out.push_str(&indent);
        out.push_str(&format_expr(&tail.node));
        out.push('\n');
    }
    out.push_str(&INDENT.repeat(depth));
    out.push('}');
}

fn emit_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match stmt {
        Stmt::Let { pattern, init } => {
            let target = match pattern {
                Pattern::Name(name) => name.node.clone(),
                Pattern::Tuple(names) => {
                    let names: Vec<&str> = names.iter().map(|n| n.node.as_str()).collect();
                    format!("({})", names.join(", "))
                }
            };
            out.push_str(&format!("let {} = {}", target, format_expr(&init.node)));
        }
        Stmt::Assign { place, value } => {
            out.push_str(&format!(
                "{} = {}",
                format_place(&place.node),
                format_expr(&value.node)
            ));
        }
        Stmt::TupleAssign { places, value } => {
            let places: Vec<String> = places.iter().map(|p| format_place(&p.node)).collect();
            out.push_str(&format!(
                "({}) = {}",
                places.join(", "),
                format_expr(&value.node)
            ));
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            out.push_str(&format!("if {} ", format_expr(&cond.node)));
            emit_block(out, &then_block.node, depth);
            if let Some(else_block) = else_block {
                out.push_str(" else ");
                match as_else_if(&else_block.node) {
                    Some(inner) => emit_stmt(out, inner, depth),
                    None => emit_block(out, &else_block.node, depth),
                }
            }
        }
        Stmt::For {
            var,
            start,
            end,
            body,
        } => {
            out.push_str(&format!(
                "for {} in {}..{} ",
                var.node,
                format_expr(&start.node),
                format_expr(&end.node)
            ));
            emit_block(out, &body.node, depth);
        }
        Stmt::While { cond, body } => {
            out.push_str(&format!("while {} ", format_expr(&cond.node)));
            emit_block(out, &body.node, depth);
        }
        Stmt::Expr(expr) => out.push_str(&format_expr(&expr.node)),
        Stmt::Return(value) => match value {
            Some(value) => out.push_str(&format!("return {}", format_expr(&value.node))),
            None => out.push_str("return"),
        },
    }
}

/// An `else` block holding exactly one `if` prints as `else if`.
fn as_else_if(block: &Block) -> Option<&Stmt> {
    match (block.stmts.as_slice(), &block.tail_expr) {
        ([only], None) if matches!(only.node, Stmt::If { .. }) => Some(&only.node),
        _ => None,
    }
}

fn ends_with_expr(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Let { .. }
            | Stmt::Assign { .. }
            | Stmt::TupleAssign { .. }
            | Stmt::Expr(_)
            | Stmt::Return(Some(_))
    )
}

/// Statements whose first token could continue the previous expression.
fn stmt_starts_open(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::TupleAssign { .. } => true,
        Stmt::Expr(expr) => expr_starts_open(&expr.node),
        _ => false,
    }
}

fn expr_starts_open(expr: &Expr) -> bool {
    match expr {
        Expr::Tuple(_) | Expr::ArrayInit(_) => true,
        Expr::Unary {
            op: UnaryOp::Neg, ..
        } => true,
        Expr::BinOp { lhs, .. } => expr_starts_open(&lhs.node),
        Expr::Index { expr, .. } | Expr::Slice { expr, .. } => expr_starts_open(&expr.node),
        _ => false,
    }
}

// ─── Expressions ───────────────────────────────────────────────────

/// Format an expression on a single line with minimal parentheses.
pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(Literal::Number(n)) => format_number(*n),
        Expr::Literal(Literal::Bool(b)) => b.to_string(),
        Expr::Var(name) => name.clone(),
        Expr::Path(path) => path.as_dotted(),
        Expr::BinOp { op, lhs, rhs } => {
            let (own, _) = op.binding_power();
            let right_assoc = matches!(op, super::BinOp::Pow);
            let l = wrap_operand(&lhs.node, own, right_assoc);
            let r = wrap_operand(&rhs.node, own, !right_assoc);
            format!("{} {} {}", l, op.as_str(), r)
        }
        Expr::Unary { op, operand } => {
            let inner = match &operand.node {
                Expr::BinOp { op: inner_op, .. }
                    if inner_op.binding_power().0 < UnaryOp::BINDING_POWER =>
                {
                    format!("({})", format_expr(&operand.node))
                }
                _ => format_expr(&operand.node),
            };
            format!("{}{}", op.as_str(), inner)
        }
        Expr::Call { path, args } => {
            format!("{}({})", path.node.as_dotted(), format_list(args))
        }
        Expr::Index { expr, index } => {
            format!("{}[{}]", format_postfix_base(&expr.node), format_expr(&index.node))
        }
        Expr::Slice { expr, start, end } => format!(
            "{}[{}..{}]",
            format_postfix_base(&expr.node),
            format_expr(&start.node),
            format_expr(&end.node)
        ),
        Expr::ArrayInit(elements) => format!("[{}]", format_list(elements)),
        Expr::Tuple(elements) if elements.len() == 1 => {
            format!("({},)", format_expr(&elements[0].node))
        }
        Expr::Tuple(elements) => format!("({})", format_list(elements)),
    }
}

/// Format an assignment target.
pub fn format_place(place: &Place) -> String {
    match place {
        Place::Var(name) => name.clone(),
        Place::Discard => "_".to_string(),
        Place::Index { base, index } => format!("{}[{}]", base.node, format_expr(&index.node)),
    }
}

fn format_list(items: &[Spanned<Expr>]) -> String {
    let parts: Vec<String> = items.iter().map(|e| format_expr(&e.node)).collect();
    parts.join(", ")
}

/// Operand of a binary operator, parenthesized when the tree would not
/// re-parse the same way without them. `tight` is set on the side where an
/// equal-precedence child must be wrapped.
fn wrap_operand(expr: &Expr, parent_bp: u8, tight: bool) -> String {
    let needs_parens = match expr {
        Expr::BinOp { op, .. } => {
            let child_bp = op.binding_power().0;
            child_bp < parent_bp || (tight && child_bp == parent_bp)
        }
        // `-x ** 2` parses as `-(x ** 2)`
        Expr::Unary { .. } => parent_bp > UnaryOp::BINDING_POWER,
        _ => false,
    };
    if needs_parens {
        format!("({})", format_expr(expr))
    } else {
        format_expr(expr)
    }
}

fn format_postfix_base(expr: &Expr) -> String {
    match expr {
        Expr::BinOp { .. } | Expr::Unary { .. } => format!("({})", format_expr(expr)),
        _ => format_expr(expr),
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() {
        format!("{}", n)
    } else if n.is_nan() {
        "math.nan".to_string()
    } else if n > 0.0 {
        "math.inf".to_string()
    } else {
        "-math.inf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::navigate::find_function;

    fn parse_file(source: &str) -> File {
        crate::parse_source_silent(source, "test.fst").unwrap()
    }

    fn roundtrip(source: &str) -> String {
        format_file(&parse_file(source))
    }

    #[test]
    fn test_format_function_produces_valid_source() {
        let source = "@fs\nfn add(a, b) {\n    a + b\n}\n";
        let file = parse_file(source);
        let func = find_function(&file, "add").expect("add function should exist");
        let formatted = format_function(func);
        assert_eq!(formatted, source);
    }

    #[test]
    fn test_precedence_parentheses_are_minimal() {
        let out = roundtrip("fn f(a, b, c) { (a + b) * c - (a - b) - -c ** 2 }");
        assert!(out.contains("(a + b) * c - (a - b) - -c ** 2"), "{}", out);
        let out = roundtrip("fn f(a, b, c) { a - (b - c) }");
        assert!(out.contains("a - (b - c)"), "{}", out);
        let out = roundtrip("fn f(a, b, c) { (a ** b) ** c + a ** b ** c }");
        assert!(out.contains("(a ** b) ** c + a ** b ** c"), "{}", out);
    }

    #[test]
    fn test_else_if_chain_is_preserved() {
        let source = "fn f(x) {\n    if x < 0 {\n        return 0\n    } else if x < 1 {\n        return 1\n    } else {\n        return 2\n    }\n}\n";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn test_formatted_source_reparses_equal() {
        let source = "use math.erf\nconst K = 2\n\n@fs\nfn f(x, n) {\n    let (a, b) = (x[0], x[1..n])\n    (a, _) = pair(a)\n    for i in 0..n { b[i] = erf(b[i]) * K }\n    while a > 1 { a = a / 2 }\n    [a, sum(b)]\n}\n";
        let first = parse_file(source);
        let printed = format_file(&first);
        let second = parse_file(&printed);
        assert_eq!(format_file(&second), printed);
        assert_eq!(first.items.len(), second.items.len());
    }

    #[test]
    fn test_statement_followed_by_tuple_assign_is_separated() {
        let source = "fn f(x) {\n    let a = x;\n    (a, x) = (x, a)\n    a\n}\n";
        let printed = roundtrip(source);
        assert!(printed.contains("let a = x;\n"), "{}", printed);
        assert_eq!(roundtrip(&printed), printed);
    }
}

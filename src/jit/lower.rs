//! Lowering from the syntax tree to closures.

use std::collections::HashMap;
use std::sync::Arc;

use super::{next_artifact_id, Compiled, Eval, Exec, Flow, Frame, Resolve};
use crate::ast::navigate::{bound_names, stored_arrays};
use crate::ast::{BinOp, Block, Expr, Literal, Pattern, Place, Stmt};
use crate::diagnostic::Diagnostic;
use crate::hash::{hash_compiled, hash_native, ContentHash};
use crate::runtime::builtins;
use crate::runtime::library::{self, Native};
use crate::runtime::value;
use crate::runtime::{Callable, Function, Global, Namespace, Value};
use crate::span::{Span, Spanned};

type Store = Box<dyn Fn(&mut Frame, Value) -> Result<(), Diagnostic> + Send + Sync>;
type Test = Box<dyn Fn(&mut Frame) -> Result<bool, Diagnostic> + Send + Sync>;

/// One compilation session. Callees reached more than once are compiled
/// once; a callee reached while it is still being compiled is a cycle.
pub(crate) struct Compiler<'r> {
    resolver: &'r dyn Resolve,
    done: HashMap<u64, Arc<Compiled>>,
    active: Vec<(u64, String)>,
}

enum Target {
    Native(&'static Native),
    Compiled(Arc<Compiled>),
}

impl Target {
    fn fingerprint(&self) -> ContentHash {
        match self {
            Target::Native(native) => hash_native(native.name),
            Target::Compiled(compiled) => compiled.fingerprint(),
        }
    }
}

impl<'r> Compiler<'r> {
    pub(crate) fn new(resolver: &'r dyn Resolve) -> Self {
        Self {
            resolver,
            done: HashMap::new(),
            active: Vec::new(),
        }
    }

    pub(crate) fn compile(&mut self, func: &Arc<Function>) -> Result<Arc<Compiled>, Diagnostic> {
        if let Some(compiled) = self.done.get(&func.id()) {
            return Ok(compiled.clone());
        }
        if let Some(pos) = self.active.iter().position(|(id, _)| *id == func.id()) {
            let mut cycle: Vec<&str> = self.active[pos..].iter().map(|(_, n)| n.as_str()).collect();
            cycle.push(func.name());
            return Err(Diagnostic::unsupported(
                format!("cannot compile recursive call graph {}", cycle.join(" -> ")),
                func.def().name.span,
            )
            .with_help("compiled code is statically linked; call it unspecialized instead".to_string()));
        }

        self.active.push((func.id(), func.name().to_string()));
        let result = self.lower_function(func);
        self.active.pop();

        let compiled = Arc::new(result?);
        self.done.insert(func.id(), compiled.clone());
        Ok(compiled)
    }

    fn lower_function(&mut self, func: &Function) -> Result<Compiled, Diagnostic> {
        let def = func.def();
        let mut slots = HashMap::new();
        for (i, param) in func.params().enumerate() {
            slots.insert(param.to_string(), i);
        }
        let mut lowerer = Lowerer {
            namespace: func.namespace()?,
            compiler: self,
            func,
            slots,
            slot_count: def.params.len(),
            callees: Vec::new(),
        };
        for name in bound_names(def).iter().chain(stored_arrays(def).iter()) {
            lowerer.slot_for(name);
        }

        let (body, tail) = lowerer.lower_body(&def.body.node)?;
        let fingerprint = hash_compiled(&func.fingerprint(), &lowerer.callees);
        Ok(Compiled {
            id: next_artifact_id(),
            name: func.name().to_string(),
            arity: func.arity(),
            slot_count: lowerer.slot_count,
            body,
            tail,
            def: Arc::new(def.clone()),
            span: def.name.span,
            callees: lowerer.callees,
            fingerprint,
        })
    }
}

struct Lowerer<'a, 'r> {
    compiler: &'a mut Compiler<'r>,
    func: &'a Function,
    namespace: Namespace,
    slots: HashMap<String, usize>,
    slot_count: usize,
    callees: Vec<(String, ContentHash)>,
}

impl Lowerer<'_, '_> {
    fn slot_for(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = self.slot_count;
        self.slots.insert(name.to_string(), slot);
        self.slot_count += 1;
        slot
    }

    /// Value a local has before its first assignment: the captured or
    /// module-level value of the same name, if there is one.
    fn outer_value(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.func.captures().get(name) {
            return Some(value.clone());
        }
        match self.compiler.resolver.resolve(&self.namespace, name) {
            Some(Global::Const(value)) => Some(value),
            _ => None,
        }
    }

    fn record(&mut self, name: &str, hash: ContentHash) {
        if !self.callees.iter().any(|(n, _)| n == name) {
            self.callees.push((name.to_string(), hash));
        }
    }

    // ─── Blocks and statements ─────────────────────────────────────

    fn lower_body(&mut self, block: &Block) -> Result<(Vec<Exec>, Option<Eval>), Diagnostic> {
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for stmt in &block.stmts {
            stmts.push(self.lower_stmt(stmt)?);
        }
        let tail = match &block.tail_expr {
            Some(tail) => Some(self.lower_expr(tail)?),
            None => None,
        };
        Ok((stmts, tail))
    }

    fn lower_block(&mut self, block: &Block) -> Result<Exec, Diagnostic> {
        let (stmts, tail) = self.lower_body(block)?;
        Ok(Box::new(move |f: &mut Frame| {
            for stmt in &stmts {
                if let Flow::Return(value) = stmt(f)? {
                    return Ok(Flow::Return(value));
                }
            }
            if let Some(tail) = &tail {
                tail(f)?;
            }
            Ok(Flow::Next)
        }))
    }

    fn lower_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<Exec, Diagnostic> {
        let span = stmt.span;
        Ok(match &stmt.node {
            Stmt::Let { pattern, init } => {
                let init = self.lower_expr(init)?;
                match pattern {
                    Pattern::Name(name) => {
                        let slot = self.slot_for(&name.node);
                        Box::new(move |f: &mut Frame| {
                            f.slots[slot] = Some(init(f)?);
                            Ok(Flow::Next)
                        })
                    }
                    Pattern::Tuple(names) => {
                        let slots: Vec<usize> = names.iter().map(|n| self.slot_for(&n.node)).collect();
                        Box::new(move |f: &mut Frame| {
                            let parts = init(f)?.unpack(slots.len()).map_err(|d| d.or_span(span))?;
                            for (slot, part) in slots.iter().zip(parts) {
                                f.slots[*slot] = Some(part);
                            }
                            Ok(Flow::Next)
                        })
                    }
                }
            }
            Stmt::Assign { place, value } => {
                let value = self.lower_expr(value)?;
                let store = self.lower_place(place)?;
                Box::new(move |f: &mut Frame| {
                    let v = value(f)?;
                    store(f, v)?;
                    Ok(Flow::Next)
                })
            }
            Stmt::TupleAssign { places, value } => {
                let value = self.lower_expr(value)?;
                let mut stores = Vec::with_capacity(places.len());
                for place in places {
                    stores.push(self.lower_place(place)?);
                }
                Box::new(move |f: &mut Frame| {
                    let parts = value(f)?.unpack(stores.len()).map_err(|d| d.or_span(span))?;
                    for (store, part) in stores.iter().zip(parts) {
                        store(f, part)?;
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.lower_condition(cond)?;
                let then_block = self.lower_block(&then_block.node)?;
                let else_block = match else_block {
                    Some(block) => Some(self.lower_block(&block.node)?),
                    None => None,
                };
                Box::new(move |f: &mut Frame| {
                    if cond(f)? {
                        then_block(f)
                    } else if let Some(else_block) = &else_block {
                        else_block(f)
                    } else {
                        Ok(Flow::Next)
                    }
                })
            }
            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let slot = self.slot_for(&var.node);
                let (start_span, end_span) = (start.span, end.span);
                let start = self.lower_expr(start)?;
                let end = self.lower_expr(end)?;
                let body = self.lower_block(&body.node)?;
                Box::new(move |f: &mut Frame| {
                    let from = start(f)?.as_index().map_err(|d| d.or_span(start_span))?;
                    let to = end(f)?.as_index().map_err(|d| d.or_span(end_span))?;
                    for i in from..to {
                        f.slots[slot] = Some(Value::Num(i as f64));
                        if let Flow::Return(value) = body(f)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::While { cond, body } => {
                let cond = self.lower_condition(cond)?;
                let body = self.lower_block(&body.node)?;
                Box::new(move |f: &mut Frame| {
                    while cond(f)? {
                        if let Flow::Return(value) = body(f)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::Expr(expr) => {
                let expr = self.lower_expr(expr)?;
                Box::new(move |f: &mut Frame| {
                    expr(f)?;
                    Ok(Flow::Next)
                })
            }
            Stmt::Return(value) => match value {
                Some(expr) => {
                    let expr = self.lower_expr(expr)?;
                    Box::new(move |f: &mut Frame| Ok(Flow::Return(expr(f)?)))
                }
                None => Box::new(|_: &mut Frame| Ok(Flow::Return(Value::Unit))),
            },
        })
    }

    fn lower_place(&mut self, place: &Spanned<Place>) -> Result<Store, Diagnostic> {
        let span = place.span;
        Ok(match &place.node {
            Place::Var(name) => {
                let slot = self.slot_for(name);
                Box::new(move |f: &mut Frame, v: Value| {
                    f.slots[slot] = Some(v);
                    Ok(())
                })
            }
            Place::Discard => Box::new(|_: &mut Frame, _: Value| Ok(())),
            Place::Index { base, index } => {
                let slot = self.slot_for(&base.node);
                let outer = self.outer_value(&base.node);
                let name = base.node.clone();
                let index_span = index.span;
                let index = self.lower_expr(index)?;
                Box::new(move |f: &mut Frame, v: Value| {
                    let i = index(f)?.as_index().map_err(|d| d.or_span(index_span))?;
                    if f.slots[slot].is_none() {
                        match &outer {
                            Some(initial) => f.slots[slot] = Some(initial.clone()),
                            None => return Err(undefined(&name, span)),
                        }
                    }
                    if let Some(target) = f.slots[slot].as_mut() {
                        target.store(i, &v).map_err(|d| d.or_span(span))?;
                    }
                    Ok(())
                })
            }
        })
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn lower_condition(&mut self, cond: &Spanned<Expr>) -> Result<Test, Diagnostic> {
        let span = cond.span;
        let eval = self.lower_expr(cond)?;
        Ok(Box::new(move |f: &mut Frame| eval(f)?.as_bool().map_err(|d| d.or_span(span))))
    }

    fn lower_expr(&mut self, expr: &Spanned<Expr>) -> Result<Eval, Diagnostic> {
        let span = expr.span;
        Ok(match &expr.node {
            Expr::Literal(Literal::Number(n)) => constant(Value::Num(*n)),
            Expr::Literal(Literal::Bool(b)) => constant(Value::Bool(*b)),
            Expr::Var(name) => self.lower_var(name, span)?,
            Expr::Path(path) => match path.0.as_slice() {
                [module, name] => match library::constant(module, name) {
                    Some(value) => constant(value),
                    None => {
                        return Err(Diagnostic::name(
                            format!("`{}` is not a library constant", path),
                            span,
                        ))
                    }
                },
                _ => return Err(Diagnostic::name(format!("unknown path `{}`", path), span)),
            },
            Expr::BinOp { op, lhs, rhs } if matches!(op, BinOp::And | BinOp::Or) => {
                let lhs = self.lower_condition(lhs)?;
                let rhs = self.lower_condition(rhs)?;
                let short = matches!(op, BinOp::Or);
                Box::new(move |f: &mut Frame| {
                    let left = lhs(f)?;
                    if left == short {
                        return Ok(Value::Bool(left));
                    }
                    Ok(Value::Bool(rhs(f)?))
                })
            }
            Expr::BinOp { op, lhs, rhs } => {
                let op = *op;
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                Box::new(move |f: &mut Frame| {
                    let left = lhs(f)?;
                    let right = rhs(f)?;
                    value::binary(op, &left, &right).map_err(|d| d.or_span(span))
                })
            }
            Expr::Unary { op, operand } => {
                let op = *op;
                let operand = self.lower_expr(operand)?;
                Box::new(move |f: &mut Frame| value::unary(op, &operand(f)?).map_err(|d| d.or_span(span)))
            }
            Expr::Call { path, args } => self.lower_call(path, args, span)?,
            Expr::Index { expr: base, index } => {
                let index_span = index.span;
                let base = self.lower_expr(base)?;
                let index = self.lower_expr(index)?;
                Box::new(move |f: &mut Frame| {
                    let b = base(f)?;
                    let i = index(f)?.as_index().map_err(|d| d.or_span(index_span))?;
                    b.index(i).map_err(|d| d.or_span(span))
                })
            }
            Expr::Slice {
                expr: base,
                start,
                end,
            } => {
                let (start_span, end_span) = (start.span, end.span);
                let base = self.lower_expr(base)?;
                let start = self.lower_expr(start)?;
                let end = self.lower_expr(end)?;
                Box::new(move |f: &mut Frame| {
                    let b = base(f)?;
                    let from = start(f)?.as_index().map_err(|d| d.or_span(start_span))?;
                    let to = end(f)?.as_index().map_err(|d| d.or_span(end_span))?;
                    b.slice(from, to).map_err(|d| d.or_span(span))
                })
            }
            Expr::ArrayInit(elements) => {
                let spans: Vec<Span> = elements.iter().map(|e| e.span).collect();
                let elements = self.lower_all(elements)?;
                Box::new(move |f: &mut Frame| {
                    let mut values = Vec::with_capacity(elements.len());
                    for (element, span) in elements.iter().zip(&spans) {
                        values.push(element(f)?.as_num().map_err(|d| d.or_span(*span))?);
                    }
                    Ok(Value::array(values))
                })
            }
            Expr::Tuple(elements) => {
                let elements = self.lower_all(elements)?;
                Box::new(move |f: &mut Frame| Ok(Value::tuple(eval_all(&elements, f)?)))
            }
        })
    }

    fn lower_all(&mut self, exprs: &[Spanned<Expr>]) -> Result<Vec<Eval>, Diagnostic> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_var(&mut self, name: &str, span: Span) -> Result<Eval, Diagnostic> {
        if let Some(&slot) = self.slots.get(name) {
            let outer = self.outer_value(name);
            let name = name.to_string();
            return Ok(Box::new(move |f: &mut Frame| match &f.slots[slot] {
                Some(value) => Ok(value.clone()),
                None => outer.clone().ok_or_else(|| undefined(&name, span)),
            }));
        }
        if let Some(value) = self.func.captures().get(name) {
            return Ok(constant(value.clone()));
        }
        match self.compiler.resolver.resolve(&self.namespace, name) {
            Some(Global::Const(value)) => Ok(constant(value)),
            Some(Global::Callable(callable)) => Err(Diagnostic::type_error(
                format!("{} cannot be used as a value", callable.describe()),
                span,
            )),
            None => Err(undefined(name, span)),
        }
    }

    fn lower_call(
        &mut self,
        path: &Spanned<crate::ast::ModulePath>,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<Eval, Diagnostic> {
        let target = match path.node.0.as_slice() {
            [name] => self.link(name, path.span)?,
            [module, name] => match library::lookup(module, name) {
                Some(native) => Target::Native(native),
                None => {
                    return Err(Diagnostic::name(
                        format!("`{}` is not a library function", path.node),
                        path.span,
                    )
                    .with_help(format!("library modules are: {}", library::MODULES.join(", "))))
                }
            },
            _ => {
                return Err(Diagnostic::name(
                    format!("unknown function path `{}`", path.node),
                    path.span,
                ))
            }
        };
        let args = self.lower_all(args)?;
        Ok(match target {
            Target::Native(native) => Box::new(move |f: &mut Frame| {
                let values = eval_all(&args, f)?;
                native.call(&values).map_err(|d| d.or_span(span))
            }),
            Target::Compiled(compiled) => Box::new(move |f: &mut Frame| {
                let values = eval_all(&args, f)?;
                compiled.call(&values).map_err(|d| d.or_span(span))
            }),
        })
    }

    /// Resolve an unqualified call target now, compiling it if needed.
    fn link(&mut self, name: &str, span: Span) -> Result<Target, Diagnostic> {
        let target = match self.compiler.resolver.resolve(&self.namespace, name) {
            Some(Global::Callable(callable)) => match &callable {
                Callable::Native(native) => Target::Native(*native),
                Callable::Compiled(compiled) => Target::Compiled(compiled.clone()),
                Callable::Function(func) => Target::Compiled(self.compile_callee(func)?),
                Callable::Gateway(gateway) => Target::Compiled(self.compile_callee(gateway.function())?),
                Callable::Partial(_) => {
                    return Err(Diagnostic::unsupported(
                        format!("cannot link {} into compiled code", callable.describe()),
                        span,
                    ))
                }
            },
            Some(Global::Const(value)) => {
                return Err(Diagnostic::type_error(
                    format!("`{}` is a {}, not a function", name, value.type_name()),
                    span,
                ))
            }
            None => match builtins::lookup(name) {
                Some(native) => Target::Native(native),
                None => {
                    return Err(Diagnostic::name(
                        format!("function `{}` is not defined", name),
                        span,
                    ))
                }
            },
        };
        self.record(name, target.fingerprint());
        Ok(target)
    }

    fn compile_callee(&mut self, func: &Arc<Function>) -> Result<Arc<Compiled>, Diagnostic> {
        let caller = self.func.name().to_string();
        self.compiler
            .compile(func)
            .map_err(|d| d.with_note(format!("while compiling `{}`", caller)))
    }
}

fn constant(value: Value) -> Eval {
    Box::new(move |_: &mut Frame| Ok(value.clone()))
}

fn eval_all(args: &[Eval], f: &mut Frame) -> Result<Vec<Value>, Diagnostic> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(arg(f)?);
    }
    Ok(values)
}

fn undefined(name: &str, span: Span) -> Diagnostic {
    Diagnostic::name(format!("name `{}` is not defined", name), span)
}

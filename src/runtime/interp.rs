//! Tree-walking interpreter: the unspecialized execution path.
//!
//! Globals are resolved late, at the moment a name is evaluated, in the
//! order: locals, captured values, the function's namespace, builtins.
//! A namespace entry that is an `@fs` gateway is called as its underlying
//! function. Nothing here is specialized or compiled.

use std::collections::HashMap;

use super::builtins;
use super::function::{Callable, Function, Origin};
use super::library;
use super::namespace::{Global, Namespace};
use super::value::{self, Value};
use crate::ast::{BinOp, Block, Expr, FnDef, Literal, Pattern, Place, Stmt};
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

pub struct Interpreter {
    depth: usize,
    max_depth: usize,
}

struct Frame<'f> {
    func: &'f Function,
    namespace: Namespace,
    locals: HashMap<String, Value>,
}

enum Flow {
    Next,
    Return(Value),
}

impl Interpreter {
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub fn call_function(&mut self, func: &Function, args: &[Value]) -> Result<Value, Diagnostic> {
        if args.len() != func.arity() {
            return Err(Diagnostic::type_error(
                format!(
                    "`{}` takes {} argument(s), {} given",
                    func.name(),
                    func.arity(),
                    args.len()
                ),
                func.def().name.span,
            ));
        }
        if self.depth >= self.max_depth {
            return Err(Diagnostic::runtime(
                format!("maximum recursion depth ({}) exceeded", self.max_depth),
                func.def().name.span,
            ));
        }

        let mut frame = Frame {
            func,
            namespace: func.namespace()?,
            locals: func.params().map(str::to_string).zip(args.iter().cloned()).collect(),
        };

        self.depth += 1;
        let result = self.eval_body(&mut frame, &func.def().body.node);
        self.depth -= 1;
        result
    }

    fn eval_body(&mut self, frame: &mut Frame, block: &Block) -> Result<Value, Diagnostic> {
        if let Flow::Return(value) = self.exec_stmts(frame, block)? {
            return Ok(value);
        }
        match &block.tail_expr {
            Some(tail) => self.eval(frame, tail),
            None => Ok(Value::Unit),
        }
    }

    /// Run a nested block; its tail expression is evaluated and dropped.
    fn exec_block(&mut self, frame: &mut Frame, block: &Block) -> Result<Flow, Diagnostic> {
        if let Flow::Return(value) = self.exec_stmts(frame, block)? {
            return Ok(Flow::Return(value));
        }
        if let Some(tail) = &block.tail_expr {
            self.eval(frame, tail)?;
        }
        Ok(Flow::Next)
    }

    fn exec_stmts(&mut self, frame: &mut Frame, block: &Block) -> Result<Flow, Diagnostic> {
        for stmt in &block.stmts {
            if let Flow::Return(value) = self.exec_stmt(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Spanned<Stmt>) -> Result<Flow, Diagnostic> {
        match &stmt.node {
            Stmt::Let { pattern, init } => {
                let value = self.eval(frame, init)?;
                match pattern {
                    Pattern::Name(name) => {
                        frame.locals.insert(name.node.clone(), value);
                    }
                    Pattern::Tuple(names) => {
                        let parts = value.unpack(names.len()).map_err(|d| d.or_span(stmt.span))?;
                        for (name, part) in names.iter().zip(parts) {
                            frame.locals.insert(name.node.clone(), part);
                        }
                    }
                }
            }
            Stmt::Assign { place, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, place, value)?;
            }
            Stmt::TupleAssign { places, value } => {
                let value = self.eval(frame, value)?;
                let parts = value.unpack(places.len()).map_err(|d| d.or_span(stmt.span))?;
                for (place, part) in places.iter().zip(parts) {
                    self.assign(frame, place, part)?;
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let taken = self.eval_condition(frame, cond)?;
                if taken {
                    return self.exec_block(frame, &then_block.node);
                } else if let Some(else_block) = else_block {
                    return self.exec_block(frame, &else_block.node);
                }
            }
            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let from = self.eval(frame, start)?.as_index().map_err(|d| d.or_span(start.span))?;
                let to = self.eval(frame, end)?.as_index().map_err(|d| d.or_span(end.span))?;
                for i in from..to {
                    frame.locals.insert(var.node.clone(), Value::Num(i as f64));
                    if let Flow::Return(value) = self.exec_block(frame, &body.node)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_condition(frame, cond)? {
                    if let Flow::Return(value) = self.exec_block(frame, &body.node)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn eval_condition(&mut self, frame: &mut Frame, cond: &Spanned<Expr>) -> Result<bool, Diagnostic> {
        self.eval(frame, cond)?
            .as_bool()
            .map_err(|d| d.or_span(cond.span))
    }

    fn assign(&mut self, frame: &mut Frame, place: &Spanned<Place>, value: Value) -> Result<(), Diagnostic> {
        match &place.node {
            Place::Var(name) => {
                frame.locals.insert(name.clone(), value);
            }
            Place::Discard => {}
            Place::Index { base, index } => {
                let index = self.eval(frame, index)?.as_index().map_err(|d| d.or_span(index.span))?;
                // Storing into a captured or global array copies it into a local.
                if !frame.locals.contains_key(&base.node) {
                    let current = self.lookup_var(frame, &base.node, base.span)?;
                    frame.locals.insert(base.node.clone(), current);
                }
                if let Some(target) = frame.locals.get_mut(&base.node) {
                    target
                        .store(index, &value)
                        .map_err(|d| d.or_span(place.span))?;
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Spanned<Expr>) -> Result<Value, Diagnostic> {
        let span = expr.span;
        match &expr.node {
            Expr::Literal(Literal::Number(n)) => Ok(Value::Num(*n)),
            Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            Expr::Var(name) => self.lookup_var(frame, name, span),
            Expr::Path(path) => match path.0.as_slice() {
                [module, name] => library::constant(module, name).ok_or_else(|| {
                    Diagnostic::name(format!("`{}` is not a library constant", path), span)
                }),
                _ => Err(Diagnostic::name(format!("unknown path `{}`", path), span)),
            },
            Expr::BinOp { op, lhs, rhs } => {
                // && and || short-circuit
                if matches!(op, BinOp::And | BinOp::Or) {
                    let left = self.eval_condition(frame, lhs)?;
                    if left == matches!(op, BinOp::Or) {
                        return Ok(Value::Bool(left));
                    }
                    return Ok(Value::Bool(self.eval_condition(frame, rhs)?));
                }
                let left = self.eval(frame, lhs)?;
                let right = self.eval(frame, rhs)?;
                value::binary(*op, &left, &right).map_err(|d| d.or_span(span))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                value::unary(*op, &operand).map_err(|d| d.or_span(span))
            }
            Expr::Call { path, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                self.call_path(frame, &path.node.0, &values, path.span)
                    .map_err(|d| d.or_span(span))
            }
            Expr::Index { expr: base, index } => {
                let base = self.eval(frame, base)?;
                let index = self.eval(frame, index)?.as_index().map_err(|d| d.or_span(index.span))?;
                base.index(index).map_err(|d| d.or_span(span))
            }
            Expr::Slice {
                expr: base,
                start,
                end,
            } => {
                let base = self.eval(frame, base)?;
                let start = self.eval(frame, start)?.as_index().map_err(|d| d.or_span(start.span))?;
                let end = self.eval(frame, end)?.as_index().map_err(|d| d.or_span(end.span))?;
                base.slice(start, end).map_err(|d| d.or_span(span))
            }
            Expr::ArrayInit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval(frame, element)?;
                    values.push(value.as_num().map_err(|d| d.or_span(element.span))?);
                }
                Ok(Value::array(values))
            }
            Expr::Tuple(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(frame, element)?);
                }
                Ok(Value::tuple(values))
            }
        }
    }

    fn lookup_var(&self, frame: &Frame, name: &str, span: Span) -> Result<Value, Diagnostic> {
        if let Some(value) = frame.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = frame.func.captures().get(name) {
            return Ok(value.clone());
        }
        match frame.namespace.get(name) {
            Some(Global::Const(value)) => Ok(value),
            Some(Global::Callable(callable)) => Err(Diagnostic::type_error(
                format!("{} cannot be used as a value", callable.describe()),
                span,
            )),
            None => Err(Diagnostic::name(format!("name `{}` is not defined", name), span)),
        }
    }

    fn call_path(
        &mut self,
        frame: &Frame,
        path: &[String],
        args: &[Value],
        span: Span,
    ) -> Result<Value, Diagnostic> {
        match path {
            [name] => match frame.namespace.get(name) {
                Some(Global::Callable(callable)) => self.call_callable(&callable, args),
                Some(Global::Const(value)) => Err(Diagnostic::type_error(
                    format!("`{}` is a {}, not a function", name, value.type_name()),
                    span,
                )),
                None => match builtins::lookup(name) {
                    Some(native) => native.call(args),
                    None => Err(Diagnostic::name(
                        format!("function `{}` is not defined", name),
                        span,
                    )),
                },
            },
            [module, name] => match library::lookup(module, name) {
                Some(native) => native.call(args),
                None => Err(Diagnostic::name(
                    format!("`{}.{}` is not a library function", module, name),
                    span,
                )
                .with_help(format!(
                    "library modules are: {}",
                    library::MODULES.join(", ")
                ))),
            },
            _ => Err(Diagnostic::name(
                format!("unknown function path `{}`", path.join(".")),
                span,
            )),
        }
    }

    fn call_callable(&mut self, callable: &Callable, args: &[Value]) -> Result<Value, Diagnostic> {
        match callable {
            Callable::Function(func) => self.call_function(func, args),
            Callable::Gateway(gateway) => self.call_function(gateway.function(), args),
            other => other.call(args),
        }
    }
}

/// Evaluate a `const` initializer against a namespace.
pub fn eval_const(expr: &Spanned<Expr>, namespace: &Namespace) -> Result<Value, Diagnostic> {
    let def = FnDef {
        decorators: Vec::new(),
        name: Spanned::dummy("<const>".to_string()),
        params: Vec::new(),
        body: Spanned::dummy(Block {
            stmts: Vec::new(),
            tail_expr: Some(Box::new(expr.clone())),
        }),
    };
    let func = Function::new(def, Origin::Interactive, namespace);
    func.call(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> (Namespace, Vec<Function>) {
        let file = crate::parse_source_silent(source, "test.fst").unwrap();
        let ns = Namespace::new("test");
        let mut funcs = Vec::new();
        for def in file.functions() {
            let func = Function::new(def.clone(), Origin::Interactive, &ns);
            funcs.push(func);
        }
        for def in file.functions() {
            let func = std::sync::Arc::new(Function::new(def.clone(), Origin::Interactive, &ns));
            ns.define(def.name.node.as_str(), Global::Callable(Callable::Function(func)));
        }
        (ns, funcs)
    }

    fn run(source: &str, name: &str, args: &[Value]) -> Result<Value, Diagnostic> {
        let (_ns, funcs) = load(source);
        let func = funcs.iter().find(|f| f.name() == name).unwrap();
        func.call(args)
    }

    #[test]
    fn test_late_binding_through_namespace() {
        let source = "fn child(x) { x * x }\nfn parent(a) { child(2 * a) }";
        let (ns, funcs) = load(source);
        let parent = &funcs[1];
        assert_eq!(parent.call(&[Value::Num(2.0)]).unwrap(), Value::Num(16.0));

        let cube = crate::parse_source_silent("fn child(x) { x * x * x }", "cube.fst").unwrap();
        let cube = Function::new(cube.functions().next().unwrap().clone(), Origin::Interactive, &ns);
        ns.define("child", Global::Callable(Callable::Function(std::sync::Arc::new(cube))));
        assert_eq!(parent.call(&[Value::Num(2.0)]).unwrap(), Value::Num(64.0));
    }

    #[test]
    fn test_loops_and_early_return() {
        let source = "fn first_above(xs, t) {\n    for i in 0..len(xs) {\n        if xs[i] > t { return i }\n    }\n    -1\n}";
        let xs = Value::from(vec![1.0, 5.0, 9.0]);
        assert_eq!(
            run(source, "first_above", &[xs.clone(), Value::Num(4.0)]).unwrap(),
            Value::Num(1.0)
        );
        assert_eq!(
            run(source, "first_above", &[xs, Value::Num(10.0)]).unwrap(),
            Value::Num(-1.0)
        );
    }

    #[test]
    fn test_while_and_tuple_assign() {
        let source = "fn fib(n) {\n    let (a, b) = (0, 1)\n    let i = 0\n    while i < n {\n        (a, b) = (b, a + b)\n        i = i + 1\n    }\n    a\n}";
        assert_eq!(run(source, "fib", &[Value::Num(10.0)]).unwrap(), Value::Num(55.0));
    }

    #[test]
    fn test_indexed_store_does_not_alias_argument() {
        let source = "fn bump(xs) { xs[0] = xs[0] + 1\n xs }";
        let input = Value::from(vec![1.0, 2.0]);
        let out = run(source, "bump", &[input.clone()]).unwrap();
        assert_eq!(out, Value::from(vec![2.0, 2.0]));
        assert_eq!(input, Value::from(vec![1.0, 2.0]));
    }

    #[test]
    fn test_short_circuit() {
        let source = "fn f(x) { x > 0 && missing(x) }";
        assert_eq!(run(source, "f", &[Value::Num(-1.0)]).unwrap(), Value::Bool(false));
        let err = run(source, "f", &[Value::Num(1.0)]).unwrap_err();
        assert!(err.message.contains("`missing` is not defined"));
    }

    #[test]
    fn test_recursion_limit() {
        let (ns, funcs) = load("fn down(n) { if n > 0 { return down(n - 1) }\n 0 }");
        ns.set_max_recursion(50);
        assert_eq!(funcs[0].call(&[Value::Num(10.0)]).unwrap(), Value::Num(0.0));
        let err = funcs[0].call(&[Value::Num(100.0)]).unwrap_err();
        assert!(err.message.contains("maximum recursion depth"));
    }

    #[test]
    fn test_library_calls_and_constants() {
        let source = "fn f(x) { math.floor(x * math.pi) }";
        assert_eq!(run(source, "f", &[Value::Num(1.0)]).unwrap(), Value::Num(3.0));
        let err = run("fn g(x) { math.nope(x) }", "g", &[Value::Num(1.0)]).unwrap_err();
        assert!(err.message.contains("not a library function"));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("fn f(a, b) { a + b }", "f", &[Value::Num(1.0)]).unwrap_err();
        assert!(err.message.contains("takes 2 argument(s), 1 given"));
    }

    #[test]
    fn test_eval_const_sees_namespace() {
        let ns = Namespace::new("consts");
        ns.define("K", Global::Const(Value::Num(2.0)));
        let file = crate::parse_source_silent("const J = K * math.e", "c.fst").unwrap();
        let crate::ast::Item::Const(def) = &file.items[0].node else {
            panic!("expected const");
        };
        let value = eval_const(&def.value, &ns).unwrap();
        assert_eq!(value, Value::Num(2.0 * std::f64::consts::E));
    }
}

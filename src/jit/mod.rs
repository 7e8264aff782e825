//! Compilation of Function Units into closure trees.
//!
//! A compiled artifact links every global it touches at compile time:
//! callees, module constants, and captured values are resolved once and
//! baked into the closures, so a running artifact never reads a namespace.
//! Rebinding a global after compilation has no effect on artifacts that
//! already exist; that is the property the specializer relies on.
//!
//! Callees are compiled transitively. A call graph that reaches itself is
//! rejected, since an artifact cannot link against one still being built.

mod lower;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ast::FnDef;
use crate::diagnostic::Diagnostic;
use crate::hash::ContentHash;
use crate::runtime::{Callable, Function, Global, Namespace, Value};
use crate::span::Span;

pub(crate) use lower::Compiler;

/// How the compiler finds what an unqualified name is bound to.
///
/// The direct resolver reads the function's namespace. During a
/// specialization pass the resolver is the pass environment, which layers
/// the pass's private bindings over the namespace.
pub trait Resolve {
    fn resolve(&self, namespace: &Namespace, name: &str) -> Option<Global>;
}

/// Resolve straight through the namespace.
pub struct Direct;

impl Resolve for Direct {
    fn resolve(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        namespace.get(name)
    }
}

// ─── Artifacts ─────────────────────────────────────────────────────

pub(crate) enum Flow {
    Next,
    Return(Value),
}

/// Local slots of one activation.
pub(crate) struct Frame {
    pub(crate) slots: Vec<Option<Value>>,
}

pub(crate) type Eval = Box<dyn Fn(&mut Frame) -> Result<Value, Diagnostic> + Send + Sync>;
pub(crate) type Exec = Box<dyn Fn(&mut Frame) -> Result<Flow, Diagnostic> + Send + Sync>;

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_artifact_id() -> u64 {
    NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A compiled function: statically linked, callable from any thread.
pub struct Compiled {
    id: u64,
    name: String,
    arity: usize,
    slot_count: usize,
    body: Vec<Exec>,
    tail: Option<Eval>,
    def: Arc<FnDef>,
    span: Span,
    callees: Vec<(String, ContentHash)>,
    fingerprint: ContentHash,
}

impl Compiled {
    /// Unique per artifact, never reused.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The definition this artifact was compiled from.
    pub fn def(&self) -> &FnDef {
        &self.def
    }

    /// Names this artifact linked against, with the fingerprint of what
    /// each resolved to, in first-call order.
    pub fn callees(&self) -> &[(String, ContentHash)] {
        &self.callees
    }

    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        if args.len() != self.arity {
            return Err(Diagnostic::type_error(
                format!(
                    "`{}` takes {} argument(s), {} given",
                    self.name,
                    self.arity,
                    args.len()
                ),
                self.span,
            ));
        }
        let mut frame = Frame {
            slots: vec![None; self.slot_count],
        };
        for (slot, arg) in frame.slots.iter_mut().zip(args) {
            *slot = Some(arg.clone());
        }
        for stmt in &self.body {
            if let Flow::Return(value) = stmt(&mut frame)? {
                return Ok(value);
            }
        }
        match &self.tail {
            Some(tail) => tail(&mut frame),
            None => Ok(Value::Unit),
        }
    }
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<compiled {} {}>", self.name, self.fingerprint)
    }
}

// ─── Entry points ──────────────────────────────────────────────────

/// Compile a function, resolving its globals through `resolver`.
pub fn compile(func: &Arc<Function>, resolver: &dyn Resolve) -> Result<Arc<Compiled>, Diagnostic> {
    Compiler::new(resolver).compile(func)
}

/// The compile adapter: turn a replacement into something compiled code
/// can link against.
///
/// Compiled artifacts and natives come back as the same object. A plain
/// Function Unit is compiled against its namespace. Anything else is
/// rejected.
pub fn convert(callable: &Callable) -> Result<Callable, Diagnostic> {
    convert_in(callable, &Direct)
}

/// [`convert`] with an explicit resolver for the compiled unit's globals.
pub fn convert_in(callable: &Callable, resolver: &dyn Resolve) -> Result<Callable, Diagnostic> {
    match callable {
        Callable::Compiled(_) | Callable::Native(_) => Ok(callable.clone()),
        Callable::Function(func) => Ok(Callable::Compiled(compile(func, resolver)?)),
        Callable::Gateway(_) | Callable::Partial(_) => Err(Diagnostic::type_error(
            format!("cannot compile {}: not a plain function", callable.describe()),
            Span::dummy(),
        )
        .with_help("pass the function itself, without @fs or bound overrides".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorKind;
    use crate::runtime::Origin;

    fn load(source: &str) -> Namespace {
        let file = crate::parse_source_silent(source, "test.fst").unwrap();
        let ns = Namespace::new("test");
        for def in file.functions() {
            let func = Arc::new(Function::new(def.clone(), Origin::Interactive, &ns));
            ns.define(&def.name.node, Global::Callable(Callable::Function(func)));
        }
        ns
    }

    fn function(ns: &Namespace, name: &str) -> Arc<Function> {
        match ns.get(name) {
            Some(Global::Callable(Callable::Function(func))) => func,
            other => panic!("`{}` is {:?}", name, other.map(|_| "not a function")),
        }
    }

    #[test]
    fn test_compiled_matches_interpreter() {
        let ns = load(
            "fn sq(x) { x * x }\nfn sum_sq(xs) {\n    let total = 0\n    for i in 0..len(xs) { total = total + sq(xs[i]) }\n    total\n}",
        );
        let func = function(&ns, "sum_sq");
        let xs = Value::from(vec![1.0, 2.0, 3.0]);
        let compiled = compile(&func, &Direct).unwrap();
        assert_eq!(compiled.call(&[xs.clone()]).unwrap(), Value::Num(14.0));
        assert_eq!(func.call(&[xs]).unwrap(), Value::Num(14.0));
    }

    #[test]
    fn test_globals_frozen_at_compile_time() {
        let ns = load("fn child(x) { x * x }\nfn parent(a) { child(2 * a) }");
        let compiled = compile(&function(&ns, "parent"), &Direct).unwrap();

        let cube = load("fn child(x) { x * x * x }");
        ns.define("child", cube.get("child").unwrap());
        assert_eq!(compiled.call(&[Value::Num(2.0)]).unwrap(), Value::Num(16.0));
        let recompiled = compile(&function(&ns, "parent"), &Direct).unwrap();
        assert_eq!(recompiled.call(&[Value::Num(2.0)]).unwrap(), Value::Num(64.0));
        assert_ne!(compiled.fingerprint(), recompiled.fingerprint());
    }

    #[test]
    fn test_recursion_rejected() {
        let ns = load("fn down(n) { if n > 0 { return down(n - 1) }\n 0 }");
        let err = compile(&function(&ns, "down"), &Direct).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert!(err.message.contains("recursive"));
    }

    #[test]
    fn test_unresolved_name_is_compile_error() {
        let ns = load("fn f(x) { if x > 0 { return helper(x) }\n x }");
        let err = compile(&function(&ns, "f"), &Direct).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Name);
        assert!(err.message.contains("`helper`"));
    }

    #[test]
    fn test_tuple_and_index_store() {
        let ns = load(
            "fn f(xs) {\n    let (a, b) = (xs[0], xs[1])\n    (a, b) = (b, a)\n    xs[0] = a\n    xs[1] = b\n    xs\n}",
        );
        let compiled = compile(&function(&ns, "f"), &Direct).unwrap();
        let input = Value::from(vec![1.0, 2.0]);
        assert_eq!(compiled.call(&[input.clone()]).unwrap(), Value::from(vec![2.0, 1.0]));
        assert_eq!(input, Value::from(vec![1.0, 2.0]));
    }

    #[test]
    fn test_captures_are_baked_in() {
        let ns = load("fn scale(x) { x * k }");
        let func = function(&ns, "scale");
        let mut captures = std::collections::BTreeMap::new();
        captures.insert("k".to_string(), Value::Num(3.0));
        let closed = Arc::new(func.with_captures(captures));
        let compiled = compile(&closed, &Direct).unwrap();
        assert_eq!(compiled.call(&[Value::Num(2.0)]).unwrap(), Value::Num(6.0));
    }

    #[test]
    fn test_convert_identity_and_rejection() {
        let ns = load("fn f(x) { x }");
        let compiled = Callable::Compiled(compile(&function(&ns, "f"), &Direct).unwrap());
        assert!(convert(&compiled).unwrap().ptr_eq(&compiled));

        let erf = Callable::Native(crate::runtime::library::lookup("math", "erf").unwrap());
        assert!(convert(&erf).unwrap().ptr_eq(&erf));

        let plain = Callable::Function(function(&ns, "f"));
        assert!(matches!(convert(&plain).unwrap(), Callable::Compiled(_)));
    }

    #[test]
    fn test_arity_checked() {
        let ns = load("fn f(a, b) { a + b }");
        let compiled = compile(&function(&ns, "f"), &Direct).unwrap();
        let err = compiled.call(&[Value::Num(1.0)]).unwrap_err();
        assert!(err.message.contains("takes 2 argument(s), 1 given"));
    }
}

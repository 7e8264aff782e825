//! Function Units and the callables a namespace can bind.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::interp::Interpreter;
use super::library::Native;
use super::namespace::{Namespace, WeakNamespace};
use super::value::Value;
use crate::ast::FnDef;
use crate::diagnostic::Diagnostic;
use crate::hash::{hash_fn, hash_native, ContentHash, Fingerprint};
use crate::jit::Compiled;
use crate::span::Span;
use crate::specialize::{Partial, Specialized};

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Source text a set of definitions was loaded from.
#[derive(Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// Where a function's structural form can be recovered from.
#[derive(Clone, Debug)]
pub enum Origin {
    /// Defined in a loaded file; `span` covers the whole item.
    Source { file: Arc<SourceFile>, span: Span },
    /// Defined through `Module::eval_interactive`; no source is kept.
    Interactive,
}

/// A named, pure function with a body, closed-over values, and the
/// namespace it resolves unqualified names against.
pub struct Function {
    id: u64,
    def: Arc<FnDef>,
    origin: Origin,
    namespace: WeakNamespace,
    captures: BTreeMap<String, Value>,
    fingerprint: ContentHash,
}

impl Function {
    pub fn new(def: FnDef, origin: Origin, namespace: &Namespace) -> Self {
        Self::assemble(Arc::new(def), origin, namespace.downgrade(), BTreeMap::new())
    }

    fn assemble(
        def: Arc<FnDef>,
        origin: Origin,
        namespace: WeakNamespace,
        captures: BTreeMap<String, Value>,
    ) -> Self {
        let mut fp = Fingerprint::key();
        fp.write_hash(&hash_fn(&def))
            .write_u64(captures.len() as u64);
        for (name, value) in &captures {
            fp.write_str(name).write_value(value);
        }
        Self {
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            def,
            origin,
            namespace,
            captures,
            fingerprint: fp.finish(),
        }
    }

    /// A new unit with a different body and the same origin, namespace,
    /// and captured values.
    pub(crate) fn rebuilt(&self, def: FnDef) -> Self {
        Self::assemble(
            Arc::new(def),
            self.origin.clone(),
            self.namespace.clone(),
            self.captures.clone(),
        )
    }

    /// A copy closing over `captures`, the way a nested definition closes
    /// over its enclosing scope. Captured names shadow namespace globals.
    pub fn with_captures(&self, captures: BTreeMap<String, Value>) -> Self {
        Self::assemble(
            self.def.clone(),
            self.origin.clone(),
            self.namespace.clone(),
            captures,
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.def.name.node
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.def.params.iter().map(|p| p.node.as_str())
    }

    pub fn arity(&self) -> usize {
        self.def.params.len()
    }

    pub fn def(&self) -> &FnDef {
        &self.def
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn namespace(&self) -> Result<Namespace, Diagnostic> {
        self.namespace.upgrade().map_err(|d| d.or_span(self.def.name.span))
    }

    pub fn captures(&self) -> &BTreeMap<String, Value> {
        &self.captures
    }

    /// Fingerprint of the body and captured values.
    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    /// Run the function through the interpreter.
    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        let limit = self.namespace()?.max_recursion();
        Interpreter::new(limit).call_function(self, args)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function {} #{}>", self.name(), self.id)
    }
}

// ─── Callables ─────────────────────────────────────────────────────

/// Anything a namespace entry or a substitution table can hold.
#[derive(Clone)]
pub enum Callable {
    /// A plain, specializable Function Unit.
    Function(Arc<Function>),
    /// A compiled artifact.
    Compiled(Arc<Compiled>),
    /// A builtin or library primitive.
    Native(&'static Native),
    /// An `@fs` function wrapped in a specialization gateway.
    Gateway(Arc<Specialized>),
    /// A gateway with pre-bound overrides.
    Partial(Arc<Partial>),
}

impl Callable {
    pub fn kind(&self) -> &'static str {
        match self {
            Callable::Function(_) => "function",
            Callable::Compiled(_) => "compiled function",
            Callable::Native(_) => "native function",
            Callable::Gateway(_) => "specialized function",
            Callable::Partial(_) => "partial function",
        }
    }

    /// The callable's own declared name.
    pub fn name(&self) -> &str {
        match self {
            Callable::Function(func) => func.name(),
            Callable::Compiled(compiled) => compiled.name(),
            Callable::Native(native) => native.name,
            Callable::Gateway(gateway) => gateway.function().name(),
            Callable::Partial(partial) => partial.gateway().function().name(),
        }
    }

    /// "function `cube`", used in messages.
    pub fn describe(&self) -> String {
        format!("{} `{}`", self.kind(), self.name())
    }

    pub fn fingerprint(&self) -> ContentHash {
        match self {
            Callable::Function(func) => func.fingerprint(),
            Callable::Compiled(compiled) => compiled.fingerprint(),
            Callable::Native(native) => hash_native(native.name),
            Callable::Gateway(gateway) => gateway.function().fingerprint(),
            Callable::Partial(partial) => partial.fingerprint(),
        }
    }

    /// Same object, not merely equal behavior.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Arc::ptr_eq(a, b),
            (Callable::Compiled(a), Callable::Compiled(b)) => Arc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => std::ptr::eq(*a, *b),
            (Callable::Gateway(a), Callable::Gateway(b)) => Arc::ptr_eq(a, b),
            (Callable::Partial(a), Callable::Partial(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Call with positional arguments and no overrides.
    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        match self {
            Callable::Function(func) => func.call(args),
            Callable::Compiled(compiled) => compiled.call(args),
            Callable::Native(native) => native.call(args),
            Callable::Gateway(gateway) => gateway.call_plain(args),
            Callable::Partial(partial) => partial.call(args),
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.describe())
    }
}

impl From<Arc<Function>> for Callable {
    fn from(func: Arc<Function>) -> Self {
        Callable::Function(func)
    }
}

impl From<Arc<Compiled>> for Callable {
    fn from(compiled: Arc<Compiled>) -> Self {
        Callable::Compiled(compiled)
    }
}

impl From<Arc<Specialized>> for Callable {
    fn from(gateway: Arc<Specialized>) -> Self {
        Callable::Gateway(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fn(source: &str) -> FnDef {
        let file = crate::parse_source_silent(source, "test.fst").unwrap();
        let def = file.functions().next().unwrap().clone();
        def
    }

    #[test]
    fn test_rebuilt_gets_new_identity_same_context() {
        let ns = Namespace::new("m");
        let func = Function::new(parse_fn("fn f(x) { x * k }"), Origin::Interactive, &ns);
        let mut captures = BTreeMap::new();
        captures.insert("k".to_string(), Value::Num(3.0));
        let closed = func.with_captures(captures);
        let rebuilt = closed.rebuilt(parse_fn("fn f(x) { x * k + 1 }"));

        assert_ne!(closed.id(), rebuilt.id());
        assert_eq!(rebuilt.captures().get("k"), Some(&Value::Num(3.0)));
        assert!(rebuilt.namespace().unwrap().ptr_eq(&ns));
        assert_ne!(func.fingerprint(), closed.fingerprint());
        assert_ne!(closed.fingerprint(), rebuilt.fingerprint());
    }

    #[test]
    fn test_call_after_namespace_dropped_fails() {
        let ns = Namespace::new("m");
        let func = Function::new(parse_fn("fn f(x) { x }"), Origin::Interactive, &ns);
        drop(ns);
        let err = func.call(&[Value::Num(1.0)]).unwrap_err();
        assert!(err.message.contains("no longer exists"));
    }

    #[test]
    fn test_native_identity() {
        let erf = Callable::Native(crate::runtime::library::lookup("math", "erf").unwrap());
        let again = Callable::Native(crate::runtime::library::lookup("math", "erf").unwrap());
        assert!(erf.ptr_eq(&again));
        assert_eq!(erf.describe(), "native function `math.erf`");
    }
}

//! Modules: loading `.fst` source into a namespace.

use std::path::Path;
use std::sync::Arc;

use super::function::{Callable, Function, Origin, SourceFile};
use super::interp::eval_const;
use super::library;
use super::namespace::{Global, Namespace};
use super::value::Value;
use crate::ast::{File, Item};
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::specialize::{Engine, Specialized};

/// A loaded module: a namespace plus the engine its gateways run under.
pub struct Module {
    namespace: Namespace,
    engine: Arc<Engine>,
    sources: Vec<Arc<SourceFile>>,
}

impl Module {
    /// An empty module.
    pub fn new(engine: &Arc<Engine>, name: &str) -> Self {
        let namespace = Namespace::new(name);
        namespace.set_max_recursion(engine.config().max_recursion);
        Self {
            namespace,
            engine: engine.clone(),
            sources: Vec::new(),
        }
    }

    /// Parse `source` and define its items in a fresh module.
    pub fn load(engine: &Arc<Engine>, name: &str, source: &str) -> Result<Self, Vec<Diagnostic>> {
        let mut module = Self::new(engine, name);
        module.extend(&format!("{}.fst", name), source)?;
        Ok(module)
    }

    /// Load a module from a file; the module is named after the file stem.
    pub fn load_file(engine: &Arc<Engine>, path: &Path) -> Result<Self, Vec<Diagnostic>> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            vec![Diagnostic::error(
                format!("cannot read '{}': {}", path.display(), e),
                Span::dummy(),
            )]
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();
        let mut module = Self::new(engine, &name);
        module.extend(&path.display().to_string(), &text)?;
        Ok(module)
    }

    /// Parse more source into this module. Returns the names defined.
    pub fn extend(&mut self, filename: &str, source: &str) -> Result<Vec<String>, Vec<Diagnostic>> {
        let file = crate::parse_source_silent(source, filename)?;
        let source_file = Arc::new(SourceFile {
            name: filename.to_string(),
            text: source.to_string(),
        });
        let origin = |span: Span| Origin::Source {
            file: source_file.clone(),
            span,
        };
        let names = self.define_items(&file, origin)?;
        self.sources.push(source_file);
        Ok(names)
    }

    /// Define items from source that is not kept. Functions defined this
    /// way can be called and compiled but not specialized.
    pub fn eval_interactive(&self, source: &str) -> Result<Vec<String>, Vec<Diagnostic>> {
        let file = crate::parse_source_silent(source, "<interactive>")?;
        self.define_items(&file, |_| Origin::Interactive)
    }

    fn define_items(
        &self,
        file: &File,
        origin: impl Fn(Span) -> Origin,
    ) -> Result<Vec<String>, Vec<Diagnostic>> {
        let mut errors = Vec::new();
        let mut names = Vec::new();

        // Functions and imports first, so constants may call them.
        for item in &file.items {
            match &item.node {
                Item::Fn(def) => {
                    let func = Arc::new(Function::new(def.clone(), origin(item.span), &self.namespace));
                    let callable = if def.has_decorator("fs") {
                        Callable::Gateway(Arc::new(Specialized::new(func, self.engine.clone())))
                    } else {
                        Callable::Function(func)
                    };
                    self.namespace.define(&def.name.node, Global::Callable(callable));
                    names.push(def.name.node.clone());
                }
                Item::Use(decl) => match decl.path.node.0.as_slice() {
                    [module, name] => {
                        if let Some(native) = library::lookup(module, name) {
                            self.namespace
                                .define(name, Global::Callable(Callable::Native(native)));
                            names.push(name.clone());
                        } else if let Some(value) = library::constant(module, name) {
                            self.namespace.define(name, Global::Const(value));
                            names.push(name.clone());
                        } else {
                            errors.push(
                                Diagnostic::name(
                                    format!("`{}` is not in the library", decl.path.node),
                                    decl.path.span,
                                )
                                .with_help(format!(
                                    "library modules are: {}",
                                    library::MODULES.join(", ")
                                )),
                            );
                        }
                    }
                    _ => errors.push(Diagnostic::name(
                        format!("cannot import `{}`", decl.path.node),
                        decl.path.span,
                    )),
                },
                Item::Const(_) => {}
            }
        }

        for item in &file.items {
            if let Item::Const(def) = &item.node {
                match eval_const(&def.value, &self.namespace) {
                    Ok(value) => {
                        self.namespace.define(&def.name.node, Global::Const(value));
                        names.push(def.name.node.clone());
                    }
                    Err(e) => errors.push(e.or_span(def.value.span)),
                }
            }
        }

        if errors.is_empty() {
            Ok(names)
        } else {
            Err(errors)
        }
    }

    pub fn name(&self) -> &str {
        self.namespace.name()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Source files loaded into this module, in load order.
    pub fn sources(&self) -> &[Arc<SourceFile>] {
        &self.sources
    }

    pub fn get(&self, name: &str) -> Option<Global> {
        self.namespace.get(name)
    }

    pub fn callable(&self, name: &str) -> Result<Callable, Diagnostic> {
        match self.namespace.get(name) {
            Some(Global::Callable(callable)) => Ok(callable),
            Some(Global::Const(value)) => Err(Diagnostic::type_error(
                format!("`{}` is a {}, not a function", name, value.type_name()),
                Span::dummy(),
            )),
            None => Err(self.undefined(name)),
        }
    }

    /// The plain Function Unit bound to `name`, unwrapping a gateway.
    pub fn function(&self, name: &str) -> Result<Arc<Function>, Diagnostic> {
        match self.callable(name)? {
            Callable::Function(func) => Ok(func),
            Callable::Gateway(gateway) => Ok(gateway.function().clone()),
            other => Err(Diagnostic::type_error(
                format!("`{}` is bound to a {}", name, other.kind()),
                Span::dummy(),
            )),
        }
    }

    /// The gateway bound to `name`. Plain functions are wrapped on demand.
    pub fn gateway(&self, name: &str) -> Result<Arc<Specialized>, Diagnostic> {
        match self.callable(name)? {
            Callable::Gateway(gateway) => Ok(gateway),
            Callable::Function(func) => Ok(Arc::new(Specialized::new(func, self.engine.clone()))),
            other => Err(Diagnostic::type_error(
                format!("`{}` is a {} and cannot be specialized", name, other.kind()),
                Span::dummy(),
            )),
        }
    }

    pub fn constant(&self, name: &str) -> Option<Value> {
        match self.namespace.get(name)? {
            Global::Const(value) => Some(value),
            Global::Callable(_) => None,
        }
    }

    /// Bind a callable from elsewhere under `name` in this module.
    pub fn define(&self, name: &str, callable: Callable) {
        self.namespace.define(name, Global::Callable(callable));
    }

    pub fn define_const(&self, name: &str, value: Value) {
        self.namespace.define(name, Global::Const(value));
    }

    /// Call a global with positional arguments and no overrides.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Diagnostic> {
        self.callable(name)?.call(args)
    }

    fn undefined(&self, name: &str) -> Diagnostic {
        Diagnostic::name(
            format!("`{}` is not defined in module `{}`", name, self.name()),
            Span::dummy(),
        )
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<module {}>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Arc<Engine> {
        Engine::new(crate::config::EngineConfig::default())
    }

    #[test]
    fn test_load_defines_items() {
        let source = "use math.erf\nuse math.pi\nconst TWO = 2\nconst TAU = TWO * pi\n\n@fs\nfn f(x) { erf(x) * TWO }\nfn g(x) { x }\n";
        let module = Module::load(&engine(), "m", source).unwrap();
        assert!(matches!(module.callable("f"), Ok(Callable::Gateway(_))));
        assert!(matches!(module.callable("g"), Ok(Callable::Function(_))));
        assert!(matches!(module.callable("erf"), Ok(Callable::Native(_))));
        assert_eq!(
            module.constant("TAU"),
            Some(Value::Num(2.0 * std::f64::consts::PI))
        );
        assert_eq!(module.function("f").unwrap().name(), "f");
        assert_eq!(module.call("g", &[Value::Num(3.0)]).unwrap(), Value::Num(3.0));
    }

    #[test]
    fn test_unknown_import_reports() {
        let errs = Module::load(&engine(), "m", "use math.nope").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("not in the library"));
    }

    #[test]
    fn test_constant_may_call_functions() {
        let module = Module::load(&engine(), "m", "fn sq(x) { x * x }\nconst NINE = sq(3)").unwrap();
        assert_eq!(module.constant("NINE"), Some(Value::Num(9.0)));
    }

    #[test]
    fn test_interactive_functions_have_no_source() {
        let module = Module::new(&engine(), "repl");
        module.eval_interactive("fn f(x) { x + 1 }").unwrap();
        let func = module.function("f").unwrap();
        assert!(matches!(func.origin(), Origin::Interactive));
        assert_eq!(module.call("f", &[Value::Num(1.0)]).unwrap(), Value::Num(2.0));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.fst");
        std::fs::write(&path, "fn double(x) { 2 * x }").unwrap();
        let module = Module::load_file(&engine(), &path).unwrap();
        assert_eq!(module.name(), "stats");
        assert_eq!(module.sources().len(), 1);
        assert_eq!(module.call("double", &[Value::Num(4.0)]).unwrap(), Value::Num(8.0));
    }
}

//! The specialization gateway: the entry point `@fs` functions are called
//! through.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;

use super::callgraph::CallGraph;
use super::cache::SpecializationCache;
use super::restore::{PassEnv, Restorer, SharedTable, SymbolTable};
use super::rewrite::{Pass, Table};
use super::Engine;
use crate::ast::display::format_function;
use crate::config::Isolation;
use crate::diagnostic::Diagnostic;
use crate::hash::{ContentHash, Fingerprint};
use crate::jit::{self, Compiled, Direct, Resolve};
use crate::runtime::{Callable, Function, Value};
use crate::span::Span;

/// Control flags a gateway call understands.
pub const CONTROL_FLAGS: &[&str] = &["return_callable", "debug"];

// ─── Call contract ─────────────────────────────────────────────────

/// A keyword argument.
#[derive(Clone, Debug)]
pub enum KwValue {
    /// A control flag.
    Flag(bool),
    /// An ordinary parameter passed by name.
    Value(Value),
    /// A substitution binding for the call site of the same name.
    Override(Callable),
}

/// Keyword arguments of one gateway call, in the order given.
#[derive(Clone, Debug, Default)]
pub struct Kwargs {
    entries: Vec<(String, KwValue)>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: KwValue) {
        self.entries.push((name.to_string(), value));
    }

    pub fn flag(mut self, name: &str, on: bool) -> Self {
        self.push(name, KwValue::Flag(on));
        self
    }

    pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, KwValue::Value(value.into()));
        self
    }

    pub fn with(mut self, name: &str, replacement: impl Into<Callable>) -> Self {
        self.push(name, KwValue::Override(replacement.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KwValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// What a gateway call produced.
#[derive(Debug)]
pub enum Outcome {
    Value(Value),
    Callable(Arc<Compiled>),
}

impl Outcome {
    pub fn into_value(self) -> Result<Value, Diagnostic> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Callable(compiled) => Err(Diagnostic::type_error(
                format!("expected a value, got compiled function `{}`", compiled.name()),
                Span::dummy(),
            )),
        }
    }

    pub fn into_callable(self) -> Result<Arc<Compiled>, Diagnostic> {
        match self {
            Outcome::Callable(compiled) => Ok(compiled),
            Outcome::Value(value) => Err(Diagnostic::type_error(
                format!("expected a compiled function, got a {}", value.type_name()),
                Span::dummy(),
            )),
        }
    }
}

/// Keyword arguments sorted by role.
#[derive(Default)]
struct Request {
    return_callable: bool,
    debug: bool,
    values: Vec<(String, Value)>,
    overrides: Vec<(String, Callable)>,
}

// ─── Gateway ───────────────────────────────────────────────────────

/// A function wrapped for specialization at call time.
pub struct Specialized {
    function: Arc<Function>,
    engine: Arc<Engine>,
}

impl Specialized {
    pub fn new(function: Arc<Function>, engine: Arc<Engine>) -> Self {
        Self { function, engine }
    }

    /// The original, unspecialized function.
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Call with positional arguments only: the original function runs,
    /// nothing is rewritten or compiled.
    pub fn call_plain(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        match self.engine.config().isolation {
            Isolation::Private => self.function.call(args),
            Isolation::Shared => {
                let namespace = self.function.namespace()?;
                let _pass = namespace.lock_pass();
                self.function.call(args)
            }
        }
    }

    /// Call with keyword arguments.
    pub fn call(&self, args: &[Value], kwargs: Kwargs) -> Result<Outcome, Diagnostic> {
        let request = self.sort(kwargs)?;
        let debug = request.debug || self.engine.config().debug;

        if request.overrides.is_empty() {
            if request.return_callable {
                trace!(debug, "compiling `{}` without overrides", self.function.name());
                return self.compile_plain().map(Outcome::Callable);
            }
            let args = self.bind_args(args, request.values)?;
            return self.call_plain(&args).map(Outcome::Value);
        }

        let compiled = self.specialize(request.overrides, debug)?;
        if request.return_callable {
            return Ok(Outcome::Callable(compiled));
        }
        let args = self.bind_args(args, request.values)?;
        compiled.call(&args).map(Outcome::Value)
    }

    /// Start a call built up argument by argument.
    pub fn invoke(&self) -> Invocation<'_> {
        Invocation {
            gateway: self,
            args: Vec::new(),
            kwargs: Kwargs::new(),
        }
    }

    /// Pre-bind overrides. Only override entries are accepted.
    pub fn bind(self: &Arc<Self>, kwargs: Kwargs) -> Result<Arc<Partial>, Diagnostic> {
        let request = self.sort(kwargs)?;
        if request.return_callable || request.debug || !request.values.is_empty() {
            return Err(Diagnostic::type_error(
                format!("only overrides can be bound to `{}`", self.function.name()),
                self.function.def().name.span,
            ));
        }
        Ok(Arc::new(Partial::new(self.clone(), request.overrides)))
    }

    /// The rewritten top-level definition for these overrides, as source.
    /// Always runs in a private environment.
    pub fn explain(&self, kwargs: Kwargs) -> Result<String, Diagnostic> {
        let request = self.sort(kwargs)?;
        let debug = request.debug || self.engine.config().debug;
        let overrides = unwrap_gateways(request.overrides);
        self.check_acyclic(&overrides)?;
        let (table, _) = self.prepare::<PassEnv>(overrides, debug, false)?;

        let mut restorer = Restorer::new(PassEnv::new(), debug);
        let rewritten = Pass::new(&table, &mut restorer, debug).specialize(&self.function)?;
        Ok(format_function(rewritten.def()))
    }

    /// Compile the specialization for `overrides`, or fetch it from the
    /// cache.
    pub fn specialize(&self, overrides: Vec<(String, Callable)>, debug: bool) -> Result<Arc<Compiled>, Diagnostic> {
        let overrides = unwrap_gateways(overrides);
        let config = self.engine.config();

        let key = config
            .cache
            .then(|| SpecializationCache::key(&self.function, &overrides));
        if let Some(key) = &key {
            if let Some(hit) = self.engine.cache().get(key) {
                trace!(debug, "cache hit for `{}` {}", self.function.name(), key);
                return Ok(hit);
            }
        }

        self.check_acyclic(&overrides)?;
        let compiled = match config.isolation {
            Isolation::Private => self.run::<PassEnv>(overrides, debug, config.parallel)?,
            Isolation::Shared => {
                let namespace = self.function.namespace()?;
                let _pass = namespace.lock_pass();
                self.run::<SharedTable>(overrides, debug, false)?
            }
        };

        if let Some(key) = key {
            self.engine.cache().insert(key, compiled.clone());
        }
        Ok(compiled)
    }

    fn run<T: SymbolTable + Resolve + Default>(
        &self,
        overrides: Vec<(String, Callable)>,
        debug: bool,
        parallel: bool,
    ) -> Result<Arc<Compiled>, Diagnostic> {
        let (table, mut matched) = self.prepare::<T>(overrides, debug, parallel)?;

        let mut restorer = Restorer::new(T::default(), debug);
        let mut pass = Pass::new(&table, &mut restorer, debug);
        let compiled = pass.specialize_compiled(&self.function)?;
        matched.extend(pass.matched().iter().cloned());

        for name in table.keys().filter(|k| !matched.contains(*k)) {
            if self.engine.config().strict_overrides {
                return Err(Diagnostic::name(
                    format!(
                        "override `{}` matches no call site reachable from `{}`",
                        name,
                        self.function.name()
                    ),
                    self.function.def().name.span,
                ));
            }
            trace!(debug, "ignoring override `{}`: no call site", name);
        }
        Ok(compiled)
    }

    /// Turn the raw overrides into the final substitution table.
    /// Function-valued overrides are specialized against the raw table
    /// first, so they see the same substitutions as the top level.
    fn prepare<T: SymbolTable + Resolve + Default>(
        &self,
        overrides: Vec<(String, Callable)>,
        debug: bool,
        parallel: bool,
    ) -> Result<(Table, BTreeSet<String>), Diagnostic> {
        let raw: Table = overrides.into_iter().collect();
        let pending: Vec<(&String, &Arc<Function>)> = raw
            .iter()
            .filter_map(|(key, callable)| match callable {
                Callable::Function(func) if !raw.contains_key(func.name()) => Some((key, func)),
                _ => None,
            })
            .collect();

        let prespecialize = |(key, func): &(&String, &Arc<Function>)| {
            let mut restorer = Restorer::new(T::default(), debug);
            let mut pass = Pass::new(&raw, &mut restorer, debug);
            let compiled = pass
                .specialize_compiled(func)
                .map_err(|d| d.with_note(format!("while specializing override `{}`", key)))?;
            Ok::<_, Diagnostic>(((*key).clone(), compiled, pass.matched().clone()))
        };
        let done: Vec<(String, Arc<Compiled>, BTreeSet<String>)> = if parallel && pending.len() > 1 {
            pending.par_iter().map(prespecialize).collect::<Result<_, _>>()?
        } else {
            pending.iter().map(prespecialize).collect::<Result<_, _>>()?
        };

        let mut matched = BTreeSet::new();
        let mut table = Table::new();
        for (key, compiled, used) in done {
            matched.extend(used);
            table.insert(key, Callable::Compiled(compiled));
        }
        for (key, callable) in &raw {
            if table.contains_key(key) {
                continue;
            }
            let converted = jit::convert_in(callable, &Direct)
                .map_err(|d| d.with_note(format!("given as override `{}`", key)))?;
            table.insert(key.clone(), converted);
        }
        Ok((table, matched))
    }

    fn compile_plain(&self) -> Result<Arc<Compiled>, Diagnostic> {
        match self.engine.config().isolation {
            Isolation::Private => jit::compile(&self.function, &Direct),
            Isolation::Shared => {
                let namespace = self.function.namespace()?;
                let _pass = namespace.lock_pass();
                jit::compile(&self.function, &Direct)
            }
        }
    }

    fn check_acyclic(&self, overrides: &[(String, Callable)]) -> Result<(), Diagnostic> {
        let excluded: BTreeSet<String> = overrides.iter().map(|(k, _)| k.clone()).collect();
        let graph = CallGraph::build(&self.function, &excluded)?;
        match graph.find_cycle() {
            Some(cycle) => Err(Diagnostic::unsupported(
                format!("cannot specialize recursive call graph {}", cycle.join(" -> ")),
                self.function.def().name.span,
            )),
            None => Ok(()),
        }
    }

    fn sort(&self, kwargs: Kwargs) -> Result<Request, Diagnostic> {
        let span = self.function.def().name.span;
        let mut request = Request::default();
        let mut seen = BTreeSet::new();
        for (name, value) in kwargs.entries {
            if !seen.insert(name.clone()) {
                return Err(Diagnostic::type_error(
                    format!("keyword argument `{}` given more than once", name),
                    span,
                ));
            }
            match value {
                KwValue::Flag(on) => match name.as_str() {
                    "return_callable" => request.return_callable = on,
                    "debug" => request.debug = on,
                    _ => {
                        return Err(Diagnostic::name(format!("unknown control flag `{}`", name), span)
                            .with_help(format!("control flags are: {}", CONTROL_FLAGS.join(", "))))
                    }
                },
                KwValue::Override(_) if CONTROL_FLAGS.contains(&name.as_str()) => {
                    return Err(Diagnostic::type_error(
                        format!("`{}` is a control flag and cannot be overridden", name),
                        span,
                    ))
                }
                KwValue::Override(callable) => request.overrides.push((name, callable)),
                KwValue::Value(value) => {
                    if !self.function.params().any(|p| p == name) {
                        return Err(Diagnostic::name(
                            format!("`{}` has no parameter named `{}`", self.function.name(), name),
                            span,
                        ));
                    }
                    request.values.push((name, value));
                }
            }
        }
        Ok(request)
    }

    /// Positional arguments plus parameters passed by name, in declared
    /// order.
    fn bind_args(&self, args: &[Value], named: Vec<(String, Value)>) -> Result<Vec<Value>, Diagnostic> {
        let span = self.function.def().name.span;
        let arity = self.function.arity();
        if named.is_empty() && args.len() == arity {
            return Ok(args.to_vec());
        }
        if args.len() > arity {
            return Err(Diagnostic::type_error(
                format!(
                    "`{}` takes {} argument(s), {} given",
                    self.function.name(),
                    arity,
                    args.len()
                ),
                span,
            ));
        }

        let params: Vec<&str> = self.function.params().collect();
        let mut slots: Vec<Option<Value>> = args.iter().cloned().map(Some).collect();
        slots.resize(arity, None);
        for (name, value) in named {
            if let Some(i) = params.iter().position(|p| *p == name) {
                if slots[i].is_some() {
                    return Err(Diagnostic::type_error(
                        format!("argument `{}` given twice", name),
                        span,
                    ));
                }
                slots[i] = Some(value);
            }
        }
        slots
            .into_iter()
            .zip(&params)
            .map(|(slot, param)| {
                slot.ok_or_else(|| {
                    Diagnostic::type_error(
                        format!("`{}` is missing argument `{}`", self.function.name(), param),
                        span,
                    )
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Specialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<@fs {}>", self.function.name())
    }
}

/// Overrides must name plain logic, never a gateway around it.
fn unwrap_gateways(overrides: Vec<(String, Callable)>) -> Vec<(String, Callable)> {
    overrides
        .into_iter()
        .map(|(key, callable)| match callable {
            Callable::Gateway(gateway) => (key, Callable::Function(gateway.function().clone())),
            other => (key, other),
        })
        .collect()
}

// ─── Builder ───────────────────────────────────────────────────────

/// A gateway call assembled step by step.
pub struct Invocation<'g> {
    gateway: &'g Specialized,
    args: Vec<Value>,
    kwargs: Kwargs,
}

impl Invocation<'_> {
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(values);
        self
    }

    /// Override the call site `name`.
    pub fn with(mut self, name: &str, replacement: impl Into<Callable>) -> Self {
        self.kwargs = self.kwargs.with(name, replacement);
        self
    }

    /// Pass parameter `name` by name.
    pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.kwargs = self.kwargs.value(name, value);
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.kwargs = self.kwargs.flag("debug", on);
        self
    }

    pub fn run(self) -> Result<Value, Diagnostic> {
        self.gateway.call(&self.args, self.kwargs)?.into_value()
    }

    /// The compiled artifact, without running it.
    pub fn compile(self) -> Result<Arc<Compiled>, Diagnostic> {
        let kwargs = self.kwargs.flag("return_callable", true);
        self.gateway.call(&self.args, kwargs)?.into_callable()
    }
}

// ─── Partial ───────────────────────────────────────────────────────

/// A gateway with overrides bound ahead of time.
pub struct Partial {
    gateway: Arc<Specialized>,
    overrides: Vec<(String, Callable)>,
    fingerprint: ContentHash,
}

impl Partial {
    fn new(gateway: Arc<Specialized>, overrides: Vec<(String, Callable)>) -> Self {
        let mut sorted: Vec<&(String, Callable)> = overrides.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut fp = Fingerprint::key();
        fp.write_hash(&gateway.function().fingerprint())
            .write_u64(sorted.len() as u64);
        for (name, callable) in sorted {
            fp.write_str(name).write_hash(&callable.fingerprint());
        }
        let fingerprint = fp.finish();
        Self {
            gateway,
            overrides,
            fingerprint,
        }
    }

    pub fn gateway(&self) -> &Arc<Specialized> {
        &self.gateway
    }

    pub fn overrides(&self) -> &[(String, Callable)] {
        &self.overrides
    }

    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        self.call_with(args, Kwargs::new())?.into_value()
    }

    /// Call with more keyword arguments on top of the bound ones.
    pub fn call_with(&self, args: &[Value], kwargs: Kwargs) -> Result<Outcome, Diagnostic> {
        let mut all = Kwargs::new();
        for (name, callable) in &self.overrides {
            all.push(name, KwValue::Override(callable.clone()));
        }
        all.entries.extend(kwargs.entries);
        self.gateway.call(args, all)
    }
}

impl std::fmt::Debug for Partial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.overrides.iter().map(|(n, _)| n.as_str()).collect();
        write!(f, "<partial {} [{}]>", self.gateway.function().name(), names.join(", "))
    }
}

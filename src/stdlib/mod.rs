//! Client passes shipped with the engine. Each is an `@fs` function that
//! calls a module-level `value` hook; callers specialize the pass by
//! overriding `value`.

use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::runtime::Module;
use crate::specialize::{Engine, Specialized};

/// Element-wise map.
pub const SINGLE_PASS: &str = include_str!("core/single_pass.fst");

/// Fixed-size rolling window.
pub const WINDOWED_PASS: &str = include_str!("core/windowed_pass.fst");

/// Rolling window with state threaded through the hook.
pub const WINDOWED_STATEFUL_PASS: &str = include_str!("core/windowed_stateful_pass.fst");

const PASSES: &[(&str, &str)] = &[
    ("single_pass", SINGLE_PASS),
    ("windowed_pass", WINDOWED_PASS),
    ("windowed_stateful_pass", WINDOWED_STATEFUL_PASS),
];

/// The loaded passes. Each lives in its own module, since every pass
/// binds its own default `value`.
pub struct Core {
    modules: Vec<Module>,
}

/// Load the shipped passes under `engine`.
pub fn core(engine: &Arc<Engine>) -> Result<Core, Vec<Diagnostic>> {
    let mut modules = Vec::with_capacity(PASSES.len());
    for (name, source) in PASSES {
        modules.push(Module::load(engine, name, source)?);
    }
    Ok(Core { modules })
}

impl Core {
    pub fn single_pass(&self) -> Result<Arc<Specialized>, Diagnostic> {
        self.get("single_pass")
    }

    pub fn windowed_pass(&self) -> Result<Arc<Specialized>, Diagnostic> {
        self.get("windowed_pass")
    }

    pub fn windowed_stateful_pass(&self) -> Result<Arc<Specialized>, Diagnostic> {
        self.get("windowed_stateful_pass")
    }

    /// The pass named `name`, looked up in the module of the same name.
    pub fn get(&self, name: &str) -> Result<Arc<Specialized>, Diagnostic> {
        match self.modules.iter().find(|m| m.name() == name) {
            Some(module) => module.gateway(name),
            None => Err(Diagnostic::name(
                format!("`{}` is not a core pass", name),
                crate::span::Span::dummy(),
            )
            .with_help(format!("core passes are: {}", self.names().join(", ")))),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::runtime::Value;

    fn load() -> Core {
        core(&Engine::new(EngineConfig::default())).unwrap()
    }

    fn nums(value: &Value) -> Vec<f64> {
        value.as_array().unwrap().to_vec()
    }

    #[test]
    fn test_core_loads_every_pass() {
        let core = load();
        assert_eq!(
            core.names(),
            vec!["single_pass", "windowed_pass", "windowed_stateful_pass"]
        );
        assert!(core.get("missing").is_err());
    }

    #[test]
    fn test_single_pass_default_is_identity() {
        let data = Value::from(vec![0.0, 1.0, 2.0, 9.0]);
        let out = load().single_pass().unwrap().call_plain(&[data.clone()]).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_windowed_pass_default_takes_newest() {
        let data = Value::from(vec![1.0, 2.0, 3.0, 4.0]);
        let out = load()
            .windowed_pass()
            .unwrap()
            .call_plain(&[data, Value::Num(3.0)])
            .unwrap();
        let out = nums(&out);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(&out[2..], &[3.0, 4.0]);
    }

    #[test]
    fn test_windowed_stateful_pass_default_passes_values_in() {
        let data: Vec<f64> = (0..11).map(|i| (i as f64).powi(3)).collect();
        let out = load()
            .windowed_stateful_pass()
            .unwrap()
            .call_plain(&[Value::from(data.clone()), Value::Num(3.0)])
            .unwrap();
        let out = nums(&out);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(&out[2..], &data[2..]);
    }
}

//! Call-time specialization of `@fs` functions.
//!
//! A gateway call with overrides runs one pass: the call graph reachable
//! from the function is rewritten so that overridden call sites point at
//! their replacements and every other user-defined callee is itself
//! specialized, the rewritten definition is reassembled into a new unit,
//! and the unit is compiled. Bindings made along the way are undone when
//! the pass ends, however it ends.

/// Pass tracing to stderr, on when `$on` is true.
macro_rules! trace {
    ($on:expr, $($arg:tt)*) => {
        if $on {
            eprintln!("fastats: {}", format_args!($($arg)*));
        }
    };
}
pub(crate) use trace;

pub mod cache;
pub mod callgraph;
pub mod gateway;
pub mod reassemble;
pub mod restore;
pub mod rewrite;
pub mod source;

use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::diagnostic::Diagnostic;

pub use cache::{CacheKey, CacheStats, SpecializationCache};
pub use callgraph::CallGraph;
pub use gateway::{Invocation, KwValue, Kwargs, Outcome, Partial, Specialized};
pub use restore::{PassEnv, Restorer, SharedTable, SymbolTable};

/// Settings and the specialization cache shared by every gateway of the
/// modules loaded with it.
pub struct Engine {
    config: EngineConfig,
    cache: SpecializationCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            cache: SpecializationCache::new(),
        })
    }

    /// An engine configured from the nearest fastats.toml above
    /// `start_dir` and the environment.
    pub fn discover(start_dir: &Path) -> Result<Arc<Self>, Diagnostic> {
        Ok(Self::new(EngineConfig::discover(start_dir)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &SpecializationCache {
        &self.cache
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Isolation;
    use crate::diagnostic::ErrorKind;
    use crate::runtime::{Callable, Module, Value};

    const BASIC: &str = "fn child(x) { x * x }\nfn cube(x) { x * x * x }\n@fs\nfn parent(a) {\n    let b = 2 * a\n    child(b)\n}\n";

    fn load(config: EngineConfig, source: &str) -> Module {
        Module::load(&Engine::new(config), "m", source).unwrap()
    }

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    #[test]
    fn test_parent_child_transparency() {
        for isolation in [Isolation::Private, Isolation::Shared] {
            let config = EngineConfig {
                isolation,
                ..EngineConfig::default()
            };
            let module = load(config, BASIC);
            let parent = module.gateway("parent").unwrap();
            let cube = module.callable("cube").unwrap();

            assert_eq!(parent.call_plain(&[num(2.0)]).unwrap(), num(16.0));
            let out = parent.invoke().arg(2.0).with("child", cube).run().unwrap();
            assert_eq!(out, num(64.0));
            assert_eq!(parent.call_plain(&[num(2.0)]).unwrap(), num(16.0));
            assert_eq!(module.call("parent", &[num(3.0)]).unwrap(), num(36.0));
        }
    }

    #[test]
    fn test_cache_reuses_artifact() {
        let module = load(EngineConfig::default(), BASIC);
        let parent = module.gateway("parent").unwrap();
        let cube = module.callable("cube").unwrap();
        let first = parent.invoke().with("child", cube.clone()).compile().unwrap();
        let second = parent.invoke().with("child", cube).compile().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(module.engine().cache().stats().hits, 1);
    }

    #[test]
    fn test_cache_disabled_recompiles() {
        let config = EngineConfig {
            cache: false,
            ..EngineConfig::default()
        };
        let module = load(config, BASIC);
        let parent = module.gateway("parent").unwrap();
        let cube = module.callable("cube").unwrap();
        let first = parent.invoke().with("child", cube.clone()).compile().unwrap();
        let second = parent.invoke().with("child", cube).compile().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_strict_overrides_reject_unmatched() {
        let config = EngineConfig {
            strict_overrides: true,
            ..EngineConfig::default()
        };
        let module = load(config, BASIC);
        let parent = module.gateway("parent").unwrap();
        let cube = module.callable("cube").unwrap();
        let err = parent.invoke().arg(2.0).with("nothing", cube).run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Name);
        assert!(err.message.contains("`nothing`"));
    }

    #[test]
    fn test_recursive_graph_rejected_before_mutation() {
        let config = EngineConfig {
            isolation: Isolation::Shared,
            ..EngineConfig::default()
        };
        let module = load(
            config,
            "fn down(n) { if n > 0 { return down(n - 1) }\n 0 }\nfn one(x) { 1 }\n@fs\nfn f(n) { down(n) + one(n) }",
        );
        let f = module.gateway("f").unwrap();
        let one = module.callable("one").unwrap();
        let err = f.invoke().arg(3.0).with("one", one).run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert!(matches!(module.callable("down").unwrap(), Callable::Function(_)));
        assert!(!module.namespace().contains("one@override"));
        assert_eq!(f.call_plain(&[num(3.0)]).unwrap(), num(1.0));
    }

    #[test]
    fn test_discover_reads_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fastats.toml"),
            "[engine]\nisolation = \"shared\"\n",
        )
        .unwrap();
        let engine = Engine::discover(dir.path()).unwrap();
        assert_eq!(engine.config().isolation, Isolation::Shared);
    }
}

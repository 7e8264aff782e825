//! Memoized specializations, keyed by identity and namespace generation.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::hash::{ContentHash, Fingerprint};
use crate::jit::Compiled;
use crate::runtime::{Callable, Function, Namespace, WeakNamespace};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// A cache key and the namespace generations it was computed against.
#[derive(Clone, Debug)]
pub struct CacheKey {
    hash: ContentHash,
    depends_on: Vec<(WeakNamespace, u64)>,
}

impl CacheKey {
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// A namespace it depends on was dropped or has been redefined since.
    pub fn is_stale(&self) -> bool {
        self.depends_on
            .iter()
            .any(|(ns, generation)| ns.generation() != Some(*generation))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.hash, f)
    }
}

struct Entry {
    compiled: Arc<Compiled>,
    key: CacheKey,
}

#[derive(Default)]
pub struct SpecializationCache {
    entries: RwLock<HashMap<ContentHash, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SpecializationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for specializing `func` with `overrides`. Covers the function's
    /// identity and captured values, each override by name and identity
    /// independent of order, and the current generation of every namespace
    /// the pass can resolve a name in.
    pub fn key(func: &Function, overrides: &[(String, Callable)]) -> CacheKey {
        let mut sorted: Vec<&(String, Callable)> = overrides.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let depends_on = reachable_namespaces(func, overrides);
        let mut fp = Fingerprint::key();
        fp.write_u64(func.id())
            .write_hash(&func.fingerprint())
            .write_u64(depends_on.len() as u64);
        for (id, (_, generation)) in &depends_on {
            fp.write_u64(*id).write_u64(*generation);
        }
        fp.write_u64(sorted.len() as u64);
        for (name, callable) in sorted {
            fp.write_str(name);
            write_identity(&mut fp, callable);
        }
        CacheKey {
            hash: fp.finish(),
            depends_on: depends_on.into_values().collect(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Compiled>> {
        let found = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key.hash)
            .map(|entry| entry.compiled.clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store an artifact, evicting entries whose namespaces have changed
    /// or been dropped since they were keyed.
    pub fn insert(&self, key: CacheKey, compiled: Arc<Compiled>) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|_, entry| !entry.key.is_stale());
        if key.is_stale() {
            return;
        }
        entries.insert(key.hash, Entry { compiled, key });
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
        }
    }
}

/// Identity, not content: two functions with equal bodies in different
/// namespaces link against different callees.
fn write_identity(fp: &mut Fingerprint, callable: &Callable) {
    match callable {
        Callable::Function(func) => {
            fp.write_str("fn").write_u64(func.id()).write_hash(&func.fingerprint());
        }
        Callable::Gateway(gateway) => {
            let func = gateway.function();
            fp.write_str("fn").write_u64(func.id()).write_hash(&func.fingerprint());
        }
        Callable::Compiled(compiled) => {
            fp.write_str("compiled").write_u64(compiled.id());
        }
        Callable::Native(native) => {
            fp.write_str("native").write_str(native.name);
        }
        Callable::Partial(partial) => {
            let func = partial.gateway().function();
            fp.write_str("partial")
                .write_u64(func.id())
                .write_u64(partial.overrides().len() as u64);
            for (name, bound) in partial.overrides() {
                fp.write_str(name);
                write_identity(fp, bound);
            }
        }
    }
}

/// Every live namespace reachable from `func` and `overrides` through
/// namespace bindings, by id, with its current generation.
fn reachable_namespaces(
    func: &Function,
    overrides: &[(String, Callable)],
) -> BTreeMap<u64, (WeakNamespace, u64)> {
    let mut pending: Vec<Namespace> = func.namespace().into_iter().collect();
    for (_, callable) in overrides {
        push_namespaces(callable, &mut pending);
    }

    let mut seen = BTreeMap::new();
    while let Some(ns) = pending.pop() {
        if seen.contains_key(&ns.id()) {
            continue;
        }
        // Generation first, then bindings: a racing define leaves the key stale.
        seen.insert(ns.id(), (ns.downgrade(), ns.generation()));
        for callable in ns.callables() {
            push_namespaces(&callable, &mut pending);
        }
    }
    seen
}

fn push_namespaces(callable: &Callable, pending: &mut Vec<Namespace>) {
    match callable {
        Callable::Function(func) => pending.extend(func.namespace()),
        Callable::Gateway(gateway) => pending.extend(gateway.function().namespace()),
        Callable::Partial(partial) => {
            pending.extend(partial.gateway().function().namespace());
            for (_, bound) in partial.overrides() {
                push_namespaces(bound, pending);
            }
        }
        Callable::Compiled(_) | Callable::Native(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::runtime::{Global, Module};
    use crate::specialize::Engine;

    fn setup() -> Module {
        Module::load(
            &Engine::new(EngineConfig::default()),
            "m",
            "fn child(x) { x * x }\nfn cube(x) { x * x * x }\nfn zero(x) { 0 }\n@fs\nfn parent(a) { child(2 * a) }",
        )
        .unwrap()
    }

    fn over(module: &Module, pairs: &[(&str, &str)]) -> Vec<(String, Callable)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), module.callable(v).unwrap()))
            .collect()
    }

    fn compiled(module: &Module, name: &str) -> Arc<Compiled> {
        match crate::jit::convert(&module.callable(name).unwrap()).unwrap() {
            Callable::Compiled(compiled) => compiled,
            other => panic!("expected compiled, got {:?}", other),
        }
    }

    #[test]
    fn test_key_is_order_independent() {
        let module = setup();
        let parent = module.function("parent").unwrap();
        let a = SpecializationCache::key(&parent, &over(&module, &[("child", "cube"), ("x", "zero")]));
        let b = SpecializationCache::key(&parent, &over(&module, &[("x", "zero"), ("child", "cube")]));
        assert_eq!(a.hash(), b.hash());
        let c = SpecializationCache::key(&parent, &over(&module, &[("child", "zero")]));
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_redefinition_changes_key() {
        let module = setup();
        let parent = module.function("parent").unwrap();
        let overrides = over(&module, &[("child", "cube")]);
        let before = SpecializationCache::key(&parent, &overrides);
        module.define_const("unrelated", crate::runtime::Value::Num(1.0));
        assert!(before.is_stale());
        assert_ne!(before.hash(), SpecializationCache::key(&parent, &overrides).hash());
    }

    #[test]
    fn test_other_namespaces_leave_key_alone() {
        let module = setup();
        let elsewhere = Module::load(module.engine(), "elsewhere", "fn k(x) { x }").unwrap();
        let parent = module.function("parent").unwrap();
        let overrides = over(&module, &[("child", "cube")]);
        let before = SpecializationCache::key(&parent, &overrides);
        elsewhere.namespace().define("k", Global::Const(crate::runtime::Value::Num(2.0)));
        assert!(!before.is_stale());
        assert_eq!(before.hash(), SpecializationCache::key(&parent, &overrides).hash());
    }

    #[test]
    fn test_equal_source_in_other_module_is_a_different_override() {
        let module = setup();
        let a = Module::load(module.engine(), "a", "fn g(x) { x + 1 }\nfn helper(x) { g(x) }").unwrap();
        let b = Module::load(module.engine(), "b", "fn g(x) { x + 100 }\nfn helper(x) { g(x) }").unwrap();
        assert_eq!(
            a.callable("helper").unwrap().fingerprint(),
            b.callable("helper").unwrap().fingerprint()
        );
        let parent = module.function("parent").unwrap();
        let with_a = SpecializationCache::key(&parent, &[("child".to_string(), a.callable("helper").unwrap())]);
        let with_b = SpecializationCache::key(&parent, &[("child".to_string(), b.callable("helper").unwrap())]);
        assert_ne!(with_a.hash(), with_b.hash());
    }

    #[test]
    fn test_override_namespace_is_a_dependency() {
        let module = setup();
        let other = Module::load(module.engine(), "other", "fn g(x) { x }\nfn helper(x) { g(x) }").unwrap();
        let parent = module.function("parent").unwrap();
        let key = SpecializationCache::key(&parent, &[("child".to_string(), other.callable("helper").unwrap())]);
        other.define_const("k", crate::runtime::Value::Num(1.0));
        assert!(key.is_stale());
    }

    #[test]
    fn test_insert_evicts_stale_entries() {
        let module = setup();
        let cache = SpecializationCache::new();
        let parent = module.function("parent").unwrap();
        let overrides = over(&module, &[("child", "cube")]);
        for i in 0..50 {
            let key = SpecializationCache::key(&parent, &overrides);
            cache.insert(key, compiled(&module, "cube"));
            module.define_const("unrelated", crate::runtime::Value::Num(i as f64));
        }
        assert!(cache.stats().entries <= 1);

        let key = SpecializationCache::key(&parent, &overrides);
        cache.insert(key.clone(), compiled(&module, "cube"));
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_dropped_module_entries_are_evicted() {
        let module = setup();
        let cache = SpecializationCache::new();
        {
            let gone = Module::load(module.engine(), "gone", "fn h(x) { x * 3 }").unwrap();
            let key = SpecializationCache::key(&gone.function("h").unwrap(), &[]);
            cache.insert(key, compiled(&gone, "h"));
            assert_eq!(cache.stats().entries, 1);
        }
        let key = SpecializationCache::key(&module.function("parent").unwrap(), &[]);
        cache.insert(key, compiled(&module, "cube"));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let module = setup();
        let cache = SpecializationCache::new();
        let key = SpecializationCache::key(&module.function("parent").unwrap(), &[]);
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), compiled(&module, "cube"));
        assert!(cache.get(&key).is_some());
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }
}

//! The restoration manager: every binding a pass installs goes through a
//! [`Restorer`], and every one of them is undone when it drops.

use std::collections::HashMap;

use crate::jit::Resolve;
use crate::runtime::{Global, Namespace};

/// Where a pass's bindings are written.
pub trait SymbolTable {
    /// What `name` resolves to for functions of `namespace`, as this pass
    /// sees it.
    fn lookup(&self, namespace: &Namespace, name: &str) -> Option<Global>;

    /// Set (`Some`) or clear (`None`) a binding, returning the entry this
    /// table held before. Feeding the returned entry back in undoes the
    /// write.
    fn write(&mut self, namespace: &Namespace, name: &str, global: Option<Global>) -> Option<Global>;
}

// ─── Private overlay ───────────────────────────────────────────────

/// A per-pass overlay on top of the shared namespaces. Lookups see the
/// overlay first; the namespaces themselves are never written.
#[derive(Default)]
pub struct PassEnv {
    overlay: HashMap<(u64, String), Global>,
}

impl PassEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }
}

impl SymbolTable for PassEnv {
    fn lookup(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        match self.overlay.get(&(namespace.id(), name.to_string())) {
            Some(global) => Some(global.clone()),
            None => namespace.get(name),
        }
    }

    fn write(&mut self, namespace: &Namespace, name: &str, global: Option<Global>) -> Option<Global> {
        let key = (namespace.id(), name.to_string());
        match global {
            Some(global) => self.overlay.insert(key, global),
            None => self.overlay.remove(&key),
        }
    }
}

impl Resolve for PassEnv {
    fn resolve(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        self.lookup(namespace, name)
    }
}

// ─── Shared namespace ──────────────────────────────────────────────

/// Writes straight into the shared namespaces. The caller holds the
/// top-level function's pass lock for as long as this table is live.
#[derive(Default)]
pub struct SharedTable;

impl SymbolTable for SharedTable {
    fn lookup(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        namespace.get(name)
    }

    fn write(&mut self, namespace: &Namespace, name: &str, global: Option<Global>) -> Option<Global> {
        namespace.install(name, global)
    }
}

impl Resolve for SharedTable {
    fn resolve(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        namespace.get(name)
    }
}

// ─── Restorer ──────────────────────────────────────────────────────

/// One displaced binding.
pub struct Replaced {
    pub namespace: Namespace,
    /// The key written: the call-site symbol, or its override alias.
    pub key: String,
    /// The call-site symbol the write was made for.
    pub symbol: String,
    previous: Option<Global>,
}

/// Owns the replaced registry of one pass. Dropping it puts every
/// recorded binding back, newest first, whether the pass finished,
/// returned early with an error, or unwound.
pub struct Restorer<T: SymbolTable> {
    table: T,
    replaced: Vec<Replaced>,
    debug: bool,
}

impl<T: SymbolTable> Restorer<T> {
    pub fn new(table: T, debug: bool) -> Self {
        Self {
            table,
            replaced: Vec::new(),
            debug,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn lookup(&self, namespace: &Namespace, name: &str) -> Option<Global> {
        self.table.lookup(namespace, name)
    }

    /// Whether `key` was already written in `namespace` by this pass.
    pub fn is_recorded(&self, namespace: &Namespace, key: &str) -> bool {
        self.replaced
            .iter()
            .any(|r| r.key == key && r.namespace.ptr_eq(namespace))
    }

    /// Bind `key` for the rest of the pass. The displaced entry is
    /// recorded the first time a key is written; later writes to the
    /// same key keep that first record.
    pub fn install(&mut self, namespace: &Namespace, key: &str, symbol: &str, global: Global) {
        let previous = self.table.write(namespace, key, Some(global));
        if !self.is_recorded(namespace, key) {
            self.replaced.push(Replaced {
                namespace: namespace.clone(),
                key: key.to_string(),
                symbol: symbol.to_string(),
                previous,
            });
        }
    }

    /// Call-site symbols touched so far, in the order they were first
    /// written.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = Vec::new();
        for r in &self.replaced {
            if !symbols.contains(&r.symbol.as_str()) {
                symbols.push(&r.symbol);
            }
        }
        symbols
    }

    pub fn replaced(&self) -> &[Replaced] {
        &self.replaced
    }

    /// Put every recorded binding back and clear the registry. Returns
    /// how many were restored.
    pub fn restore(&mut self) -> usize {
        let count = self.replaced.len();
        while let Some(entry) = self.replaced.pop() {
            self.table.write(&entry.namespace, &entry.key, entry.previous);
        }
        if count > 0 {
            super::trace!(self.debug, "restored {} binding(s)", count);
        }
        count
    }
}

impl<T: SymbolTable> Drop for Restorer<T> {
    fn drop(&mut self) {
        self.restore();
    }
}

//! The shared namespace a module's functions resolve unqualified names in.
//!
//! A namespace is shared, mutable state: any holder of a `Namespace` may
//! define or remove globals, and functions resolve their callees in it at
//! call time. User-level changes bump the namespace's definition generation,
//! which keys the specialization cache. Transient installs made during a
//! specialization pass go through `install` and leave the generation alone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use super::function::Callable;
use super::value::Value;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Default interpreter recursion limit.
pub const DEFAULT_MAX_RECURSION: usize = 1000;

static NEXT_NAMESPACE_ID: AtomicU64 = AtomicU64::new(1);

/// A namespace entry.
#[derive(Clone, Debug)]
pub enum Global {
    Const(Value),
    Callable(Callable),
}

impl Global {
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Global::Callable(callable) => Some(callable),
            Global::Const(_) => None,
        }
    }
}

/// A shared handle to one module's symbol table.
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

struct NamespaceInner {
    id: u64,
    name: String,
    globals: RwLock<HashMap<String, Global>>,
    generation: AtomicU64,
    /// Held for a whole pass in shared isolation mode.
    pass_lock: Mutex<()>,
    max_recursion: AtomicUsize,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                id: NEXT_NAMESPACE_ID.fetch_add(1, Ordering::Relaxed),
                name: name.to_string(),
                globals: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
                pass_lock: Mutex::new(()),
                max_recursion: AtomicUsize::new(DEFAULT_MAX_RECURSION),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Bumped by every `define` and `remove` in this namespace.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self, name: &str) -> Option<Global> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Define or replace a global. Invalidates cached specializations.
    pub fn define(&self, name: &str, global: Global) {
        self.write().insert(name.to_string(), global);
        self.bump_generation();
    }

    /// Remove a global. Invalidates cached specializations.
    pub fn remove(&self, name: &str) -> Option<Global> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            self.bump_generation();
        }
        removed
    }

    /// Set or clear an entry for the duration of a specialization pass,
    /// returning the previous entry. Does not touch the generation.
    pub(crate) fn install(&self, name: &str, global: Option<Global>) -> Option<Global> {
        let mut globals = self.write();
        match global {
            Some(global) => globals.insert(name.to_string(), global),
            None => globals.remove(name),
        }
    }

    /// Every callable currently bound, in no particular order.
    pub fn callables(&self) -> Vec<Callable> {
        self.read()
            .values()
            .filter_map(Global::as_callable)
            .cloned()
            .collect()
    }

    /// All defined names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn max_recursion(&self) -> usize {
        self.inner.max_recursion.load(Ordering::Relaxed)
    }

    pub fn set_max_recursion(&self, limit: usize) {
        self.inner.max_recursion.store(limit, Ordering::Relaxed);
    }

    /// Serialize specialization passes that write into this namespace.
    pub(crate) fn lock_pass(&self) -> MutexGuard<'_, ()> {
        self.inner
            .pass_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn downgrade(&self) -> WeakNamespace {
        WeakNamespace(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // A panic while a guard is held poisons the lock; the map itself is
    // never left half-written, so recover the guard.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Global>> {
        self.inner
            .globals
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Global>> {
        self.inner
            .globals
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<namespace {} #{}>", self.inner.name, self.inner.id)
    }
}

/// A non-owning reference from a function back to its namespace.
#[derive(Clone)]
pub struct WeakNamespace(Weak<NamespaceInner>);

impl WeakNamespace {
    pub fn upgrade(&self) -> Result<Namespace, Diagnostic> {
        self.0
            .upgrade()
            .map(|inner| Namespace { inner })
            .ok_or_else(|| {
                Diagnostic::runtime(
                    "the module this function was defined in no longer exists".to_string(),
                    Span::dummy(),
                )
            })
    }

    /// The current generation, or `None` once the namespace is dropped.
    pub fn generation(&self) -> Option<u64> {
        self.0
            .upgrade()
            .map(|inner| inner.generation.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for WeakNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.upgrade() {
            Some(inner) => write!(f, "<namespace {} #{}>", inner.name, inner.id),
            None => write!(f, "<dropped namespace>"),
        }
    }
}

//! # Construction cache
//!
//! Memoizes node construction by `(head, arguments, evaluate flag)`, so building the same applied
//! function or the same evaluated derivative twice returns the node stored the first time.
//! The cache is owned by a `Context`, there is no process wide instance.
//!
//! Lookup and insert each take the single mutex; the build closure runs with the lock released,
//! because building a node recurses into the cache for its subexpressions. If two threads build
//! the same key, the value stored first wins and both callers receive it. Entries are never
//! evicted, `clear` exists for tests and long-running callers.
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_functions::FunctionRef;
use log::trace;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Apply {
        function: FunctionRef,
        args: Vec<Expr>,
        evaluate: bool,
    },
    /// evaluated derivative of `expr` by `(entity, order)` pairs
    Derivative {
        expr: Expr,
        variables: Vec<(Expr, u32)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ConstructionCache {
    enabled: bool,
    entries: Mutex<FxHashMap<CacheKey, Expr>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConstructionCache {
    pub fn new(enabled: bool) -> Self {
        ConstructionCache {
            enabled,
            entries: Mutex::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // a panic inside a build never runs under the lock, the map is always consistent
    fn lock(&self) -> MutexGuard<'_, FxHashMap<CacheKey, Expr>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached node for `key`, or runs `build` and stores its result.
    /// A failed build stores nothing.
    pub fn construct<F>(&self, key: CacheKey, build: F) -> Result<Expr, SymbolicError>
    where
        F: FnOnce() -> Result<Expr, SymbolicError>,
    {
        if !self.enabled {
            return build();
        }
        let cached = self.lock().get(&key).cloned();
        if let Some(hit) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("cache hit: {}", hit);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let built = build()?;
        let mut entries = self.lock();
        Ok(entries.entry(key).or_insert(built).clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for ConstructionCache {
    fn default() -> Self {
        ConstructionCache::new(true)
    }
}

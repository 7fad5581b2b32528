//! # Engine context
//!
//! The services every engine operation runs against: settings, the construction cache, the
//! rewrite registry and the numeric backend. A context is created once and passed by reference,
//! there is no global state, so independent contexts never share cached nodes.
//!
//! Recursive operations (applying, differentiating, substituting, rewriting) enter the context
//! through `enter`, which counts the nesting depth of the current thread. Going past
//! `EngineConfig::max_depth` fails with `RecursionLimit` instead of exhausting the stack.
//!
//! # Example
//! ```
//! use RustedSymbolic::symbolic::symbolic_context::Context;
//! use RustedSymbolic::symbolic::symbolic_functions::Function;
//! use RustedSymbolic::symbolic::symbolic_engine::Expr;
//! let ctx = Context::new();
//! let x = Expr::symbol("x");
//! let f = Function::undefined("f");
//! let fx = ctx.call(&f, &[x.clone()]).unwrap();
//! let d3 = ctx.diff_n(&fx, &x, 3).unwrap();
//! assert_eq!(d3.to_string(), "Derivative(f(x), x, x, x)");
//! ```
use crate::Utils::engine_config::EngineConfig;
use crate::Utils::logger::init_logger;
use crate::symbolic::symbolic_cache::ConstructionCache;
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_rewrite::RewriteRegistry;
use crate::symbolic::symbolic_traits::{F64Backend, NumericBackend};
use log::{info, warn};
use std::cell::Cell;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Releases one level of nesting when dropped.
pub struct DepthGuard {
    depth: usize,
}

impl DepthGuard {
    fn new() -> Self {
        let depth = DEPTH.with(|d| {
            let n = d.get() + 1;
            d.set(n);
            n
        });
        DepthGuard { depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

pub struct Context {
    config: EngineConfig,
    cache: ConstructionCache,
    rewrites: RewriteRegistry,
    numeric: Box<dyn NumericBackend>,
}

impl Context {
    pub fn new() -> Self {
        Context::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = ConstructionCache::new(config.cache_enabled);
        Context {
            config,
            cache,
            rewrites: RewriteRegistry::with_builtins(),
            numeric: Box::new(F64Backend),
        }
    }

    /// same context evaluating float applications with another backend
    pub fn with_backend(mut self, backend: Box<dyn NumericBackend>) -> Self {
        self.numeric = backend;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ConstructionCache {
        &self.cache
    }

    pub fn rewrites(&self) -> &RewriteRegistry {
        &self.rewrites
    }

    /// registry access for adding rewrite rules
    pub fn rewrites_mut(&mut self) -> &mut RewriteRegistry {
        &mut self.rewrites
    }

    pub fn numeric(&self) -> &dyn NumericBackend {
        self.numeric.as_ref()
    }

    /// Installs the logger described by the logging settings.
    pub fn init_logging(&self) -> bool {
        let installed = init_logger(&self.config.logging);
        if installed {
            info!(
                "symbolic engine: max_depth {}, cache {}",
                self.config.max_depth, self.config.cache_enabled
            );
        }
        installed
    }

    /// Enters one level of recursion, the level is released when the guard drops.
    pub fn enter(&self) -> Result<DepthGuard, SymbolicError> {
        let guard = DepthGuard::new();
        if guard.depth() > self.config.max_depth {
            warn!("recursion depth {} exceeded", self.config.max_depth);
            return Err(SymbolicError::RecursionLimit {
                limit: self.config.max_depth,
            });
        }
        Ok(guard)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

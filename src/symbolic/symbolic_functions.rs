//! # Applied functions
//!
//! ## Purpose
//!
//! A function is a value: a `FunctionDescriptor { name, arity, kind, behaviour }` shared through an
//! `Arc`. Applying it to arguments produces an `Apply` node that carries the descriptor as data, so
//! new functions are made at runtime by a factory (`Function::undefined("f")`) instead of new types.
//!
//! ## Main Structures and Methods
//!
//! - `Arity` - how many arguments a function accepts
//! - `FunctionBehaviour` - optional capabilities of a defined function (canonical forms, partial
//!   derivatives, derivative override, numeric evaluation). Every method has a default, a
//!   function overrides only what it knows.
//! - `Context::apply` - arity check, canonicalization, cached construction and automatic
//!   numeric evaluation for float arguments
//! - `Context::fdiff` - partial derivative by argument slot, with the generic fallback that wraps
//!   non-entity arguments into `Subs`
//! - `Context::replace_function`, `Context::taylor_term`
//! - built-ins `sin`, `cos`, `exp`, `log`
//!
//! ## Interesting Code Features
//!
//! 1. Built-in descriptors are `LazyLock` statics, `sin()` hands out a clone of the `Arc`.
//! 2. Descriptor equality is by name and kind, so an undefined `f` created twice is the same `f`.
use crate::symbolic::symbolic_arithmetic::coeff_isneg;
use crate::symbolic::symbolic_cache::CacheKey;
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use itertools::Itertools;
use log::{debug, trace};
use num::BigInt;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

static DEFINED_IDS: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arity {
    Variadic,
    Exactly(usize),
    OneOf(Vec<usize>),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Variadic => true,
            Arity::Exactly(m) => *m == n,
            Arity::OneOf(ms) => ms.contains(&n),
        }
    }

    /// largest accepted argument count, `None` when unbounded
    pub fn max(&self) -> Option<usize> {
        match self {
            Arity::Variadic => None,
            Arity::Exactly(m) => Some(*m),
            Arity::OneOf(ms) => ms.iter().copied().max(),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Variadic => write!(f, "any number of"),
            Arity::Exactly(m) => write!(f, "{}", m),
            Arity::OneOf(ms) => write!(f, "{}", ms.iter().join(" or ")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionKind {
    /// no behaviour, applications stay symbolic
    Undefined,
    Defined,
}

/// Outcome of a function's own derivative rule.
pub enum DerivativeRule {
    /// use the chain rule over `fdiff`
    ChainRule,
    Computed(Expr),
    /// derivative is not computable, the engine keeps it unevaluated
    NotComputable,
}

pub trait FunctionBehaviour: Send + Sync {
    /// Canonical replacement of `f(args)` or `None` to build the node as is.
    fn canonicalize(&self, _ctx: &Context, _args: &[Expr]) -> Result<Option<Expr>, SymbolicError> {
        Ok(None)
    }

    /// Partial derivative with respect to the 1-based argument slot `argindex`.
    /// `None` falls back to the generic rule.
    fn fdiff(
        &self,
        _ctx: &Context,
        _args: &[Expr],
        _argindex: usize,
    ) -> Result<Option<Expr>, SymbolicError> {
        Ok(None)
    }

    fn eval_derivative(
        &self,
        _ctx: &Context,
        _node: &Expr,
        _s: &Expr,
    ) -> Result<DerivativeRule, SymbolicError> {
        Ok(DerivativeRule::ChainRule)
    }

    fn evalf(&self, _args: &[f64]) -> Option<f64> {
        None
    }
}

pub struct FunctionDescriptor {
    name: String,
    arity: Arity,
    kind: FunctionKind,
    /// 0 for undefined functions, a unique id for every defined one
    id: u64,
    behaviour: Option<Arc<dyn FunctionBehaviour>>,
}

pub type FunctionRef = Arc<FunctionDescriptor>;

impl FunctionDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn behaviour(&self) -> Option<&Arc<dyn FunctionBehaviour>> {
        self.behaviour.as_ref()
    }
}

// undefined functions are equal by name; each defined function is its own
impl PartialEq for FunctionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.id == other.id
    }
}

impl Eq for FunctionDescriptor {}

impl Hash for FunctionDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// Factory of function descriptors.
pub struct Function;

impl Function {
    /// undefined function of any number of arguments
    pub fn undefined(name: &str) -> FunctionRef {
        Function::undefined_with_arity(name, Arity::Variadic)
    }

    pub fn undefined_with_arity(name: &str, arity: Arity) -> FunctionRef {
        Arc::new(FunctionDescriptor {
            name: name.to_string(),
            arity,
            kind: FunctionKind::Undefined,
            id: 0,
            behaviour: None,
        })
    }

    pub fn defined(name: &str, arity: Arity, behaviour: Arc<dyn FunctionBehaviour>) -> FunctionRef {
        Arc::new(FunctionDescriptor {
            name: name.to_string(),
            arity,
            kind: FunctionKind::Defined,
            id: DEFINED_IDS.fetch_add(1, Ordering::Relaxed),
            behaviour: Some(behaviour),
        })
    }
}

/// What `Context::apply` is asked to apply: a descriptor, or a bare name that creates an
/// undefined function fixed to the number of arguments it is first applied to.
#[derive(Clone, Debug)]
pub enum FunctionHead {
    Typed(FunctionRef),
    Untyped(String),
}

impl From<FunctionRef> for FunctionHead {
    fn from(f: FunctionRef) -> Self {
        FunctionHead::Typed(f)
    }
}

impl From<&FunctionRef> for FunctionHead {
    fn from(f: &FunctionRef) -> Self {
        FunctionHead::Typed(f.clone())
    }
}

impl From<&str> for FunctionHead {
    fn from(name: &str) -> Self {
        FunctionHead::Untyped(name.to_string())
    }
}

fn argument_index_error(function: &str, argindex: usize) -> SymbolicError {
    SymbolicError::ArgumentIndex {
        function: function.to_string(),
        argindex,
    }
}

/// ELEMENTARY FUNCTIONS

struct Sin;
struct Cos;
struct Exp;
struct Log;

impl FunctionBehaviour for Sin {
    fn canonicalize(&self, ctx: &Context, args: &[Expr]) -> Result<Option<Expr>, SymbolicError> {
        let arg = &args[0];
        if arg.is_zero() {
            return Ok(Some(Expr::zero()));
        }
        // odd
        if coeff_isneg(arg) {
            return Ok(Some(-ctx.call(&sin(), &[-arg])?));
        }
        Ok(None)
    }

    fn fdiff(&self, ctx: &Context, args: &[Expr], argindex: usize) -> Result<Option<Expr>, SymbolicError> {
        if argindex != 1 {
            return Err(argument_index_error("sin", argindex));
        }
        Ok(Some(ctx.call(&cos(), args)?))
    }

    fn evalf(&self, args: &[f64]) -> Option<f64> {
        Some(args[0].sin())
    }
}

impl FunctionBehaviour for Cos {
    fn canonicalize(&self, ctx: &Context, args: &[Expr]) -> Result<Option<Expr>, SymbolicError> {
        let arg = &args[0];
        if arg.is_zero() {
            return Ok(Some(Expr::one()));
        }
        // even
        if coeff_isneg(arg) {
            return Ok(Some(ctx.call(&cos(), &[-arg])?));
        }
        Ok(None)
    }

    fn fdiff(&self, ctx: &Context, args: &[Expr], argindex: usize) -> Result<Option<Expr>, SymbolicError> {
        if argindex != 1 {
            return Err(argument_index_error("cos", argindex));
        }
        Ok(Some(-ctx.call(&sin(), args)?))
    }

    fn evalf(&self, args: &[f64]) -> Option<f64> {
        Some(args[0].cos())
    }
}

impl FunctionBehaviour for Exp {
    fn canonicalize(&self, _ctx: &Context, args: &[Expr]) -> Result<Option<Expr>, SymbolicError> {
        let arg = &args[0];
        if arg.is_zero() {
            return Ok(Some(Expr::one()));
        }
        if let Some((function, inner)) = arg.as_application() {
            if is_builtin(function, "log") {
                return Ok(Some(inner[0].clone()));
            }
        }
        Ok(None)
    }

    fn fdiff(&self, ctx: &Context, args: &[Expr], argindex: usize) -> Result<Option<Expr>, SymbolicError> {
        if argindex != 1 {
            return Err(argument_index_error("exp", argindex));
        }
        Ok(Some(ctx.call(&exp(), args)?))
    }

    fn evalf(&self, args: &[f64]) -> Option<f64> {
        Some(args[0].exp())
    }
}

impl FunctionBehaviour for Log {
    fn canonicalize(&self, _ctx: &Context, args: &[Expr]) -> Result<Option<Expr>, SymbolicError> {
        if args[0].is_one() {
            return Ok(Some(Expr::zero()));
        }
        Ok(None)
    }

    fn fdiff(&self, _ctx: &Context, args: &[Expr], argindex: usize) -> Result<Option<Expr>, SymbolicError> {
        if argindex != 1 {
            return Err(argument_index_error("log", argindex));
        }
        Ok(Some(args[0].pow(-1)))
    }

    fn evalf(&self, args: &[f64]) -> Option<f64> {
        if args[0] > 0.0 { Some(args[0].ln()) } else { None }
    }
}

static SIN: LazyLock<FunctionRef> =
    LazyLock::new(|| Function::defined("sin", Arity::Exactly(1), Arc::new(Sin)));
static COS: LazyLock<FunctionRef> =
    LazyLock::new(|| Function::defined("cos", Arity::Exactly(1), Arc::new(Cos)));
static EXP: LazyLock<FunctionRef> =
    LazyLock::new(|| Function::defined("exp", Arity::Exactly(1), Arc::new(Exp)));
static LOG: LazyLock<FunctionRef> =
    LazyLock::new(|| Function::defined("log", Arity::Exactly(1), Arc::new(Log)));

pub fn sin() -> FunctionRef {
    SIN.clone()
}

pub fn cos() -> FunctionRef {
    COS.clone()
}

pub fn exp() -> FunctionRef {
    EXP.clone()
}

pub fn log() -> FunctionRef {
    LOG.clone()
}

/// true if `f` is the built-in function called `name`
pub(crate) fn is_builtin(f: &FunctionRef, name: &str) -> bool {
    let builtin = match name {
        "sin" => &*SIN,
        "cos" => &*COS,
        "exp" => &*EXP,
        "log" => &*LOG,
        _ => return false,
    };
    f == builtin
}

/// division by zero or `log(0)` somewhere in the tree
fn is_unbounded(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Pow(base, exp) if base.is_zero() && exp.as_number().is_some_and(|n| n.is_negative()) => true,
        ExprKind::Apply(f, args) if is_builtin(f, "log") && args[0].is_zero() => true,
        _ => e.operands().iter().any(is_unbounded),
    }
}

impl Context {
    /// Applies a function to arguments.
    ///
    /// With `evaluate` the function's canonical form is consulted first and a node with a float
    /// argument is replaced by its numeric value at the smallest precision among the float
    /// arguments, when the numeric backend can evaluate it.
    pub fn apply(
        &self,
        head: impl Into<FunctionHead>,
        args: &[Expr],
        evaluate: bool,
    ) -> Result<Expr, SymbolicError> {
        let function = match head.into() {
            FunctionHead::Typed(f) => f,
            FunctionHead::Untyped(name) => {
                Function::undefined_with_arity(&name, Arity::Exactly(args.len()))
            }
        };
        if !function.arity().accepts(args.len()) {
            return Err(SymbolicError::ArityMismatch {
                name: function.name().to_string(),
                expected: function.arity().to_string(),
                given: args.len(),
            });
        }
        let _guard = self.enter()?;
        let key = CacheKey::Apply {
            function: function.clone(),
            args: args.to_vec(),
            evaluate,
        };
        self.cache()
            .construct(key, || self.build_application(&function, args, evaluate))
    }

    /// `apply` with evaluation
    pub fn call(&self, function: &FunctionRef, args: &[Expr]) -> Result<Expr, SymbolicError> {
        self.apply(function, args, true)
    }

    fn build_application(
        &self,
        function: &FunctionRef,
        args: &[Expr],
        evaluate: bool,
    ) -> Result<Expr, SymbolicError> {
        if evaluate {
            if let Some(behaviour) = function.behaviour() {
                if let Some(canonical) = behaviour.canonicalize(self, args)? {
                    trace!("{}{:?} canonicalized to {}", function.name(), args, canonical);
                    return Ok(canonical);
                }
            }
        }
        let node = Expr::apply_raw(function.clone(), args.to_vec());
        if evaluate {
            if let Some(prec) = args.iter().filter_map(Expr::float_precision).min() {
                if let Some(value) = self.numeric().evaluate(&node, prec) {
                    debug!("{} evaluated numerically at precision {}: {}", node, prec, value);
                    return Ok(value);
                }
            }
        }
        Ok(node)
    }

    /// Partial derivative of an applied function with respect to its 1-based argument slot.
    pub fn fdiff(&self, applied: &Expr, argindex: usize) -> Result<Expr, SymbolicError> {
        let (function, args) = applied.as_application().ok_or_else(|| {
            SymbolicError::Unsupported(format!("fdiff of {}, which is not an applied function", applied))
        })?;
        if let Some(behaviour) = function.behaviour() {
            if let Some(partial) = behaviour.fdiff(self, args, argindex)? {
                return Ok(partial);
            }
        }
        self.generic_fdiff(applied, function, args, argindex)
    }

    /// Derivative by a slot without knowledge of the function: `Derivative(f(.., a, ..), a)` when
    /// the argument is a differentiation entity, otherwise
    /// `Subs(Derivative(f(.., xi, ..), xi), xi, a)`.
    fn generic_fdiff(
        &self,
        applied: &Expr,
        function: &FunctionRef,
        args: &[Expr],
        argindex: usize,
    ) -> Result<Expr, SymbolicError> {
        let in_range = match function.arity().max() {
            Some(max) => argindex <= max,
            None => true,
        };
        if argindex == 0 || !in_range || argindex > args.len() {
            return Err(argument_index_error(function.name(), argindex));
        }
        let arg = &args[argindex - 1];
        if arg.diff_wrt() {
            return Ok(Expr::derivative_raw(applied.clone(), vec![(arg.clone(), 1)]));
        }
        let xi = Expr::dummy(&format!("xi_{}", argindex));
        // only the slot is replaced, equal subexpressions elsewhere in the arguments stay
        let mut slots = args.to_vec();
        slots[argindex - 1] = xi.clone();
        let derivative = Expr::derivative_raw(
            Expr::apply_raw(function.clone(), slots),
            vec![(xi.clone(), 1)],
        );
        self.build_subs(&derivative, &[xi], &[arg.clone()])
    }

    /// Chain rule over the arguments of an applied function. Arguments whose derivative is
    /// exactly zero contribute nothing.
    pub(crate) fn apply_derivative(&self, node: &Expr, s: &Expr) -> Result<Option<Expr>, SymbolicError> {
        let Some((function, args)) = node.as_application() else {
            return Ok(None);
        };
        if let Some(behaviour) = function.behaviour() {
            match behaviour.eval_derivative(self, node, s)? {
                DerivativeRule::Computed(d) => return Ok(Some(d)),
                DerivativeRule::NotComputable => return Ok(None),
                DerivativeRule::ChainRule => {}
            }
        }
        let mut terms = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let da = self.diff(a, &[s.into()])?;
            if da.is_zero() {
                continue;
            }
            let df = match self.fdiff(node, i + 1) {
                Err(SymbolicError::ArgumentIndex { .. }) => {
                    self.generic_fdiff(node, function, args, i + 1)?
                }
                other => other?,
            };
            terms.push(df * da);
        }
        Ok(Some(Expr::add_all(terms)))
    }

    /// Replaces every application of `old` by an application of `new`, where `new` accepts the
    /// argument count; other applications are kept.
    pub fn replace_function(
        &self,
        expr: &Expr,
        old: &FunctionRef,
        new: &FunctionRef,
    ) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        let operands = expr.operands();
        if operands.is_empty() {
            return Ok(expr.clone());
        }
        let replaced = operands
            .iter()
            .map(|o| self.replace_function(o, old, new))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some((function, _)) = expr.as_application() {
            if function == old && new.arity().accepts(replaced.len()) {
                return self.call(new, &replaced);
            }
        }
        if replaced.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(expr.clone());
        }
        self.rebuild(expr, replaced)
    }

    /// `n`-th Taylor term of `expr` around `x = 0`: `expr^(n)(0) * x^n / n!`.
    pub fn taylor_term(&self, expr: &Expr, x: &Expr, n: u32) -> Result<Expr, SymbolicError> {
        let derivative = self.diff(expr, &[x.into(), n.into()])?;
        let at_zero = self.subs(&derivative, x, &Expr::zero())?;
        if is_unbounded(&at_zero) {
            return Err(SymbolicError::PoleError(format!(
                "{} is unbounded at {} = 0",
                derivative, x
            )));
        }
        let factorial: BigInt = (1..=n).map(BigInt::from).product();
        Ok(at_zero * x.pow(n) / Expr::from(factorial))
    }
}

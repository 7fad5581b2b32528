//! # Symbolic Engine Module
//!
//! Core expression type of the crate. An expression is an immutable node shared through an `Arc`,
//! so identical subtrees can be referenced from many parents and cloning an `Expr` is cheap.
//!
//! ## Purpose
//!
//! The engine provides:
//! - Symbols (ordinary names and fresh placeholders with a unique id)
//! - Exact rationals and precision-tagged floats
//! - N-ary sums and products, powers
//! - Applied functions, unevaluated derivatives, deferred substitutions, anonymous functions
//!
//! ## Main Structures and Methods
//!
//! ### `Expr`
//! A handle to an `ExprNode { hash, kind }`. The structural hash is computed once at construction.
//! Equality checks pointers first, rejects on hash mismatch and only then compares structure.
//! `Subs` and `Lambda` nodes compare modulo renaming of their placeholders, and their hashes are
//! computed from rename-invariant data so that hashing agrees with equality.
//!
//! ### Key Methods
//! - `Symbols(symbols: &str)` - several symbols from a comma separated string
//! - `free_symbols()` - unbound symbols
//! - `operands()` / `with_operands()` - the replaceable children of a node and raw rebuilding
//! - `xreplace()` - context free structural replacement
//!
//! ## Interesting Code Features
//!
//! 1. **Precomputed structural hash** gives O(1) rejection in equality and cache lookups
//! 2. **Iterative drop** so that very deep trees do not overflow the stack when released
//! 3. **Operator overloading** for `Expr` and `&Expr`, e.g. `&x * 2 + &y`
//! 4. **`symbols!` macro** for ergonomic symbol creation

#![allow(non_camel_case_types)]

use crate::symbolic::symbolic_functions::FunctionRef;
use crate::symbolic::symbolic_lambda::lambda_equal;
use crate::symbolic::symbolic_numbers::{DEFAULT_PRECISION, Number};
use crate::symbolic::symbolic_subs::subs_equal;
use itertools::Itertools;
use num::BigRational;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

static DUMMY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Swapped into drained nodes during iterative drop.
static DRAIN_PLACEHOLDER: LazyLock<Expr> = LazyLock::new(Expr::zero);

/// A named symbol. `dummy == 0` is an ordinary symbol, every other value is a fresh placeholder
/// that never compares equal to a symbol created elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: Arc<str>,
    dummy: u64,
}

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol {
            name: Arc::from(name),
            dummy: 0,
        }
    }

    /// fresh placeholder with a globally unique id
    pub fn dummy(name: &str) -> Self {
        Symbol {
            name: Arc::from(name),
            dummy: DUMMY_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy != 0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_dummy() {
            write!(f, "_{}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

pub enum ExprKind {
    Symbol(Symbol),
    Number(Number),
    /// sum of at least two canonically sorted terms
    Add(Vec<Expr>),
    /// product of at least two canonically sorted factors, numeric coefficient first
    Mul(Vec<Expr>),
    Pow(Expr, Expr),
    Apply(FunctionRef, Vec<Expr>),
    /// differentiated expression and `(entity, order)` pairs, adjacent entities merged, no order 0
    Derivative(Expr, Vec<(Expr, u32)>),
    Subs {
        expr: Expr,
        variables: Vec<Expr>,
        point: Vec<Expr>,
    },
    Lambda {
        variables: Vec<Expr>,
        body: Expr,
    },
    IdentityFunction,
}

pub struct ExprNode {
    hash: u64,
    kind: ExprKind,
}

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    pub(crate) fn new_node(kind: ExprKind) -> Expr {
        let hash = compute_hash(&kind);
        Expr(Arc::new(ExprNode { hash, kind }))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// precomputed structural hash
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// BASIC FEATURES

    pub fn symbol(name: &str) -> Expr {
        Expr::new_node(ExprKind::Symbol(Symbol::new(name)))
    }

    pub fn dummy(name: &str) -> Expr {
        Expr::new_node(ExprKind::Symbol(Symbol::dummy(name)))
    }

    pub fn from_symbol(symbol: Symbol) -> Expr {
        Expr::new_node(ExprKind::Symbol(symbol))
    }

    /// Creates multiple symbolic variables from a comma-separated string.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let vars = Expr::Symbols("x, y, z");
    /// assert_eq!(vars.len(), 3);
    /// ```
    pub fn Symbols(symbols: &str) -> Vec<Expr> {
        symbols
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Expr::symbol)
            .collect()
    }

    pub fn number(n: Number) -> Expr {
        Expr::new_node(ExprKind::Number(n))
    }

    pub fn integer(n: i64) -> Expr {
        Expr::number(Number::integer(n))
    }

    /// `n/d`; a zero denominator yields the unevaluated power `n * 0^-1`
    pub fn rational(n: i64, d: i64) -> Expr {
        match Number::rational(n, d) {
            Some(r) => Expr::number(r),
            None => Expr::integer(n) * Expr::integer(0).pow(-1),
        }
    }

    pub fn big_rational(r: BigRational) -> Expr {
        Expr::number(Number::Rational(r))
    }

    pub fn float(value: f64) -> Expr {
        Expr::number(Number::float(value, DEFAULT_PRECISION))
    }

    pub fn float_with_prec(value: f64, prec: u32) -> Expr {
        Expr::number(Number::float(value, prec))
    }

    pub fn zero() -> Expr {
        Expr::integer(0)
    }

    pub fn one() -> Expr {
        Expr::integer(1)
    }

    /// the identity function singleton, what a unary `Lambda(x, x)` collapses to
    pub fn identity() -> Expr {
        Expr::new_node(ExprKind::IdentityFunction)
    }

    /// applied function node built without canonicalization or caching
    pub fn apply_raw(function: FunctionRef, args: Vec<Expr>) -> Expr {
        Expr::new_node(ExprKind::Apply(function, args))
    }

    /// Builds an unevaluated derivative. Order-0 pairs are dropped, adjacent equal entities are
    /// merged and a nested derivative is flattened into one node; with nothing left to
    /// differentiate the expression itself is returned.
    pub fn derivative_raw(expr: Expr, variables: Vec<(Expr, u32)>) -> Expr {
        let (inner, mut merged) = match expr.kind() {
            ExprKind::Derivative(inner, existing) => (inner.clone(), existing.clone()),
            _ => (expr, Vec::new()),
        };
        for (v, n) in variables {
            if n == 0 {
                continue;
            }
            match merged.last_mut() {
                Some((last, count)) if *last == v => *count = count.saturating_add(n),
                _ => merged.push((v, n)),
            }
        }
        if merged.is_empty() {
            return inner;
        }
        Expr::new_node(ExprKind::Derivative(inner, merged))
    }

    /// `Subs` node over variables that already are placeholders
    pub(crate) fn subs_raw(expr: Expr, variables: Vec<Expr>, point: Vec<Expr>) -> Expr {
        Expr::new_node(ExprKind::Subs {
            expr,
            variables,
            point,
        })
    }

    /// `Lambda` node over variables that already are placeholders
    pub(crate) fn lambda_raw(variables: Vec<Expr>, body: Expr) -> Expr {
        Expr::new_node(ExprKind::Lambda { variables, body })
    }

    /// PREDICATES AND ACCESSORS

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self.kind() {
            ExprKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_application(&self) -> Option<(&FunctionRef, &[Expr])> {
        match self.kind() {
            ExprKind::Apply(function, args) => Some((function, args)),
            _ => None,
        }
    }

    pub fn as_derivative(&self) -> Option<(&Expr, &[(Expr, u32)])> {
        match self.kind() {
            ExprKind::Derivative(expr, variables) => Some((expr, variables)),
            _ => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.kind(), ExprKind::Symbol(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind(), ExprKind::Number(_))
    }

    pub fn is_add(&self) -> bool {
        matches!(self.kind(), ExprKind::Add(_))
    }

    pub fn is_mul(&self) -> bool {
        matches!(self.kind(), ExprKind::Mul(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind(), ExprKind::Apply(..))
    }

    pub fn is_derivative(&self) -> bool {
        matches!(self.kind(), ExprKind::Derivative(..))
    }

    /// exact zero
    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(Number::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_number().is_some_and(Number::is_one)
    }

    /// Whether the expression may be used as a differentiation variable: symbols, applied
    /// functions and derivatives of applied functions.
    pub fn diff_wrt(&self) -> bool {
        match self.kind() {
            ExprKind::Symbol(_) | ExprKind::Apply(..) => true,
            ExprKind::Derivative(inner, _) => inner.is_function(),
            _ => false,
        }
    }

    /// precision of a float literal, `None` for everything else
    pub fn float_precision(&self) -> Option<u32> {
        self.as_number().and_then(Number::precision)
    }

    /// number of arguments a callable expression takes
    pub fn nargs(&self) -> Option<usize> {
        match self.kind() {
            ExprKind::Lambda { variables, .. } => Some(variables.len()),
            ExprKind::IdentityFunction => Some(1),
            _ => None,
        }
    }

    /// Differentiation steps of a derivative, one entry per repetition.
    pub fn variables(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Derivative(_, variables) => variables
                .iter()
                .flat_map(|(v, n)| std::iter::repeat_n(v.clone(), *n as usize))
                .collect(),
            ExprKind::Subs { variables, .. } | ExprKind::Lambda { variables, .. } => {
                variables.clone()
            }
            _ => Vec::new(),
        }
    }

    /// All children in order, including the bound placeholders of `Subs` and `Lambda`.
    pub fn args(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Subs {
                expr,
                variables,
                point,
            } => std::iter::once(expr.clone())
                .chain(variables.iter().cloned())
                .chain(point.iter().cloned())
                .collect(),
            ExprKind::Lambda { variables, body } => variables
                .iter()
                .cloned()
                .chain(std::iter::once(body.clone()))
                .collect(),
            _ => self.operands(),
        }
    }

    /// Children a substitution or rewrite may replace. Bound placeholders are excluded and the
    /// entities of a derivative are listed once per `(entity, order)` pair.
    pub fn operands(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Symbol(_) | ExprKind::Number(_) | ExprKind::IdentityFunction => Vec::new(),
            ExprKind::Add(terms) | ExprKind::Mul(terms) => terms.clone(),
            ExprKind::Pow(base, exp) => vec![base.clone(), exp.clone()],
            ExprKind::Apply(_, args) => args.clone(),
            ExprKind::Derivative(expr, variables) => std::iter::once(expr.clone())
                .chain(variables.iter().map(|(v, _)| v.clone()))
                .collect(),
            ExprKind::Subs { expr, point, .. } => std::iter::once(expr.clone())
                .chain(point.iter().cloned())
                .collect(),
            ExprKind::Lambda { body, .. } => vec![body.clone()],
        }
    }

    /// Rebuilds a node of the same kind from new operands without any context: sums, products
    /// and powers are re-canonicalized, applied functions are rebuilt as they are.
    pub fn with_operands(&self, operands: Vec<Expr>) -> Expr {
        match self.kind() {
            ExprKind::Symbol(_) | ExprKind::Number(_) | ExprKind::IdentityFunction => self.clone(),
            ExprKind::Add(_) => Expr::add_all(operands),
            ExprKind::Mul(_) => Expr::mul_all(operands),
            ExprKind::Pow(..) => {
                let mut it = operands.into_iter();
                match (it.next(), it.next()) {
                    (Some(base), Some(exp)) => base.pow(exp),
                    _ => self.clone(),
                }
            }
            ExprKind::Apply(function, _) => Expr::apply_raw(function.clone(), operands),
            ExprKind::Derivative(_, variables) => {
                let mut it = operands.into_iter();
                match it.next() {
                    Some(expr) => Expr::derivative_raw(
                        expr,
                        it.zip(variables.iter().map(|(_, n)| *n)).collect(),
                    ),
                    None => self.clone(),
                }
            }
            ExprKind::Subs { variables, .. } => {
                let mut it = operands.into_iter();
                match it.next() {
                    Some(expr) => Expr::subs_raw(expr, variables.clone(), it.collect()),
                    None => self.clone(),
                }
            }
            ExprKind::Lambda { variables, .. } => match operands.into_iter().next() {
                Some(body) => Expr::lambda_raw(variables.clone(), body),
                None => self.clone(),
            },
        }
    }

    /// Set of unbound symbols.
    pub fn free_symbols(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        self.collect_free_symbols(&mut out);
        out
    }

    fn collect_free_symbols(&self, out: &mut FxHashSet<Symbol>) {
        match self.kind() {
            ExprKind::Symbol(s) => {
                out.insert(s.clone());
            }
            ExprKind::Number(_) | ExprKind::IdentityFunction => {}
            ExprKind::Derivative(expr, _) => expr.collect_free_symbols(out),
            ExprKind::Subs {
                expr,
                variables,
                point,
            } => {
                let mut inner = expr.free_symbols();
                for v in variables {
                    if let Some(s) = v.as_symbol() {
                        inner.remove(s);
                    }
                }
                out.extend(inner);
                for p in point {
                    p.collect_free_symbols(out);
                }
            }
            ExprKind::Lambda { variables, body } => {
                let mut inner = body.free_symbols();
                for v in variables {
                    if let Some(s) = v.as_symbol() {
                        inner.remove(s);
                    }
                }
                out.extend(inner);
            }
            _ => {
                for op in self.operands() {
                    op.collect_free_symbols(out);
                }
            }
        }
    }

    /// free symbols sorted by name and id
    pub fn sorted_free_symbols(&self) -> Vec<Symbol> {
        self.free_symbols().into_iter().sorted().collect()
    }

    /// whether `pattern` occurs structurally anywhere in the tree
    pub fn has(&self, pattern: &Expr) -> bool {
        self == pattern || self.args().iter().any(|a| a.has(pattern))
    }

    /// Structural replacement without evaluation of applied functions. Matches are looked up
    /// top-down and a replaced subtree is not searched again.
    pub fn xreplace(&self, rules: &FxHashMap<Expr, Expr>) -> Expr {
        if let Some(replacement) = rules.get(self) {
            return replacement.clone();
        }
        let operands = self.operands();
        if operands.is_empty() {
            return self.clone();
        }
        let replaced: Vec<Expr> = operands.iter().map(|o| o.xreplace(rules)).collect();
        if replaced.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
            return self.clone();
        }
        self.with_operands(replaced)
    }

    /// `xreplace` from parallel slices
    pub fn xreplace_pairs(&self, old: &[Expr], new: &[Expr]) -> Expr {
        let rules: FxHashMap<Expr, Expr> = old.iter().cloned().zip(new.iter().cloned()).collect();
        self.xreplace(&rules)
    }
}

fn compute_hash(kind: &ExprKind) -> u64 {
    let mut h = FxHasher::default();
    std::mem::discriminant(kind).hash(&mut h);
    match kind {
        ExprKind::Symbol(s) => s.hash(&mut h),
        ExprKind::Number(n) => n.hash(&mut h),
        ExprKind::Add(args) | ExprKind::Mul(args) | ExprKind::Apply(_, args) => {
            if let ExprKind::Apply(function, _) = kind {
                function.hash(&mut h);
            }
            for a in args {
                h.write_u64(a.hash_value());
            }
        }
        ExprKind::Pow(base, exp) => {
            h.write_u64(base.hash_value());
            h.write_u64(exp.hash_value());
        }
        ExprKind::Derivative(expr, variables) => {
            h.write_u64(expr.hash_value());
            for (v, n) in variables {
                h.write_u64(v.hash_value());
                h.write_u32(*n);
            }
        }
        // placeholders are renamed freely, only rename invariant content takes part
        ExprKind::Subs {
            expr,
            variables,
            point,
        } => {
            let mut point_hashes: Vec<u64> = point.iter().map(Expr::hash_value).collect();
            point_hashes.sort_unstable();
            point_hashes.hash(&mut h);
            let node_free = {
                let mut inner = expr.free_symbols();
                for v in variables {
                    if let Some(s) = v.as_symbol() {
                        inner.remove(s);
                    }
                }
                for p in point {
                    inner.extend(p.free_symbols());
                }
                inner
            };
            node_free.into_iter().sorted().collect::<Vec<_>>().hash(&mut h);
        }
        ExprKind::Lambda { variables, body } => {
            variables.len().hash(&mut h);
            let mut inner = body.free_symbols();
            for v in variables {
                if let Some(s) = v.as_symbol() {
                    inner.remove(s);
                }
            }
            inner.into_iter().sorted().collect::<Vec<_>>().hash(&mut h);
        }
        ExprKind::IdentityFunction => {}
    }
    h.finish()
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.hash_value() != other.hash_value() {
            return false;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Symbol(a), ExprKind::Symbol(b)) => a == b,
            (ExprKind::Number(a), ExprKind::Number(b)) => a == b,
            (ExprKind::Add(a), ExprKind::Add(b)) | (ExprKind::Mul(a), ExprKind::Mul(b)) => a == b,
            (ExprKind::Pow(b1, e1), ExprKind::Pow(b2, e2)) => b1 == b2 && e1 == e2,
            (ExprKind::Apply(f, a), ExprKind::Apply(g, b)) => f == g && a == b,
            (ExprKind::Derivative(e1, v1), ExprKind::Derivative(e2, v2)) => e1 == e2 && v1 == v2,
            (
                ExprKind::Subs {
                    expr: e1,
                    variables: v1,
                    point: p1,
                },
                ExprKind::Subs {
                    expr: e2,
                    variables: v2,
                    point: p2,
                },
            ) => subs_equal((e1, &v1[..], &p1[..]), (e2, &v2[..], &p2[..])),
            (
                ExprKind::Lambda {
                    variables: v1,
                    body: b1,
                },
                ExprKind::Lambda {
                    variables: v2,
                    body: b2,
                },
            ) => lambda_equal((&v1[..], b1), (&v2[..], b2)),
            (ExprKind::IdentityFunction, ExprKind::IdentityFunction) => true,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl Drop for ExprNode {
    fn drop(&mut self) {
        fn drain_children(kind: &mut ExprKind, queue: &mut Vec<Expr>) {
            let placeholder = || DRAIN_PLACEHOLDER.clone();
            match kind {
                ExprKind::Add(terms) | ExprKind::Mul(terms) | ExprKind::Apply(_, terms) => {
                    queue.append(terms);
                }
                ExprKind::Pow(base, exp) => {
                    queue.push(std::mem::replace(base, placeholder()));
                    queue.push(std::mem::replace(exp, placeholder()));
                }
                ExprKind::Derivative(expr, variables) => {
                    queue.push(std::mem::replace(expr, placeholder()));
                    queue.extend(variables.drain(..).map(|(v, _)| v));
                }
                ExprKind::Subs {
                    expr,
                    variables,
                    point,
                } => {
                    queue.push(std::mem::replace(expr, placeholder()));
                    queue.append(variables);
                    queue.append(point);
                }
                ExprKind::Lambda { variables, body } => {
                    queue.push(std::mem::replace(body, placeholder()));
                    queue.append(variables);
                }
                ExprKind::Symbol(_) | ExprKind::Number(_) | ExprKind::IdentityFunction => {}
            }
        }

        // leaves need no work, this also keeps the placeholder itself out of the loop
        if matches!(
            self.kind,
            ExprKind::Symbol(_) | ExprKind::Number(_) | ExprKind::IdentityFunction
        ) {
            return;
        }
        let mut work_queue = Vec::new();
        drain_children(&mut self.kind, &mut work_queue);
        while let Some(child) = work_queue.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child.0) {
                drain_children(&mut node.kind, &mut work_queue);
            }
        }
    }
}

fn parenthesize(e: &Expr, wrap: bool) -> String {
    if wrap {
        format!("({})", e)
    } else {
        e.to_string()
    }
}

fn tuple_string(items: &[Expr]) -> String {
    if items.len() == 1 {
        format!("({},)", items[0])
    } else {
        format!("({})", items.iter().join(", "))
    }
}

/// Display implementation for printing symbolic expressions.
///
/// Sums print as `x + 2*y - z`, powers as `x^2`, unevaluated nodes in constructor form:
/// `Derivative(f(x), x, x)`, `Subs(f(_x), (_x,), (0,))`, `Lambda((_x,), _x^2)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ExprKind::Symbol(s) => write!(f, "{}", s),
            ExprKind::Number(n) => write!(f, "{}", n),
            ExprKind::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i == 0 {
                        write!(f, "{}", term)?;
                    } else if crate::symbolic::symbolic_arithmetic::coeff_isneg(term) {
                        write!(f, " - {}", -term)?;
                    } else {
                        write!(f, " + {}", term)?;
                    }
                }
                Ok(())
            }
            ExprKind::Mul(factors) => {
                let (sign, rest) = match factors.first().and_then(Expr::as_number) {
                    Some(c) if c.is_minus_one() => ("-", &factors[1..]),
                    _ => ("", &factors[..]),
                };
                let body = rest.iter().map(|x| parenthesize(x, x.is_add())).join("*");
                write!(f, "{}{}", sign, body)
            }
            ExprKind::Pow(base, exp) => {
                let wrap_base = match base.kind() {
                    ExprKind::Add(_) | ExprKind::Mul(_) | ExprKind::Pow(..) => true,
                    ExprKind::Number(n) => n.is_negative() || !n.is_integer(),
                    _ => false,
                };
                let wrap_exp = match exp.kind() {
                    ExprKind::Symbol(_) | ExprKind::Apply(..) => false,
                    ExprKind::Number(n) => n.is_negative() || !n.is_integer(),
                    _ => true,
                };
                write!(
                    f,
                    "{}^{}",
                    parenthesize(base, wrap_base),
                    parenthesize(exp, wrap_exp)
                )
            }
            ExprKind::Apply(function, args) => {
                write!(f, "{}({})", function.name(), args.iter().join(", "))
            }
            ExprKind::Derivative(expr, _) => {
                write!(f, "Derivative({}, {})", expr, self.variables().iter().join(", "))
            }
            ExprKind::Subs {
                expr,
                variables,
                point,
            } => write!(
                f,
                "Subs({}, {}, {})",
                expr,
                tuple_string(variables),
                tuple_string(point)
            ),
            ExprKind::Lambda { variables, body } => {
                write!(f, "Lambda({}, {})", tuple_string(variables), body)
            }
            ExprKind::IdentityFunction => write!(f, "IdentityFunction"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $build:expr) => {
        impl std::ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }
        impl std::ops::$trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }
        impl std::ops::$trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }
        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }
        impl std::ops::$trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                $build(self, Expr::integer(rhs))
            }
        }
        impl std::ops::$trait<i64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr {
                $build(self.clone(), Expr::integer(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, |a: Expr, b: Expr| Expr::add_all([a, b]));
impl_binary_op!(Sub, sub, |a: Expr, b: Expr| Expr::add_all([a, -b]));
impl_binary_op!(Mul, mul, |a: Expr, b: Expr| Expr::mul_all([a, b]));
impl_binary_op!(Div, div, |a: Expr, b: Expr| Expr::mul_all([a, b.pow(-1)]));

impl std::ops::AddAssign for Expr {
    fn add_assign(&mut self, rhs: Self) {
        *self = Expr::add_all([self.clone(), rhs]);
    }
}

impl std::ops::SubAssign for Expr {
    fn sub_assign(&mut self, rhs: Self) {
        *self = Expr::add_all([self.clone(), -rhs]);
    }
}

impl std::ops::MulAssign for Expr {
    fn mul_assign(&mut self, rhs: Self) {
        *self = Expr::mul_all([self.clone(), rhs]);
    }
}

impl std::ops::DivAssign for Expr {
    fn div_assign(&mut self, rhs: Self) {
        *self = Expr::mul_all([self.clone(), rhs.pow(-1)]);
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::mul_all([Expr::integer(-1), self])
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::mul_all([Expr::integer(-1), self.clone()])
    }
}

#[macro_export]
macro_rules! symbols {
    ($($var:ident),+ $(,)?) => {
        {
            let var_names = stringify!($($var),+);
            let vars = $crate::symbolic::symbolic_engine::Expr::Symbols(var_names);
            let mut iter = vars.into_iter();
            ($(
                {
                    let $var = iter.next().unwrap();
                    $var
                }
            ),+)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_and_dummies() {
        let vars = Expr::Symbols("x, y,z");
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[2], Expr::symbol("z"));
        let d1 = Expr::dummy("x");
        let d2 = Expr::dummy("x");
        assert_ne!(d1, d2);
        assert_ne!(d1, Expr::symbol("x"));
        assert_eq!(d1.to_string(), "_x");
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let (x, y) = crate::symbols!(x, y);
        let a = x.clone() + y.clone();
        let b = y.clone() + x.clone();
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, x.clone() * y.clone());
    }

    #[test]
    fn test_free_symbols() {
        let (x, y) = crate::symbols!(x, y);
        let e = x.clone() * y.clone() + x.pow(2);
        let free = e.free_symbols();
        assert_eq!(free.len(), 2);
        assert!(free.contains(&Symbol::new("x")));
        assert!(Expr::integer(3).free_symbols().is_empty());
    }

    #[test]
    fn test_derivative_raw_merges_and_collapses() {
        let x = Expr::symbol("x");
        let y = Expr::symbol("y");
        let e = x.pow(3) * y.clone();
        assert_eq!(Expr::derivative_raw(e.clone(), vec![(x.clone(), 0)]), e);
        let d = Expr::derivative_raw(e.clone(), vec![(x.clone(), 1), (x.clone(), 2), (y.clone(), 1)]);
        let (_, pairs) = d.as_derivative().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (x.clone(), 3));
        assert_eq!(d.variables().len(), 4);
        let nested = Expr::derivative_raw(d.clone(), vec![(y.clone(), 1)]);
        assert_eq!(nested.as_derivative().unwrap().1.last().unwrap(), &(y.clone(), 2));
    }

    #[test]
    fn test_xreplace() {
        let (x, y, z) = crate::symbols!(x, y, z);
        let e = x.clone() * y.clone() + x.clone();
        let replaced = e.xreplace_pairs(&[x.clone()], &[z.clone()]);
        assert_eq!(replaced, z.clone() * y.clone() + z.clone());
        let numeric = e.xreplace_pairs(&[x.clone(), y.clone()], &[Expr::integer(2), Expr::integer(3)]);
        assert_eq!(numeric, Expr::integer(8));
    }

    #[test]
    fn test_display() {
        let (x, y) = crate::symbols!(x, y);
        assert_eq!((x.clone() - y.clone()).to_string(), "x - y");
        assert_eq!((-x.clone()).to_string(), "-x");
        assert_eq!(x.pow(2).to_string(), "x^2");
        assert_eq!((x.clone() + y.clone()).pow(2).to_string(), "(x + y)^2");
        assert_eq!(x.pow(Expr::rational(1, 2)).to_string(), "x^(1/2)");
        assert_eq!((x.clone() * 3).to_string(), "3*x");
        assert_eq!(Expr::identity().to_string(), "IdentityFunction");
    }

    #[test]
    fn test_deep_tree_drop() {
        let x = Expr::symbol("x");
        let mut e = x.clone();
        for _ in 0..200_000 {
            e = Expr::new_node(ExprKind::Pow(e, x.clone()));
        }
        drop(e);
    }

    #[test]
    fn test_has_and_diff_wrt() {
        let (x, y) = crate::symbols!(x, y);
        let e = x.clone() * y.clone();
        assert!(e.has(&x));
        assert!(!e.has(&Expr::symbol("z")));
        assert!(x.diff_wrt());
        assert!(!e.diff_wrt());
        assert!(!Expr::integer(2).diff_wrt());
    }
}

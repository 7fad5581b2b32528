//! # Expansion and rewrite dispatch
//!
//! ## Purpose
//!
//! Expansion is driven by hints (`mul`, `multinomial`, `power_exp`, ...). For every node the
//! dispatcher looks up a rule registered for the pair `(node kind, hint)`; without a rule the node
//! is only rebuilt from its rewritten children. Rules are closures kept in a `RewriteRegistry`
//! owned by the context, so new node kinds and new hints are added by registering functions.
//!
//! ## Main Structures and Methods
//!
//! - `RewriteHint` - the hints, parsed from and printed as snake_case names
//! - `NodeKind` - what a rule is registered for; applied functions are told apart by name
//! - `RewriteRegistry` - `(NodeKind, RewriteHint) -> RewriteFn`
//! - `Context::rewrite`, `Context::expand` and the `expand_*` shortcuts
//!
//! ## Interesting Code Features
//!
//! With `deep` the children are rewritten first and the rule sees the rewritten node. A rule
//! answers `None` when it does not apply.
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_functions::{cos, is_builtin, log, sin};
use crate::symbolic::symbolic_numbers::Number;
use itertools::Itertools;
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

/// largest |n| for which `(a + b)^n` and `sin(n*x)` are expanded
pub const MAX_EXPANSION_EXPONENT: i64 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RewriteHint {
    Basic,
    PowerExp,
    PowerBase,
    Mul,
    Multinomial,
    Log,
    Complex,
    Trig,
    Func,
}

/// hints applied by `Context::expand_default`, in this order
pub const DEFAULT_HINTS: [RewriteHint; 6] = [
    RewriteHint::PowerExp,
    RewriteHint::PowerBase,
    RewriteHint::Multinomial,
    RewriteHint::Mul,
    RewriteHint::Log,
    RewriteHint::Basic,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Symbol,
    Number,
    Add,
    Mul,
    Pow,
    Function(String),
    Derivative,
    Subs,
    Lambda,
    IdentityFunction,
}

impl NodeKind {
    pub fn of(expr: &Expr) -> NodeKind {
        match expr.kind() {
            ExprKind::Symbol(_) => NodeKind::Symbol,
            ExprKind::Number(_) => NodeKind::Number,
            ExprKind::Add(_) => NodeKind::Add,
            ExprKind::Mul(_) => NodeKind::Mul,
            ExprKind::Pow(..) => NodeKind::Pow,
            ExprKind::Apply(function, _) => NodeKind::Function(function.name().to_string()),
            ExprKind::Derivative(..) => NodeKind::Derivative,
            ExprKind::Subs { .. } => NodeKind::Subs,
            ExprKind::Lambda { .. } => NodeKind::Lambda,
            ExprKind::IdentityFunction => NodeKind::IdentityFunction,
        }
    }
}

/// A rewrite rule: `(context, node, deep) -> Some(rewritten)` or `None` when it does not apply.
pub type RewriteFn =
    Arc<dyn Fn(&Context, &Expr, bool) -> Result<Option<Expr>, SymbolicError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct RewriteRegistry {
    rules: FxHashMap<(NodeKind, RewriteHint), RewriteFn>,
}

impl RewriteRegistry {
    /// empty registry, every hint only rebuilds
    pub fn new() -> Self {
        RewriteRegistry::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = RewriteRegistry::new();
        registry.register(NodeKind::Mul, RewriteHint::Mul, Arc::new(expand_mul_rule));
        registry.register(NodeKind::Pow, RewriteHint::Multinomial, Arc::new(multinomial_rule));
        registry.register(NodeKind::Pow, RewriteHint::PowerExp, Arc::new(power_exp_rule));
        registry.register(NodeKind::Pow, RewriteHint::PowerBase, Arc::new(power_base_rule));
        registry.register(
            NodeKind::Function("exp".to_string()),
            RewriteHint::PowerExp,
            Arc::new(exp_of_sum_rule),
        );
        for name in ["sin", "cos"] {
            registry.register(
                NodeKind::Function(name.to_string()),
                RewriteHint::Trig,
                Arc::new(trig_rule),
            );
        }
        registry.register(
            NodeKind::Function("log".to_string()),
            RewriteHint::Log,
            Arc::new(log_rule),
        );
        registry
    }

    /// Registers `rule` for `(kind, hint)`, replacing a previous rule for the same pair.
    pub fn register(&mut self, kind: NodeKind, hint: RewriteHint, rule: RewriteFn) {
        self.rules.insert((kind, hint), rule);
    }

    pub fn get(&self, kind: &NodeKind, hint: RewriteHint) -> Option<&RewriteFn> {
        self.rules.get(&(kind.clone(), hint))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// BASIC FEATURES

fn add_terms(e: &Expr) -> Vec<Expr> {
    if e.is_add() { e.operands() } else { vec![e.clone()] }
}

/// product of two expressions with the sums multiplied out
fn distribute_pair(a: &Expr, b: &Expr) -> Expr {
    let (ta, tb) = (add_terms(a), add_terms(b));
    Expr::add_all(
        ta.iter()
            .cartesian_product(tb.iter())
            .map(|(x, y)| x * y),
    )
}

/// Multiplies out products of sums at the top level of `e` and in each of its terms.
fn distribute(e: &Expr) -> Expr {
    let distribute_product = |term: &Expr| -> Expr {
        if !term.is_mul() || !term.operands().iter().any(Expr::is_add) {
            return term.clone();
        }
        let choices: Vec<Vec<Expr>> = term.operands().iter().map(add_terms).collect();
        Expr::add_all(
            choices
                .into_iter()
                .multi_cartesian_product()
                .map(Expr::mul_all),
        )
    };
    if e.is_add() {
        Expr::add_all(e.operands().iter().map(distribute_product))
    } else {
        distribute_product(e)
    }
}

fn small_integer(e: &Expr) -> Option<i64> {
    e.as_number()
        .and_then(Number::to_i64)
        .filter(|n| n.abs() <= MAX_EXPANSION_EXPONENT)
}

fn expand_mul_rule(_ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let expanded = distribute(node);
    Ok((!expanded.ptr_eq(node)).then_some(expanded))
}

/// `(a + b)^n` multiplied out for integer `2 <= |n|`, negative powers keep the expanded
/// denominator.
fn multinomial_rule(_ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let ExprKind::Pow(base, exp) = node.kind() else {
        return Ok(None);
    };
    let Some(n) = small_integer(exp) else {
        return Ok(None);
    };
    if !base.is_add() || n.abs() < 2 {
        return Ok(None);
    }
    let mut acc = Expr::one();
    for _ in 0..n.abs() {
        acc = distribute_pair(&acc, base);
    }
    Ok(Some(if n < 0 { acc.pow(-1) } else { acc }))
}

/// `b^(e1 + e2)` to `b^e1*b^e2`
fn power_exp_rule(_ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let ExprKind::Pow(base, exp) = node.kind() else {
        return Ok(None);
    };
    if !exp.is_add() {
        return Ok(None);
    }
    Ok(Some(Expr::mul_unmerged(
        exp.operands().into_iter().map(|term| base.pow(term)),
    )))
}

/// `exp(a + b)` to `exp(a)*exp(b)`
fn exp_of_sum_rule(ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let Some((function, [arg])) = node.as_application() else {
        return Ok(None);
    };
    if !is_builtin(function, "exp") || !arg.is_add() {
        return Ok(None);
    }
    let factors = arg
        .operands()
        .into_iter()
        .map(|term| ctx.call(function, &[term]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Expr::mul_unmerged(factors)))
}

/// `(a*b)^n` to `a^n*b^n` for integer `n`
fn power_base_rule(_ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let ExprKind::Pow(base, exp) = node.kind() else {
        return Ok(None);
    };
    let is_integer = exp.as_number().is_some_and(Number::is_integer);
    if !base.is_mul() || !is_integer {
        return Ok(None);
    }
    Ok(Some(Expr::mul_all(
        base.operands().into_iter().map(|factor| factor.pow(exp.clone())),
    )))
}

/// expanded `(sin(arg), cos(arg))`
fn sin_cos(ctx: &Context, arg: &Expr) -> Result<(Expr, Expr), SymbolicError> {
    let _guard = ctx.enter()?;
    if arg.is_add() {
        let terms = arg.operands();
        let (first, rest) = (terms[0].clone(), Expr::add_all(terms[1..].to_vec()));
        let (sa, ca) = sin_cos(ctx, &first)?;
        let (sb, cb) = sin_cos(ctx, &rest)?;
        return Ok((&sa * &cb + &ca * &sb, &ca * &cb - &sa * &sb));
    }
    let (coeff, rest) = arg.as_coeff_mul();
    if let Some(n) = coeff.to_i64().filter(|n| (2..=MAX_EXPANSION_EXPONENT).contains(n)) {
        let (s1, c1) = sin_cos(ctx, &rest)?;
        let (sn, cn) = sin_cos(ctx, &(&rest * (n - 1)))?;
        return Ok((&sn * &c1 + &cn * &s1, &cn * &c1 - &sn * &s1));
    }
    Ok((
        ctx.call(&sin(), &[arg.clone()])?,
        ctx.call(&cos(), &[arg.clone()])?,
    ))
}

/// built-in `sin`/`cos` of sums and of integer multiples
fn trig_rule(ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let Some((function, [arg])) = node.as_application() else {
        return Ok(None);
    };
    let is_sin = is_builtin(function, "sin");
    if !is_sin && !is_builtin(function, "cos") {
        return Ok(None);
    }
    let (coeff, _) = arg.as_coeff_mul();
    let splits = arg.is_add() || coeff.to_i64().is_some_and(|n| n >= 2);
    if !splits {
        return Ok(None);
    }
    let (s, c) = sin_cos(ctx, arg)?;
    let expanded = if is_sin { s } else { c };
    Ok(Some(distribute(&expanded)))
}

/// formal `log` of a product or a power
fn expand_log_of(ctx: &Context, arg: &Expr) -> Result<Expr, SymbolicError> {
    let _guard = ctx.enter()?;
    match arg.kind() {
        ExprKind::Mul(factors) if !factors.iter().any(|f| f.as_number().is_some_and(Number::is_negative)) => {
            let logs = factors
                .iter()
                .map(|f| expand_log_of(ctx, f))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::add_all(logs))
        }
        ExprKind::Pow(base, exp) => Ok(exp * expand_log_of(ctx, base)?),
        _ => ctx.call(&log(), &[arg.clone()]),
    }
}

fn log_rule(ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
    let Some((function, [arg])) = node.as_application() else {
        return Ok(None);
    };
    if !is_builtin(function, "log") {
        return Ok(None);
    }
    if !arg.is_mul() && !matches!(arg.kind(), ExprKind::Pow(..)) {
        return Ok(None);
    }
    expand_log_of(ctx, arg).map(Some)
}

/// DISPATCH

impl Context {
    /// Rewrites `expr` under `hint`. With `deep` the children are rewritten first; the
    /// differentiation entities of a derivative are never rewritten.
    pub fn rewrite(&self, expr: &Expr, hint: RewriteHint, deep: bool) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        let node = if deep {
            self.rewrite_children(expr, hint)?
        } else {
            expr.clone()
        };
        match self.rewrites().get(&NodeKind::of(&node), hint) {
            Some(rule) => {
                let rewritten = rule(self, &node, deep)?;
                if let Some(r) = &rewritten {
                    debug!("{} rewrite: {} -> {}", hint, node, r);
                }
                Ok(rewritten.unwrap_or(node))
            }
            None => Ok(node),
        }
    }

    fn rewrite_children(&self, expr: &Expr, hint: RewriteHint) -> Result<Expr, SymbolicError> {
        if let ExprKind::Derivative(inner, pairs) = expr.kind() {
            let rewritten = self.rewrite(inner, hint, true)?;
            if rewritten.ptr_eq(inner) {
                return Ok(expr.clone());
            }
            return Ok(Expr::derivative_raw(rewritten, pairs.clone()));
        }
        let operands = expr.operands();
        if operands.is_empty() {
            return Ok(expr.clone());
        }
        let rewritten = operands
            .iter()
            .map(|o| self.rewrite(o, hint, true))
            .collect::<Result<Vec<_>, _>>()?;
        if rewritten.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(expr.clone());
        }
        self.rebuild(expr, rewritten)
    }

    /// Applies the hints one after another.
    pub fn expand(
        &self,
        expr: &Expr,
        hints: &[RewriteHint],
        deep: bool,
    ) -> Result<Expr, SymbolicError> {
        hints
            .iter()
            .try_fold(expr.clone(), |acc, hint| self.rewrite(&acc, *hint, deep))
    }

    /// deep expansion with `DEFAULT_HINTS`
    pub fn expand_default(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.expand(expr, &DEFAULT_HINTS, true)
    }

    pub fn expand_mul(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Mul, true)
    }

    pub fn expand_multinomial(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Multinomial, true)
    }

    pub fn expand_log(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Log, true)
    }

    pub fn expand_func(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Func, true)
    }

    pub fn expand_trig(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Trig, true)
    }

    pub fn expand_complex(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::Complex, true)
    }

    pub fn expand_power_base(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::PowerBase, true)
    }

    pub fn expand_power_exp(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.rewrite(expr, RewriteHint::PowerExp, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_functions::{Function, exp};
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_hint_names() {
        assert_eq!(RewriteHint::PowerExp.to_string(), "power_exp");
        assert_eq!(RewriteHint::from_str("multinomial"), Ok(RewriteHint::Multinomial));
        assert!(RewriteHint::from_str("frobnicate").is_err());
        assert_eq!(RewriteHint::iter().count(), 9);
    }

    #[test]
    fn test_expand_mul() {
        let ctx = Context::new();
        let (x, y, z) = crate::symbols!(x, y, z);
        let e = x.clone() * (y.clone() + z.clone());
        assert_eq!(ctx.expand_mul(&e).unwrap(), x.clone() * y.clone() + x.clone() * z.clone());
        let e2 = (x.clone() + 1) * (x.clone() - 1);
        assert_eq!(ctx.expand_mul(&e2).unwrap(), x.pow(2) - 1);
        assert!(ctx.expand_mul(&x).unwrap().ptr_eq(&x));
    }

    #[test]
    fn test_expand_multinomial() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let e = (x.clone() + y.clone()).pow(2);
        let expected = x.pow(2) + x.clone() * y.clone() * 2 + y.pow(2);
        assert_eq!(ctx.expand_multinomial(&e).unwrap(), expected.clone());
        let inverse = (x.clone() + y.clone()).pow(-2);
        assert_eq!(ctx.expand_multinomial(&inverse).unwrap(), expected.pow(-1));
        let symbolic = (x.clone() + y.clone()).pow(y.clone());
        assert_eq!(ctx.expand_multinomial(&symbolic).unwrap(), symbolic);
    }

    #[test]
    fn test_expand_default_hints() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let e = x.clone() * (x.clone() + y.clone()).pow(2);
        let expected = x.pow(3) + x.pow(2) * y.clone() * 2 + x.clone() * y.pow(2);
        assert_eq!(ctx.expand_default(&e).unwrap(), expected);
        let only_mul = ctx.expand(&e, &[RewriteHint::Mul], true).unwrap();
        assert_eq!(only_mul, e);
    }

    #[test]
    fn test_power_rules() {
        let ctx = Context::new();
        let (x, a, b) = crate::symbols!(x, a, b);
        let e = x.pow(a.clone() + b.clone());
        let split = ctx.expand_power_exp(&e).unwrap();
        assert_eq!(split.to_string(), "x^a*x^b");
        let e2 = (x.clone() * a.clone()).pow(3);
        assert_eq!(ctx.expand_power_base(&e2).unwrap(), x.pow(3) * a.pow(3));
        let exp_sum = ctx.call(&exp(), &[x.clone() + a.clone()]).unwrap();
        let exp_x = ctx.call(&exp(), &[x.clone()]).unwrap();
        let exp_a = ctx.call(&exp(), &[a.clone()]).unwrap();
        assert_eq!(ctx.expand_power_exp(&exp_sum).unwrap(), exp_a * exp_x);
    }

    #[test]
    fn test_expand_trig() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let sin = |e: Expr| ctx.call(&sin(), &[e]).unwrap();
        let cos = |e: Expr| ctx.call(&cos(), &[e]).unwrap();
        let e = sin(x.clone() + y.clone());
        let expected = sin(x.clone()) * cos(y.clone()) + cos(x.clone()) * sin(y.clone());
        assert_eq!(ctx.expand_trig(&e).unwrap(), expected);
        let double = cos(x.clone() * 2);
        assert_eq!(
            ctx.expand_trig(&double).unwrap(),
            cos(x.clone()).pow(2) - sin(x.clone()).pow(2)
        );
        let triple = sin(x.clone() * 3);
        assert_eq!(
            ctx.expand_trig(&triple).unwrap(),
            sin(x.clone()) * cos(x.clone()).pow(2) * 3 - sin(x.clone()).pow(3)
        );
    }

    #[test]
    fn test_expand_log() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let ln = |e: Expr| ctx.call(&log(), &[e]).unwrap();
        let e = ln(x.pow(2) * y.clone());
        assert_eq!(ctx.expand_log(&e).unwrap(), ln(x.clone()) * 2 + ln(y.clone()));
        let negative = ln(-x.clone());
        assert_eq!(ctx.expand_log(&negative).unwrap(), negative);
    }

    #[test]
    fn test_user_functions_named_like_builtins_are_kept() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let user_log = Function::undefined("log");
        let e = ctx.call(&user_log, &[x.clone() * y.clone()]).unwrap();
        assert_eq!(ctx.expand_log(&e).unwrap(), e);
        let user_sin = Function::undefined("sin");
        let s = ctx.call(&user_sin, &[x.clone() + y.clone()]).unwrap();
        assert_eq!(ctx.expand_trig(&s).unwrap(), s);
        let user_exp = Function::undefined("exp");
        let p = ctx.call(&user_exp, &[x.clone() + y.clone()]).unwrap();
        assert_eq!(ctx.expand_power_exp(&p).unwrap(), p);
    }

    #[test]
    fn test_deep_rewrite_and_derivative_entities() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let f = Function::undefined("f");
        let arg = x.clone() * (x.clone() + y.clone());
        let fx = ctx.call(&f, &[arg]).unwrap();
        let expanded = ctx.expand_mul(&fx).unwrap();
        let expected_arg = x.pow(2) + x.clone() * y.clone();
        assert_eq!(expanded, ctx.call(&f, &[expected_arg]).unwrap());
        let shallow = ctx.rewrite(&fx, RewriteHint::Mul, false).unwrap();
        assert_eq!(shallow, fx);

        let gx = ctx.call(&f, &[x.clone()]).unwrap();
        let d = Expr::derivative_raw(gx.clone() * (gx.clone() + 1), vec![(gx.clone(), 1)]);
        let rewritten = ctx.expand_mul(&d).unwrap();
        let (inner, pairs) = rewritten.as_derivative().unwrap();
        assert_eq!(inner, &(gx.pow(2) + gx.clone()));
        assert_eq!(pairs[0].0, gx);
    }

    fn square_argument(_ctx: &Context, node: &Expr, _deep: bool) -> Result<Option<Expr>, SymbolicError> {
        Ok(node.args().first().map(|a| a.pow(2)))
    }

    #[test]
    fn test_registered_rule_overrides() {
        let mut ctx = Context::new();
        let x = Expr::symbol("x");
        let g = Function::undefined("g");
        ctx.rewrites_mut().register(
            NodeKind::Function("g".to_string()),
            RewriteHint::Func,
            Arc::new(square_argument),
        );
        let gx = ctx.call(&g, &[x.clone()]).unwrap();
        assert_eq!(ctx.expand_func(&(gx + 1)).unwrap(), x.pow(2) + 1);
        // no rule: only rebuilt
        assert_eq!(ctx.expand_complex(&x).unwrap(), x);
    }
}

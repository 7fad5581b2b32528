//! # Symbolic Engine Derivatives Module
//!
//! Differentiation of expressions with respect to symbols and to non-symbol entities (applied
//! functions and derivatives of applied functions).
//!
//! ## Purpose
//!
//! `Context::differentiate(expr, specs, evaluate)` either evaluates a derivative step by step or
//! builds an unevaluated `Derivative` node. Every node kind answers a single step through
//! `eval_derivative(expr, s)`, which returns `None` when the step cannot be computed; such steps
//! are kept unevaluated.
//!
//! ## Key Methods
//!
//! - `differentiate(expr, specs, evaluate)` - the general entry point
//! - `diff(expr, specs)` - evaluating wrapper, `diff_var` and `diff_n` for one variable
//! - `doit_numerically(derivative, z0)` - central difference check of a first derivative
//!
//! ## Interesting Code Features
//!
//! 1. **Variable specs**: `[x, 2, y]` means `d^3/dx^2dy`, an entity is followed by an optional order.
//! 2. **Synthetic symbols**: a step with respect to `f(x)` renames `f(x)` to a fresh symbol,
//!    differentiates and renames back.
//! 3. **Deferral**: once a step with respect to a non-symbol fails, every later step is deferred
//!    too, because symbol and non-symbol steps do not commute.
//! 4. **Canonical order**: deferred steps are sorted by runs (see `sort_variable_counts`) so equal
//!    derivatives built in different orders compare equal.
use crate::symbolic::symbolic_cache::CacheKey;
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_numbers::Number;
use crate::symbolic::symbolic_ordering::sort_variable_counts;
use crate::symbolic::utils::numerical_derivative;
use log::{debug, info};

/// One item of a differentiation request: an entity, or the order of the entity before it.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableSpec {
    Entity(Expr),
    Order(u32),
}

impl From<Expr> for VariableSpec {
    fn from(e: Expr) -> Self {
        VariableSpec::Entity(e)
    }
}

impl From<&Expr> for VariableSpec {
    fn from(e: &Expr) -> Self {
        VariableSpec::Entity(e.clone())
    }
}

impl From<u32> for VariableSpec {
    fn from(n: u32) -> Self {
        VariableSpec::Order(n)
    }
}

/// Turns specs into `(entity, order)` pairs. Without any spec the only free symbol of `expr` is
/// used.
fn parse_specs(expr: &Expr, specs: &[VariableSpec]) -> Result<Vec<(Expr, u32)>, SymbolicError> {
    if specs.is_empty() {
        let free = expr.sorted_free_symbols();
        if free.len() != 1 {
            return Err(SymbolicError::Ambiguous {
                expr: expr.to_string(),
            });
        }
        return Ok(vec![(Expr::from_symbol(free[0].clone()), 1)]);
    }
    let mut pairs = Vec::with_capacity(specs.len());
    let mut i = 0;
    while i < specs.len() {
        match &specs[i] {
            VariableSpec::Entity(v) if v.diff_wrt() => match specs.get(i + 1) {
                Some(VariableSpec::Order(n)) => {
                    pairs.push((v.clone(), *n));
                    i += 2;
                }
                _ => {
                    pairs.push((v.clone(), 1));
                    i += 1;
                }
            },
            VariableSpec::Entity(v) => {
                return Err(SymbolicError::NotDifferentiable {
                    entity: v.to_string(),
                });
            }
            VariableSpec::Order(n) => {
                return Err(SymbolicError::NotDifferentiable {
                    entity: n.to_string(),
                });
            }
        }
    }
    Ok(pairs)
}

impl Context {
    /// Derivative of `expr` by the given specs.
    ///
    /// Without `evaluate` the result is an unevaluated `Derivative` in the order given by the
    /// caller. With `evaluate` every step is attempted; steps that cannot be computed stay in
    /// the resulting `Derivative`, sorted canonically.
    ///
    /// # Errors
    /// `Ambiguous` when no variable is given and `expr` does not have exactly one free symbol,
    /// `NotDifferentiable` for an entity that is not a symbol, applied function or derivative of
    /// an applied function.
    pub fn differentiate(
        &self,
        expr: &Expr,
        specs: &[VariableSpec],
        evaluate: bool,
    ) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        let pairs = parse_specs(expr, specs)?;
        if pairs.iter().all(|(_, n)| *n == 0) {
            return Ok(expr.clone());
        }
        if !evaluate {
            return Ok(Expr::derivative_raw(expr.clone(), pairs));
        }
        // symbol entities can be proven absent, other entities may appear after a step
        let free = expr.free_symbols();
        let absent = pairs
            .iter()
            .any(|(v, _)| v.as_symbol().is_some_and(|s| !free.contains(s)));
        if absent {
            return Ok(Expr::zero());
        }
        let key = CacheKey::Derivative {
            expr: expr.clone(),
            variables: pairs.clone(),
        };
        self.cache()
            .construct(key, || self.evaluate_steps(expr, &pairs))
    }

    /// `differentiate` with evaluation
    pub fn diff(&self, expr: &Expr, specs: &[VariableSpec]) -> Result<Expr, SymbolicError> {
        self.differentiate(expr, specs, true)
    }

    /// first derivative with respect to one entity
    pub fn diff_var(&self, expr: &Expr, var: &Expr) -> Result<Expr, SymbolicError> {
        self.differentiate(expr, &[var.into()], true)
    }

    /// `n`-th derivative with respect to one entity
    pub fn diff_n(&self, expr: &Expr, var: &Expr, n: u32) -> Result<Expr, SymbolicError> {
        self.differentiate(expr, &[var.into(), n.into()], true)
    }

    /// Single step with respect to `v`; non-symbol entities go through a synthetic symbol.
    fn step(&self, current: &Expr, v: &Expr) -> Result<Option<Expr>, SymbolicError> {
        if v.is_symbol() {
            return self.eval_derivative(current, v);
        }
        let synthetic = Expr::dummy("diff_wrt");
        let renamed = self.subs(current, v, &synthetic)?;
        match self.eval_derivative(&renamed, &synthetic)? {
            Some(d) => Ok(Some(self.subs(&d, &synthetic, v)?)),
            None => Ok(None),
        }
    }

    /// Takes the steps pair by pair and count by count, stopping at the first zero. A deferred
    /// step defers the rest of its count, a deferred non-symbol step everything after it.
    fn evaluate_steps(&self, expr: &Expr, pairs: &[(Expr, u32)]) -> Result<Expr, SymbolicError> {
        let mut current = expr.clone();
        let mut unhandled: Vec<(Expr, u32)> = Vec::new();
        let mut unhandled_non_symbol = false;
        for (v, n) in pairs {
            if unhandled_non_symbol {
                unhandled.push((v.clone(), *n));
                continue;
            }
            for done in 0..*n {
                match self.step(&current, v)? {
                    None => {
                        debug!("derivative of {} by {} deferred", current, v);
                        if !v.is_symbol() {
                            unhandled_non_symbol = true;
                        }
                        unhandled.push((v.clone(), n - done));
                        break;
                    }
                    Some(d) if d.is_zero() => return Ok(Expr::zero()),
                    // a formal step: every further step by `v` only appends, take them at once
                    Some(d) if d == Expr::derivative_raw(current.clone(), vec![(v.clone(), 1)]) => {
                        current = Expr::derivative_raw(current, vec![(v.clone(), n - done)]);
                        break;
                    }
                    Some(d) => current = d,
                }
            }
        }
        if !unhandled.is_empty() {
            return Ok(Expr::derivative_raw(current, sort_variable_counts(&unhandled)));
        }
        if let Some((inner, done)) = current.as_derivative() {
            return Ok(Expr::derivative_raw(inner.clone(), sort_variable_counts(done)));
        }
        Ok(current)
    }

    /// One differentiation step with respect to the symbol `s`. `None` means the node cannot
    /// compute it.
    pub(crate) fn eval_derivative(&self, expr: &Expr, s: &Expr) -> Result<Option<Expr>, SymbolicError> {
        let _guard = self.enter()?;
        let d = match expr.kind() {
            ExprKind::Symbol(_) => {
                if expr == s {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            ExprKind::Number(_) => Expr::zero(),
            ExprKind::Add(terms) => {
                let derivatives = terms
                    .iter()
                    .map(|t| self.diff_var(t, s))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::add_all(derivatives)
            }
            // product rule
            ExprKind::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    let d = self.diff_var(factor, s)?;
                    if d.is_zero() {
                        continue;
                    }
                    let mut product = factors.clone();
                    product[i] = d;
                    terms.push(Expr::mul_all(product));
                }
                Expr::add_all(terms)
            }
            ExprKind::Pow(base, exp) => return self.power_derivative(expr, base, exp, s).map(Some),
            ExprKind::Apply(..) => return self.apply_derivative(expr, s),
            ExprKind::Derivative(..) => return self.derivative_of_derivative(expr, s),
            ExprKind::Subs { .. } => return self.subs_derivative(expr, s).map(Some),
            ExprKind::Lambda { .. } | ExprKind::IdentityFunction => return Ok(None),
        };
        Ok(Some(d))
    }

    /// `(b^e)' = b^e * (e' * log(b) + b' * e / b)`, the logarithmic term only when `e` depends on `s`
    fn power_derivative(&self, expr: &Expr, base: &Expr, exp: &Expr, s: &Expr) -> Result<Expr, SymbolicError> {
        let dbase = self.diff_var(base, s)?;
        let dexp = self.diff_var(exp, s)?;
        let mut terms = Vec::with_capacity(2);
        if !dexp.is_zero() {
            let log_base = self.call(&crate::symbolic::symbolic_functions::log(), &[base.clone()])?;
            terms.push(dexp * log_base);
        }
        if !dbase.is_zero() {
            terms.push(dbase * exp * base.pow(-1));
        }
        Ok(expr * Expr::add_all(terms))
    }

    /// A step of a `Derivative` node. If `v` is not yet one of its variables the inner expression
    /// is differentiated first, which may turn the remaining steps computable. Otherwise the step
    /// is appended.
    fn derivative_of_derivative(&self, node: &Expr, v: &Expr) -> Result<Option<Expr>, SymbolicError> {
        let Some((inner, pairs)) = node.as_derivative() else {
            return Ok(None);
        };
        if pairs.iter().any(|(entity, _)| entity == v) {
            return Ok(Some(Expr::derivative_raw(node.clone(), vec![(v.clone(), 1)])));
        }
        let obj = self.diff_var(inner, v)?;
        if obj.is_zero() {
            return Ok(Some(Expr::zero()));
        }
        if let Some((obj_inner, obj_pairs)) = obj.as_derivative() {
            let merged = pairs.iter().chain(obj_pairs).cloned().collect();
            return Ok(Some(Expr::derivative_raw(obj_inner.clone(), merged)));
        }
        let specs: Vec<VariableSpec> = pairs
            .iter()
            .flat_map(|(entity, n)| [VariableSpec::Entity(entity.clone()), VariableSpec::Order(*n)])
            .collect();
        Ok(Some(self.differentiate(&obj, &specs, true)?))
    }

    /// Numeric value of a first derivative of a one-variable expression at `z0`, by central
    /// difference.
    ///
    /// # Errors
    /// `Unsupported` for partial or higher order derivatives and when the expression does not
    /// evaluate to a number near `z0`.
    pub fn doit_numerically(&self, derivative: &Expr, z0: f64) -> Result<Expr, SymbolicError> {
        let Some((inner, pairs)) = derivative.as_derivative() else {
            return Err(SymbolicError::Unsupported(format!(
                "{} is not a derivative",
                derivative
            )));
        };
        let free = derivative.sorted_free_symbols();
        if free.len() != 1 || pairs.len() != 1 || pairs[0].1 != 1 {
            return Err(SymbolicError::Unsupported(
                "partials and higher order derivatives".to_string(),
            ));
        }
        let z = Expr::from_symbol(free[0].clone());
        let prec = self.config().default_precision;
        let f = |t: f64| -> f64 {
            self.subs(inner, &z, &Expr::float_with_prec(t, prec))
                .ok()
                .and_then(|value| self.numeric().evaluate(&value, prec))
                .and_then(|value| value.as_number().map(Number::to_f64))
                .unwrap_or(f64::NAN)
        };
        let h = 1e-6 * z0.abs().max(1.0);
        let value = numerical_derivative(f, vec![z0], h)[0];
        if !value.is_finite() {
            return Err(SymbolicError::Unsupported(format!(
                "{} cannot be evaluated numerically near {}",
                inner, z0
            )));
        }
        info!("{} at {} = {}", derivative, z0, value);
        Ok(Expr::float_with_prec(value, prec))
    }
}

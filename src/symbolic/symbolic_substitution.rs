//! Evaluating substitution and `doit`.
//!
//! `Context::subs` replaces a subexpression everywhere and rebuilds the tree through the context,
//! so applied functions are canonicalized again (`sin(x).subs(x, 0)` is `0`). Node kinds adjust
//! the rule where plain replacement would be wrong: replacing a differentiation variable of a
//! `Derivative` by a value that is not a differentiation entity yields a `Subs` instead of a
//! meaningless `Derivative(f(2), 2)`, and bound placeholders of `Subs`/`Lambda` are never touched.
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_engine_derivatives::VariableSpec;
use crate::symbolic::symbolic_errors::SymbolicError;
use log::trace;
use rustc_hash::FxHashMap;

impl Context {
    /// Replaces `old` by `new` everywhere in `expr`.
    pub fn subs(&self, expr: &Expr, old: &Expr, new: &Expr) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        if expr == old {
            return Ok(new.clone());
        }
        let binds_old = expr
            .as_derivative()
            .is_some_and(|(_, pairs)| pairs.iter().any(|(v, _)| v == old));
        if binds_old && !new.diff_wrt() {
            trace!("{} at {} = {} deferred", expr, old, new);
            return self.build_subs(expr, &[old.clone()], &[new.clone()]);
        }
        let operands = expr.operands();
        if operands.is_empty() {
            return Ok(expr.clone());
        }
        let replaced = operands
            .iter()
            .map(|o| self.subs(o, old, new))
            .collect::<Result<Vec<_>, _>>()?;
        if replaced.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(expr.clone());
        }
        self.rebuild(expr, replaced)
    }

    /// `subs` for each `(old, new)` pair in turn
    pub fn subs_sequence(&self, expr: &Expr, pairs: &[(Expr, Expr)]) -> Result<Expr, SymbolicError> {
        pairs
            .iter()
            .try_fold(expr.clone(), |acc, (old, new)| self.subs(&acc, old, new))
    }

    /// Rebuilds `expr` from new operands. Applied functions are applied again with evaluation,
    /// every other kind is rebuilt without the context.
    pub(crate) fn rebuild(&self, expr: &Expr, operands: Vec<Expr>) -> Result<Expr, SymbolicError> {
        match expr.kind() {
            ExprKind::Apply(function, _) => self.call(function, &operands),
            _ => Ok(expr.with_operands(operands)),
        }
    }

    /// Simultaneous structural replacement, like `Expr::xreplace`, but applied functions are
    /// evaluated after their arguments change.
    pub fn xreplace(&self, expr: &Expr, rules: &FxHashMap<Expr, Expr>) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        if let Some(replacement) = rules.get(expr) {
            return Ok(replacement.clone());
        }
        let operands = expr.operands();
        if operands.is_empty() {
            return Ok(expr.clone());
        }
        let replaced = operands
            .iter()
            .map(|o| self.xreplace(o, rules))
            .collect::<Result<Vec<_>, _>>()?;
        if replaced.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(expr.clone());
        }
        self.rebuild(expr, replaced)
    }

    /// Evaluates what was left unevaluated: derivatives are computed where possible and deferred
    /// substitutions are carried out, innermost first.
    pub fn doit(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        match expr.kind() {
            ExprKind::Derivative(inner, pairs) => {
                let inner = self.doit(inner)?;
                let specs: Vec<VariableSpec> = pairs
                    .iter()
                    .flat_map(|(v, n)| [VariableSpec::Entity(v.clone()), VariableSpec::Order(*n)])
                    .collect();
                self.differentiate(&inner, &specs, true)
            }
            ExprKind::Subs { .. } => self.subs_doit(expr),
            _ => {
                let operands = expr.operands();
                if operands.is_empty() {
                    return Ok(expr.clone());
                }
                let done = operands
                    .iter()
                    .map(|o| self.doit(o))
                    .collect::<Result<Vec<_>, _>>()?;
                if done.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
                    return Ok(expr.clone());
                }
                self.rebuild(expr, done)
            }
        }
    }

    /// `doit` followed by numeric evaluation at the default precision. An expression with free
    /// symbols comes back evaluated as far as `doit` gets it.
    pub fn evalf(&self, expr: &Expr) -> Result<Expr, SymbolicError> {
        self.evalf_prec(expr, self.config().default_precision)
    }

    pub fn evalf_prec(&self, expr: &Expr, prec: u32) -> Result<Expr, SymbolicError> {
        let done = self.doit(expr)?;
        Ok(self.numeric().evaluate(&done, prec).unwrap_or(done))
    }
}

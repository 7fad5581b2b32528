//! # Deferred substitution
//!
//! ## Purpose
//!
//! `Subs(expr, variables, point)` stands for `expr` with `variables` replaced by `point`, at a
//! time when the replacement can not be carried out yet. The typical source is the derivative of
//! an applied function at a non-symbol argument: `d/dx f(2*x)` is
//! `2*Subs(Derivative(f(_xi_1), _xi_1), (_xi_1,), (2*x,))`.
//!
//! ## Main Structures and Methods
//!
//! - `Context::build_subs` - validates and builds the node, the variables are renamed to fresh
//!   placeholders so they can not capture anything from the surrounding expression
//! - `Context::subs_doit` - carries out the substitution
//! - `Context::subs_derivative` - chain rule through the point
//! - `subs_equal` - structural equality modulo renaming of the placeholders
//!
//! ## Interesting Code Features
//!
//! Equality treats placeholders bound to the same point value as one placeholder: the points are
//! sorted, placeholders at unique points are renamed onto each other and placeholders at repeated
//! points are all replaced by one fresh symbol per repeated value.
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind, Symbol};
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_ordering::expr_cmp;
use itertools::Itertools;
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

/// fresh placeholder standing for a substitution variable
fn placeholder_for(variable: &Expr) -> Expr {
    match variable.as_symbol() {
        Some(s) => Expr::dummy(s.name()),
        None => Expr::dummy(&variable.to_string()),
    }
}

impl Context {
    /// Builds `Subs(expr, variables, point)`.
    ///
    /// # Errors
    /// `DuplicateVariable` when a variable is repeated, `LengthMismatch` when `point` does not
    /// have one value per variable.
    pub fn build_subs(
        &self,
        expr: &Expr,
        variables: &[Expr],
        point: &[Expr],
    ) -> Result<Expr, SymbolicError> {
        let repeated: Vec<&Expr> = variables.iter().duplicates().collect();
        if !repeated.is_empty() {
            return Err(SymbolicError::DuplicateVariable {
                repeated: repeated.iter().join(", "),
            });
        }
        if point.len() != variables.len() {
            return Err(SymbolicError::LengthMismatch {
                variables: variables.len(),
                points: point.len(),
            });
        }
        let placeholders: Vec<Expr> = variables.iter().map(placeholder_for).collect();
        let renaming: Vec<(Expr, Expr)> = variables
            .iter()
            .cloned()
            .zip(placeholders.iter().cloned())
            .collect();
        let body = self.subs_sequence(expr, &renaming)?;
        Ok(Expr::subs_raw(body, placeholders, point.to_vec()))
    }

    /// Carries out a deferred substitution; other expressions come back unchanged.
    pub(crate) fn subs_doit(&self, node: &Expr) -> Result<Expr, SymbolicError> {
        let ExprKind::Subs {
            expr,
            variables,
            point,
        } = node.kind()
        else {
            return Ok(node.clone());
        };
        let body = self.doit(expr)?;
        let pairs: Vec<(Expr, Expr)> = variables
            .iter()
            .cloned()
            .zip(point.iter().cloned())
            .collect();
        self.subs_sequence(&body, &pairs)
    }

    /// Derivative of a `Subs` node with respect to the symbol `s`:
    /// `Subs(d expr/ds, v, p) + sum_i d p_i/ds * Subs(d expr/d v_i, v, p)`, each term done.
    pub(crate) fn subs_derivative(&self, node: &Expr, s: &Expr) -> Result<Expr, SymbolicError> {
        let ExprKind::Subs {
            expr,
            variables,
            point,
        } = node.kind()
        else {
            return Err(SymbolicError::Unsupported(format!(
                "{} is not a substitution",
                node
            )));
        };
        let occurs = s
            .as_symbol()
            .is_none_or(|sym| node.free_symbols().contains(sym));
        if !occurs {
            return Ok(Expr::zero());
        }
        trace!("chain rule through {}", node);
        let at_point = |body: Expr| -> Result<Expr, SymbolicError> {
            self.subs_doit(&Expr::subs_raw(body, variables.clone(), point.clone()))
        };
        let mut terms = vec![at_point(self.diff_var(expr, s)?)?];
        for (variable, value) in variables.iter().zip(point) {
            let dvalue = self.diff_var(value, s)?;
            if dvalue.is_zero() {
                continue;
            }
            let dbody = self.diff_var(expr, variable)?;
            terms.push(at_point(dvalue * dbody)?);
        }
        Ok(Expr::add_all(terms))
    }
}

/// free symbols of `Subs(expr, variables, point)`
fn subs_free_symbols(expr: &Expr, variables: &[Expr], point: &[Expr]) -> FxHashSet<Symbol> {
    let mut free = expr.free_symbols();
    for v in variables {
        if let Some(s) = v.as_symbol() {
            free.remove(s);
        }
    }
    for p in point {
        free.extend(p.free_symbols());
    }
    free
}

/// `(variable, value)` pairs ordered by value
fn sorted_by_point<'a>(variables: &'a [Expr], point: &'a [Expr]) -> Vec<(&'a Expr, &'a Expr)> {
    variables
        .iter()
        .zip(point)
        .sorted_by(|a, b| expr_cmp(a.1, b.1))
        .collect()
}

/// Equality of two `Subs` nodes given as `(expr, variables, point)`, modulo renaming of the
/// placeholders and reordering of the substitution pairs.
pub fn subs_equal(a: (&Expr, &[Expr], &[Expr]), b: (&Expr, &[Expr], &[Expr])) -> bool {
    let (e1, v1, p1) = a;
    let (e2, v2, p2) = b;
    if p1.len() != p2.len() || v1.len() != p1.len() || v2.len() != p2.len() {
        return false;
    }
    if subs_free_symbols(e1, v1, p1) != subs_free_symbols(e2, v2, p2) {
        return false;
    }
    let pairs1 = sorted_by_point(v1, p1);
    let pairs2 = sorted_by_point(v2, p2);
    if pairs1.iter().zip(&pairs2).any(|(x, y)| x.1 != y.1) {
        return false;
    }
    let counts = p1.iter().counts();
    let repeated: FxHashMap<&Expr, Expr> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(value, _)| (*value, Expr::dummy("rep")))
        .collect();

    let mut lhs_rules: FxHashMap<Expr, Expr> = FxHashMap::default();
    let mut rhs_rules: FxHashMap<Expr, Expr> = FxHashMap::default();
    for ((var1, value), (var2, _)) in pairs1.iter().zip(&pairs2) {
        match repeated.get(value) {
            Some(shared) => {
                lhs_rules.insert((*var1).clone(), shared.clone());
                rhs_rules.insert((*var2).clone(), shared.clone());
            }
            None => {
                rhs_rules.insert((*var2).clone(), (*var1).clone());
            }
        }
    }
    e1.xreplace(&lhs_rules) == e2.xreplace(&rhs_rules)
}

//! Anonymous functions.
//!
//! `Lambda(variables, body)` binds its variables to fresh placeholders, so two lambdas that only
//! differ in the names of their parameters are equal. A one-parameter lambda returning its
//! parameter collapses to the `IdentityFunction` singleton.
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use rustc_hash::FxHashMap;

pub struct Lambda;

impl Lambda {
    pub fn new(parameters: &[Expr], body: &Expr) -> Expr {
        if let [single] = parameters {
            if single == body {
                return Expr::identity();
            }
        }
        let placeholders: Vec<Expr> = parameters
            .iter()
            .map(|p| match p.as_symbol() {
                Some(s) => Expr::dummy(s.name()),
                None => Expr::dummy(&p.to_string()),
            })
            .collect();
        let body = body.xreplace_pairs(parameters, &placeholders);
        Expr::lambda_raw(placeholders, body)
    }
}

impl Expr {
    /// true for the identity singleton and for any unary lambda returning its parameter
    pub fn is_identity(&self) -> bool {
        match self.kind() {
            ExprKind::IdentityFunction => true,
            ExprKind::Lambda { variables, body } => variables.len() == 1 && variables[0] == *body,
            _ => false,
        }
    }
}

impl Context {
    /// Calls a `Lambda` or the identity function with `args`.
    pub fn invoke(&self, callable: &Expr, args: &[Expr]) -> Result<Expr, SymbolicError> {
        let expected = callable.nargs().ok_or_else(|| SymbolicError::NotCallable {
            expr: callable.to_string(),
        })?;
        if args.len() != expected {
            return Err(SymbolicError::ArityMismatch {
                name: callable.to_string(),
                expected: expected.to_string(),
                given: args.len(),
            });
        }
        match callable.kind() {
            ExprKind::Lambda { variables, body } => {
                let rules: FxHashMap<Expr, Expr> =
                    variables.iter().cloned().zip(args.iter().cloned()).collect();
                self.xreplace(body, &rules)
            }
            _ => Ok(args[0].clone()),
        }
    }
}

/// Lambda equality modulo renaming of the parameters.
pub fn lambda_equal(a: (&[Expr], &Expr), b: (&[Expr], &Expr)) -> bool {
    let (v1, b1) = a;
    let (v2, b2) = b;
    v1.len() == v2.len() && *b1 == b2.xreplace_pairs(v2, v1)
}

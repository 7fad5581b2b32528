// SYMBOLIC TRAITS //////////////////////////////////////////////////////////////////
// Interfaces the core consumes from the outside world:
// coercion of foreign literals into expressions and numeric evaluation at a given precision.
// add other backends here as needed

use crate::symbolic::symbolic_engine::{Expr, ExprKind, Symbol};
use crate::symbolic::symbolic_numbers::Number;
use num::{BigInt, BigRational};

/// Total coercion of a value into an expression.
pub trait Sympify {
    fn sympify(self) -> Expr;
}

impl<T: Into<Expr>> Sympify for T {
    fn sympify(self) -> Expr {
        self.into()
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::integer(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::integer(n as i64)
    }
}

impl From<u32> for Expr {
    fn from(n: u32) -> Self {
        Expr::integer(n as i64)
    }
}

impl From<f64> for Expr {
    fn from(x: f64) -> Self {
        Expr::float(x)
    }
}

impl From<BigRational> for Expr {
    fn from(r: BigRational) -> Self {
        Expr::big_rational(r)
    }
}

impl From<BigInt> for Expr {
    fn from(n: BigInt) -> Self {
        Expr::number(Number::from(n))
    }
}

impl From<Number> for Expr {
    fn from(n: Number) -> Self {
        Expr::number(n)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Expr::from_symbol(s)
    }
}

/// a string literal is read as a symbol name
impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::symbol(name)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

///////////////// NUMERIC BACKEND /////////////////////////

/// Numeric evaluation used when an applied function receives float arguments.
/// `None` means the expression cannot be evaluated to a number.
pub trait NumericBackend: Send + Sync {
    fn evaluate(&self, expr: &Expr, precision: u32) -> Option<Expr>;
}

/// Evaluates in `f64` and tags the result with the requested precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct F64Backend;

impl F64Backend {
    pub fn eval_f64(expr: &Expr) -> Option<f64> {
        let value = match expr.kind() {
            ExprKind::Number(n) => n.to_f64(),
            ExprKind::Add(terms) => terms
                .iter()
                .map(F64Backend::eval_f64)
                .sum::<Option<f64>>()?,
            ExprKind::Mul(factors) => factors
                .iter()
                .map(F64Backend::eval_f64)
                .product::<Option<f64>>()?,
            ExprKind::Pow(base, exp) => F64Backend::eval_f64(base)?.powf(F64Backend::eval_f64(exp)?),
            ExprKind::Apply(function, args) => {
                let values = args
                    .iter()
                    .map(F64Backend::eval_f64)
                    .collect::<Option<Vec<f64>>>()?;
                function.behaviour()?.evalf(&values)?
            }
            _ => return None,
        };
        if value.is_finite() { Some(value) } else { None }
    }
}

impl NumericBackend for F64Backend {
    fn evaluate(&self, expr: &Expr, precision: u32) -> Option<Expr> {
        F64Backend::eval_f64(expr).map(|v| Expr::float_with_prec(v, precision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_functions::{Function, sin};
    use approx::assert_relative_eq;

    #[test]
    fn test_sympify() {
        assert_eq!(3i64.sympify(), Expr::integer(3));
        assert_eq!("x".sympify(), Expr::symbol("x"));
        assert_eq!(0.5f64.sympify(), Expr::float(0.5));
    }

    #[test]
    fn test_f64_backend() {
        let e = Expr::integer(2).pow(Expr::symbol("x"));
        assert_eq!(F64Backend::eval_f64(&e), None);
        let s = Expr::apply_raw(sin(), vec![Expr::float(0.5)]);
        assert_relative_eq!(F64Backend::eval_f64(&s).unwrap(), 0.5f64.sin());
        let tagged = F64Backend.evaluate(&(s + 1), 20).unwrap();
        assert_eq!(tagged.float_precision(), Some(20));
        let undefined = Expr::apply_raw(Function::undefined("f"), vec![Expr::float(0.5)]);
        assert_eq!(F64Backend.evaluate(&undefined, 53), None);
    }
}

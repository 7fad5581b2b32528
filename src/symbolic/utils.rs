//! Numeric helpers and expression statistics: central differences, operation counting, float
//! conversion of exact numbers.
use crate::symbolic::symbolic_arithmetic::coeff_isneg;
use crate::symbolic::symbolic_context::Context;
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_numbers::Number;

/*
    let x_values = vec![0.0, 1.0, 2.0, 3.0, 4.0];
    let h = 0.001;
    let derivatives = numerical_derivative(f, x_values, h);
*/
pub fn numerical_derivative<F>(f: F, x_values: Vec<f64>, h: f64) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    let mut derivatives = Vec::with_capacity(x_values.len());

    for &x in &x_values {
        let f_x_plus_h = f(x + h);
        let f_x_minus_h = f(x - h);
        let derivative = (f_x_plus_h - f_x_minus_h) / (2.0 * h);
        derivatives.push(derivative);
    }

    derivatives
}

fn is_reciprocal(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Pow(_, exp) => exp.as_number().is_some_and(Number::is_minus_one),
        _ => false,
    }
}

/// Number of operations in the expression: additions and subtractions, negations,
/// multiplications, divisions, powers, applied functions and derivatives.
/// `sin(x)*x + sin(x)^2` counts 5.
pub fn count_ops(expr: &Expr) -> usize {
    match expr.kind() {
        ExprKind::Symbol(_) | ExprKind::Number(_) | ExprKind::IdentityFunction => 0,
        // a negative term is a subtraction, its sign is not counted again
        ExprKind::Add(terms) => {
            let all_negative = terms.iter().all(coeff_isneg);
            let inner: usize = terms
                .iter()
                .map(|t| if coeff_isneg(t) { count_ops(&-t) } else { count_ops(t) })
                .sum();
            terms.len() - 1 + usize::from(all_negative) + inner
        }
        ExprKind::Mul(factors) => {
            let (coeff, _) = expr.as_coeff_mul();
            let neg = usize::from(coeff.is_negative());
            let scaled = usize::from(!coeff.abs().is_one());
            let (denominators, numerators): (Vec<&Expr>, Vec<&Expr>) = factors
                .iter()
                .filter(|f| !f.is_number())
                .partition(|f| is_reciprocal(f));
            let muls = (numerators.len() + scaled).saturating_sub(1);
            let inner: usize = numerators
                .iter()
                .map(|f| count_ops(f))
                .chain(denominators.iter().map(|f| count_ops(&f.operands()[0])))
                .sum();
            neg + muls + denominators.len() + inner
        }
        // reciprocals count as a division, other powers as one power
        ExprKind::Pow(base, exp) => {
            if is_reciprocal(expr) {
                1 + count_ops(base)
            } else {
                1 + count_ops(base) + count_ops(exp)
            }
        }
        ExprKind::Apply(_, args) => 1 + args.iter().map(count_ops).sum::<usize>(),
        ExprKind::Derivative(inner, _) => 1 + count_ops(inner),
        ExprKind::Subs { expr, point, .. } => {
            count_ops(expr) + point.iter().map(count_ops).sum::<usize>()
        }
        ExprKind::Lambda { body, .. } => count_ops(body),
    }
}

impl Context {
    /// Replaces rational numbers by floats of `digits` significant digits. Exponents keep their
    /// exact value unless `exponent` is set. Applied functions are re-applied and therefore
    /// evaluated when their arguments became floats.
    pub fn nfloat(&self, expr: &Expr, digits: u32, exponent: bool) -> Result<Expr, SymbolicError> {
        let _guard = self.enter()?;
        let prec = (f64::from(digits) * std::f64::consts::LOG2_10).ceil() as u32;
        match expr.kind() {
            ExprKind::Number(n) if !n.is_float() => Ok(Expr::float_with_prec(n.to_f64(), prec)),
            ExprKind::Pow(base, exp) => {
                let base = self.nfloat(base, digits, exponent)?;
                let exp = if exponent {
                    self.nfloat(exp, digits, exponent)?
                } else {
                    exp.clone()
                };
                Ok(base.pow(exp))
            }
            _ => {
                let operands = expr.operands();
                if operands.is_empty() {
                    return Ok(expr.clone());
                }
                let converted = operands
                    .iter()
                    .map(|o| self.nfloat(o, digits, exponent))
                    .collect::<Result<Vec<_>, _>>()?;
                if converted.iter().zip(&operands).all(|(a, b)| a.ptr_eq(b)) {
                    return Ok(expr.clone());
                }
                self.rebuild(expr, converted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_functions::{Function, cos, sin};
    use approx::assert_relative_eq;

    fn sample_points(start: f64, end: f64, n: usize) -> Vec<f64> {
        let step = (end - start) / (n as f64 - 1.0);
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    #[test]
    fn test_numerical_derivative() {
        let xs = sample_points(0.0, 2.0, 5);
        let d = numerical_derivative(|x: f64| x * x * x, xs.clone(), 1e-5);
        for (x, dx) in xs.iter().zip(d) {
            assert_relative_eq!(dx, 3.0 * x * x, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_count_ops() {
        let ctx = Context::new();
        let (x, y) = crate::symbols!(x, y);
        let sin_x = ctx.call(&sin(), &[x.clone()]).unwrap();
        let e = sin_x.clone() * x.clone() + sin_x.pow(2);
        assert_eq!(count_ops(&e), 5);
        assert_eq!(count_ops(&(x.clone() - y.clone())), 1);
        assert_eq!(count_ops(&(x.clone() / y.clone())), 1);
        assert_eq!(count_ops(&(-x.clone())), 1);
        assert_eq!(count_ops(&(x.clone() * 2)), 1);
        assert_eq!(count_ops(&(y.pow(2) + x.clone() + 1)), 3);
        assert_eq!(count_ops(&x), 0);

        let f = Function::undefined("f");
        let fx = ctx.call(&f, &[x.clone()]).unwrap();
        let d = ctx.diff_var(&fx, &x).unwrap();
        assert_eq!(count_ops(&d), 2);
    }

    #[test]
    fn test_nfloat() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let e = x.pow(Expr::rational(1, 2)) + Expr::rational(1, 4);
        let converted = ctx.nfloat(&e, 15, false).unwrap();
        let expected = x.pow(Expr::rational(1, 2)) + Expr::float_with_prec(0.25, 50);
        assert_eq!(converted, expected);
        let with_exponent = ctx.nfloat(&e, 15, true).unwrap();
        let expected = x.pow(Expr::float_with_prec(0.5, 50)) + Expr::float_with_prec(0.25, 50);
        assert_eq!(with_exponent, expected);
    }

    #[test]
    fn test_nfloat_evaluates_functions() {
        let ctx = Context::new();
        let cos_half = ctx.call(&cos(), &[Expr::rational(1, 2)]).unwrap();
        let value = ctx.nfloat(&cos_half, 15, false).unwrap();
        assert_relative_eq!(value.as_number().unwrap().to_f64(), 0.5f64.cos(), epsilon = 1e-12);
    }
}

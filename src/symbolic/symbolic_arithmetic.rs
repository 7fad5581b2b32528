//! Canonicalizing constructors of sums, products and powers.
//!
//! Sums are flattened, numbers are folded and like terms are collected by their numeric
//! coefficient. Products are flattened, the numeric coefficient is folded and powers of equal
//! bases are combined. Arguments are sorted with `expr_cmp`, so two sums or products of the same
//! terms are structurally identical regardless of construction order.
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use crate::symbolic::symbolic_numbers::Number;
use crate::symbolic::symbolic_ordering::expr_cmp;
use rustc_hash::FxHashMap;

/// true if the leading number of the expression is negative
pub fn coeff_isneg(a: &Expr) -> bool {
    let lead = match a.kind() {
        ExprKind::Mul(factors) => factors.first(),
        _ => Some(a),
    };
    lead.and_then(Expr::as_number)
        .is_some_and(Number::is_negative)
}

fn flatten(items: impl IntoIterator<Item = Expr>, is_same: fn(&Expr) -> bool) -> Vec<Expr> {
    let mut out = Vec::new();
    for item in items {
        if is_same(&item) {
            out.extend(item.operands());
        } else {
            out.push(item);
        }
    }
    out
}

impl Expr {
    /// Canonical sum of the given terms.
    pub fn add_all(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut constant = Number::zero();
        let mut collected: Vec<(Expr, Number)> = Vec::new();
        let mut index: FxHashMap<Expr, usize> = FxHashMap::default();
        for term in flatten(terms, Expr::is_add) {
            if let Some(n) = term.as_number() {
                constant = &constant + n;
                continue;
            }
            let (coeff, rest) = term.as_coeff_mul();
            match index.get(&rest) {
                Some(&i) => collected[i].1 = &collected[i].1 + &coeff,
                None => {
                    index.insert(rest.clone(), collected.len());
                    collected.push((rest, coeff));
                }
            }
        }
        let mut out: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, c)| !c.is_zero())
            .map(|(term, c)| {
                if c.is_one() {
                    term
                } else {
                    Expr::mul_all([Expr::number(c), term])
                }
            })
            .collect();
        if !constant.is_zero() {
            out.push(Expr::number(constant));
        }
        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => {
                out.sort_by(expr_cmp);
                Expr::new_node(ExprKind::Add(out))
            }
        }
    }

    /// Canonical product of the given factors.
    pub fn mul_all(factors: impl IntoIterator<Item = Expr>) -> Expr {
        let mut coeff = Number::one();
        let mut bases: Vec<(Expr, Vec<Expr>)> = Vec::new();
        let mut index: FxHashMap<Expr, usize> = FxHashMap::default();
        for factor in flatten(factors, Expr::is_mul) {
            if let Some(n) = factor.as_number() {
                coeff = &coeff * n;
                continue;
            }
            let (base, exp) = factor.as_base_exp();
            match index.get(&base) {
                Some(&i) => bases[i].1.push(exp),
                None => {
                    index.insert(base.clone(), bases.len());
                    bases.push((base, vec![exp]));
                }
            }
        }
        if coeff.is_zero() {
            return Expr::zero();
        }
        let mut out = Vec::with_capacity(bases.len() + 1);
        for (base, exps) in bases {
            let exp = if exps.len() == 1 {
                exps.into_iter().next().unwrap_or_else(Expr::one)
            } else {
                Expr::add_all(exps)
            };
            let power = base.pow(exp);
            match power.as_number() {
                Some(n) => coeff = &coeff * n,
                None => out.push(power),
            }
        }
        if coeff.is_zero() {
            return Expr::zero();
        }
        // (a*b)^(1/2) squared comes back as a product and has to be flattened again
        if out.iter().any(Expr::is_mul) {
            return Expr::mul_all(out.into_iter().chain([Expr::number(coeff)]));
        }
        if out.is_empty() {
            return Expr::number(coeff);
        }
        if coeff.is_one() && out.len() == 1 {
            return out.remove(0);
        }
        out.sort_by(expr_cmp);
        if !coeff.is_one() {
            out.insert(0, Expr::number(coeff));
        }
        Expr::new_node(ExprKind::Mul(out))
    }

    /// Product that folds the numeric coefficient but keeps powers of equal bases apart,
    /// `x^a*x^b` stays a product of two powers.
    pub fn mul_unmerged(factors: impl IntoIterator<Item = Expr>) -> Expr {
        let mut coeff = Number::one();
        let mut out = Vec::new();
        for factor in flatten(factors, Expr::is_mul) {
            match factor.as_number() {
                Some(n) => coeff = &coeff * n,
                None => out.push(factor),
            }
        }
        if coeff.is_zero() {
            return Expr::zero();
        }
        if out.is_empty() {
            return Expr::number(coeff);
        }
        if coeff.is_one() && out.len() == 1 {
            return out.remove(0);
        }
        out.sort_by(expr_cmp);
        if !coeff.is_one() {
            out.insert(0, Expr::number(coeff));
        }
        Expr::new_node(ExprKind::Mul(out))
    }

    /// `self^exp` with numeric folding; `(b^e)^n` collapses for integer `n`.
    pub fn pow(&self, exp: impl Into<Expr>) -> Expr {
        let exp: Expr = exp.into();
        if let Some(e) = exp.as_number() {
            if e.is_zero() {
                return Expr::one();
            }
            if e.is_one() {
                return self.clone();
            }
        }
        if self.is_one() {
            return Expr::one();
        }
        match (self.kind(), exp.kind()) {
            (ExprKind::Number(b), ExprKind::Number(e)) => {
                if let Some(value) = b.pow(e) {
                    return Expr::number(value);
                }
            }
            (ExprKind::Pow(base, inner), ExprKind::Number(e)) if e.is_integer() => {
                return base.pow(inner * &exp);
            }
            _ => {}
        }
        Expr::new_node(ExprKind::Pow(self.clone(), exp))
    }

    /// `(coefficient, rest)` with `self == coefficient * rest`
    pub fn as_coeff_mul(&self) -> (Number, Expr) {
        match self.kind() {
            ExprKind::Number(n) => (n.clone(), Expr::one()),
            ExprKind::Mul(factors) => match factors.first().and_then(Expr::as_number) {
                Some(c) => {
                    let rest = &factors[1..];
                    let rest = if rest.len() == 1 {
                        rest[0].clone()
                    } else {
                        Expr::new_node(ExprKind::Mul(rest.to_vec()))
                    };
                    (c.clone(), rest)
                }
                None => (Number::one(), self.clone()),
            },
            _ => (Number::one(), self.clone()),
        }
    }

    /// `(base, exponent)`, `(self, 1)` for anything that is not a power
    pub fn as_base_exp(&self) -> (Expr, Expr) {
        match self.kind() {
            ExprKind::Pow(base, exp) => (base.clone(), exp.clone()),
            _ => (self.clone(), Expr::one()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_collects_like_terms() {
        let (x, y) = crate::symbols!(x, y);
        let e = x.clone() + y.clone() + x.clone() * 2 + 3;
        assert_eq!(e, Expr::integer(3) + x.clone() * 3 + y.clone());
        assert_eq!(x.clone() - x.clone(), Expr::zero());
        assert_eq!(Expr::integer(2) + Expr::integer(3), Expr::integer(5));
    }

    #[test]
    fn test_add_flattens() {
        let (x, y, z) = crate::symbols!(x, y, z);
        let nested = Expr::add_all([x.clone() + y.clone(), z.clone()]);
        let flat = Expr::add_all([x.clone(), y.clone(), z.clone()]);
        assert_eq!(nested, flat);
        assert_eq!(nested.operands().len(), 3);
    }

    #[test]
    fn test_mul_combines_powers() {
        let (x, y) = crate::symbols!(x, y);
        assert_eq!(x.clone() * x.clone(), x.pow(2));
        assert_eq!(x.pow(2) * x.pow(-1), x.clone());
        assert_eq!(x.clone() / x.clone(), Expr::one());
        assert_eq!(x.clone() * 0, Expr::zero());
        let e = Expr::integer(2) * x.clone() * y.clone() * 3;
        let (c, rest) = e.as_coeff_mul();
        assert_eq!(c, Number::integer(6));
        assert_eq!(rest, x.clone() * y.clone());
    }

    #[test]
    fn test_pow_rules() {
        let x = Expr::symbol("x");
        assert_eq!(x.pow(0), Expr::one());
        assert_eq!(x.pow(1), x.clone());
        assert_eq!(Expr::one().pow(x.clone()), Expr::one());
        assert_eq!(Expr::integer(2).pow(3), Expr::integer(8));
        assert_eq!(Expr::integer(2).pow(-1), Expr::rational(1, 2));
        assert_eq!(x.pow(2).pow(3), x.pow(6));
        assert!(matches!(Expr::integer(0).pow(-1).kind(), ExprKind::Pow(..)));
    }

    #[test]
    fn test_float_folding() {
        let e = Expr::float_with_prec(0.5, 30) + Expr::float(0.25);
        assert_eq!(e.float_precision(), Some(30));
        let p = Expr::float(4.0).pow(Expr::rational(1, 2));
        assert_eq!(p, Expr::float(2.0));
    }

    #[test]
    fn test_coeff_isneg() {
        let x = Expr::symbol("x");
        assert!(coeff_isneg(&(-x.clone())));
        assert!(coeff_isneg(&Expr::integer(-2)));
        assert!(!coeff_isneg(&x));
        assert!(!coeff_isneg(&(x.clone() * 2)));
    }
}

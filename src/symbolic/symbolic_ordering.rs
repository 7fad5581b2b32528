//! Canonical total order of expressions.
//!
//! Used to sort the arguments of sums and products and to sort runs of differentiation
//! variables. Kinds are ranked first (numbers, symbols, applied functions, powers, products,
//! sums, derivatives, substitutions, lambdas), then compared structurally.
use crate::symbolic::symbolic_engine::{Expr, ExprKind};
use std::cmp::Ordering;

fn kind_rank(e: &Expr) -> u8 {
    match e.kind() {
        ExprKind::Number(_) => 0,
        ExprKind::Symbol(_) => 1,
        ExprKind::Apply(..) => 2,
        ExprKind::Pow(..) => 3,
        ExprKind::Mul(_) => 4,
        ExprKind::Add(_) => 5,
        ExprKind::Derivative(..) => 6,
        ExprKind::Subs { .. } => 7,
        ExprKind::Lambda { .. } => 8,
        ExprKind::IdentityFunction => 9,
    }
}

fn cmp_slices(a: &[Expr], b: &[Expr]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match expr_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// factors of a product without the leading numeric coefficient
fn non_numeric(factors: &[Expr]) -> &[Expr] {
    match factors.first() {
        Some(c) if c.is_number() => &factors[1..],
        _ => factors,
    }
}

pub fn expr_cmp(a: &Expr, b: &Expr) -> Ordering {
    if a.ptr_eq(b) {
        return Ordering::Equal;
    }
    let by_rank = kind_rank(a).cmp(&kind_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a.kind(), b.kind()) {
        (ExprKind::Number(x), ExprKind::Number(y)) => x.cmp_value(y),
        (ExprKind::Symbol(x), ExprKind::Symbol(y)) => x.cmp(y),
        (ExprKind::Apply(f, xs), ExprKind::Apply(g, ys)) => f
            .name()
            .cmp(g.name())
            .then_with(|| f.kind().cmp(&g.kind()))
            .then_with(|| f.id().cmp(&g.id()))
            .then_with(|| cmp_slices(xs, ys)),
        (ExprKind::Pow(b1, e1), ExprKind::Pow(b2, e2)) => {
            expr_cmp(b1, b2).then_with(|| expr_cmp(e1, e2))
        }
        // coefficients only break ties, so 2*x sorts next to x*y rather than before every symbol
        (ExprKind::Mul(xs), ExprKind::Mul(ys)) => cmp_slices(non_numeric(xs), non_numeric(ys))
            .then_with(|| cmp_slices(xs, ys)),
        (ExprKind::Add(xs), ExprKind::Add(ys)) => cmp_slices(xs, ys),
        (ExprKind::Derivative(e1, v1), ExprKind::Derivative(e2, v2)) => {
            expr_cmp(e1, e2).then_with(|| {
                for ((x, n), (y, m)) in v1.iter().zip(v2) {
                    let o = expr_cmp(x, y).then(n.cmp(m));
                    if o != Ordering::Equal {
                        return o;
                    }
                }
                v1.len().cmp(&v2.len())
            })
        }
        // bound placeholders are arbitrary, the rename invariant hash orders these kinds
        _ => a.hash_value().cmp(&b.hash_value()),
    }
}

/// Sorts differentiation steps: symbols commute with symbols and non-symbols commute with
/// non-symbols, so each maximal run of one sort is sorted on its own while the runs keep their
/// relative order.
pub fn sort_variables(variables: &[Expr]) -> Vec<Expr> {
    let pairs: Vec<(Expr, u32)> = variables.iter().map(|v| (v.clone(), 1)).collect();
    sort_variable_counts(&pairs)
        .into_iter()
        .map(|(v, _)| v)
        .collect()
}

/// `sort_variables` over `(entity, count)` pairs, counts travel with their entity
pub fn sort_variable_counts(pairs: &[(Expr, u32)]) -> Vec<(Expr, u32)> {
    pairs
        .chunk_by(|(a, _), (b, _)| a.is_symbol() == b.is_symbol())
        .flat_map(|run| {
            let mut run = run.to_vec();
            run.sort_by(|(a, _), (b, _)| expr_cmp(a, b));
            run
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::symbolic_functions::{Function, sin};

    #[test]
    fn test_kind_rank_order() {
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let fx = Expr::apply_raw(f, vec![x.clone()]);
        assert_eq!(expr_cmp(&Expr::integer(5), &x), Ordering::Less);
        assert_eq!(expr_cmp(&x, &fx), Ordering::Less);
        assert_eq!(expr_cmp(&fx, &x.pow(2)), Ordering::Less);
        assert_eq!(expr_cmp(&x, &x), Ordering::Equal);
    }

    #[test]
    fn test_symbols_sorted_by_name() {
        let (a, b) = (Expr::symbol("a"), Expr::symbol("b"));
        assert_eq!(expr_cmp(&a, &b), Ordering::Less);
        assert_eq!(expr_cmp(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_sort_variables_runs() {
        let (x, y, z) = crate::symbols!(x, y, z);
        let f = Function::undefined("f");
        let g = Function::undefined("g");
        let fx = Expr::apply_raw(f, vec![x.clone()]);
        let gx = Expr::apply_raw(g, vec![x.clone()]);
        let sorted = sort_variables(&[z.clone(), y.clone(), gx.clone(), fx.clone(), x.clone()]);
        assert_eq!(sorted, vec![y, z, fx, gx, x]);
    }

    #[test]
    fn test_functions_with_one_name_are_ordered() {
        let x = Expr::symbol("x");
        let user_sin = Expr::apply_raw(Function::undefined("sin"), vec![x.clone()]);
        let builtin_sin = Expr::apply_raw(sin(), vec![x.clone()]);
        assert_eq!(expr_cmp(&user_sin, &builtin_sin), Ordering::Less);
        assert_eq!(expr_cmp(&builtin_sin, &user_sin), Ordering::Greater);
        let a = Expr::add_all([user_sin.clone(), builtin_sin.clone()]);
        let b = Expr::add_all([builtin_sin.clone(), user_sin.clone()]);
        assert_eq!(a.operands(), b.operands());
        assert_eq!(a.operands()[0], user_sin);
    }
}

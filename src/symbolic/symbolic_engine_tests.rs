//___________________________________TESTS____________________________________
// properties of the whole core: differentiation, deferred substitution, anonymous functions

#[cfg(test)]
mod tests {
    use crate::symbolic::symbolic_context::Context;
    use crate::symbolic::symbolic_engine::{Expr, ExprKind, Symbol};
    use crate::symbolic::symbolic_engine_derivatives::VariableSpec;
    use crate::symbolic::symbolic_errors::SymbolicError;
    use crate::symbolic::symbolic_functions::{
        Arity, DerivativeRule, Function, FunctionBehaviour, FunctionRef, cos, exp, log, sin,
    };
    use crate::symbolic::symbolic_lambda::Lambda;
    use crate::symbolic::symbolic_ordering::sort_variables;
    use crate::symbols;
    use std::sync::Arc;

    fn apply(ctx: &Context, f: &FunctionRef, args: &[Expr]) -> Expr {
        ctx.call(f, args).unwrap()
    }

    fn sample_expressions(ctx: &Context) -> Vec<Expr> {
        let (x, y) = symbols!(x, y);
        let f = Function::undefined("f");
        vec![
            x.pow(3) * y.clone() + x.clone() * 4,
            apply(ctx, &sin(), &[x.clone() * y.clone()]) + apply(ctx, &exp(), &[y.pow(2)]),
            apply(ctx, &log(), &[x.clone() + 1]) * apply(ctx, &f, &[x.clone(), y.clone()]),
            x.pow(y.clone()),
            apply(ctx, &f, &[x.clone() * 2]),
        ]
    }

    #[test]
    fn test_absent_symbol_gives_zero() {
        let ctx = Context::new();
        let z = Expr::symbol("z");
        for e in sample_expressions(&ctx) {
            assert_eq!(ctx.diff_var(&e, &z).unwrap(), Expr::zero(), "{}", e);
        }
        // one absent symbol is enough
        let x = Expr::symbol("x");
        let e = x.pow(2);
        assert_eq!(ctx.diff(&e, &[(&x).into(), (&z).into()]).unwrap(), Expr::zero());
    }

    #[test]
    fn test_zero_order_collapse() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        for e in sample_expressions(&ctx) {
            for evaluate in [true, false] {
                let d = ctx
                    .differentiate(&e, &[(&x).into(), VariableSpec::Order(0)], evaluate)
                    .unwrap();
                assert!(d.ptr_eq(&e));
            }
        }
    }

    #[test]
    fn test_apply_is_deduplicated() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        let f = Function::undefined("f");
        let a = apply(&ctx, &f, &[x.clone() + y.clone(), Expr::integer(2)]);
        let b = apply(&ctx, &f, &[y.clone() + x.clone(), Expr::integer(2)]);
        assert_eq!(a, b);
        assert!(a.ptr_eq(&b));
        let hits = ctx.cache().stats().hits;
        let _ = apply(&ctx, &f, &[x.clone() + y.clone(), Expr::integer(2)]);
        assert_eq!(ctx.cache().stats().hits, hits + 1);
    }

    #[test]
    fn test_symbol_steps_commute() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        for e in sample_expressions(&ctx) {
            let xy = ctx.diff_var(&ctx.diff_var(&e, &x).unwrap(), &y).unwrap();
            let yx = ctx.diff_var(&ctx.diff_var(&e, &y).unwrap(), &x).unwrap();
            assert_eq!(xy, yx, "{}", e);
        }
    }

    #[test]
    fn test_function_entity_steps_do_not_commute() {
        // d/dg d/dx f(x) = 1 while d/dx d/dg f(x) = 0 for g = Derivative(f(x), x)
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let fx = apply(&ctx, &f, &[x.clone()]);
        let g = ctx.diff_var(&fx, &x).unwrap();
        assert!(g.diff_wrt());
        let x_then_g = ctx.diff_var(&ctx.diff_var(&fx, &x).unwrap(), &g).unwrap();
        let g_then_x = ctx.diff_var(&ctx.diff_var(&fx, &g).unwrap(), &x).unwrap();
        assert_eq!(x_then_g, Expr::one());
        assert_eq!(g_then_x, Expr::zero());
        assert_ne!(x_then_g, g_then_x);
    }

    #[test]
    fn test_subs_round_trip() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        let body = x.pow(2) * y.clone() + apply(&ctx, &cos(), &[x.clone()]);
        let point = y.clone() + 3;
        let s = ctx.build_subs(&body, &[x.clone()], &[point.clone()]).unwrap();
        let direct = ctx.subs(&body, &x, &point).unwrap();
        assert_eq!(ctx.doit(&s).unwrap(), direct);
    }

    #[test]
    fn test_subs_rejects_duplicates() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let result = ctx.build_subs(&x.pow(2), &[x.clone(), x.clone()], &[Expr::one(), Expr::integer(2)]);
        assert!(matches!(result, Err(SymbolicError::DuplicateVariable { .. })));
    }

    #[test]
    fn test_lambda_identity_and_invocation() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        assert_eq!(Lambda::new(&[x.clone()], &x), Expr::identity());
        let l = Lambda::new(&[x.clone(), y.clone()], &(x.clone() + y.clone() * y.clone()));
        assert_eq!(ctx.invoke(&l, &[Expr::one(), Expr::integer(2)]).unwrap(), Expr::integer(5));
    }

    #[test]
    fn test_third_derivative_of_undefined_function() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let fx = apply(&ctx, &f, &[x.clone()]);
        let repeated = ctx
            .diff(&fx, &[(&x).into(), (&x).into(), (&x).into()])
            .unwrap();
        let ordered = ctx.diff_n(&fx, &x, 3).unwrap();
        assert_eq!(repeated, ordered);
        assert_eq!(ordered, Expr::derivative_raw(fx.clone(), vec![(x.clone(), 3)]));
        assert_eq!(ordered.variables().len(), 3);
    }

    #[test]
    fn test_derivative_by_applied_function() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let fx = apply(&ctx, &f, &[x.clone()]);
        let e = fx.clone() * fx.clone();
        assert_eq!(ctx.diff_var(&e, &fx).unwrap(), fx.clone() * 2);
        // x stays a constant with respect to f(x)
        let mixed = fx.pow(3) * x.clone();
        assert_eq!(ctx.diff_var(&mixed, &fx).unwrap(), fx.pow(2) * x.clone() * 3);
    }

    #[test]
    fn test_chain_rule_through_undefined_functions() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let g = Function::undefined("g");
        let gx = apply(&ctx, &g, &[x.clone()]);
        let fgx = apply(&ctx, &f, &[gx.clone()]);
        let expected = Expr::derivative_raw(fgx.clone(), vec![(gx.clone(), 1)])
            * Expr::derivative_raw(gx.clone(), vec![(x.clone(), 1)]);
        assert_eq!(ctx.diff_var(&fgx, &x).unwrap(), expected);
    }

    #[test]
    fn test_derivative_at_non_symbol_argument() {
        let ctx = Context::new();
        let (x, t) = symbols!(x, t);
        let f = Function::undefined("f");
        let f2x = apply(&ctx, &f, &[x.clone() * 2]);
        let d = ctx.diff_var(&f2x, &x).unwrap();
        let ft = apply(&ctx, &f, &[t.clone()]);
        let subs = ctx
            .build_subs(
                &Expr::derivative_raw(ft, vec![(t.clone(), 1)]),
                &[t.clone()],
                &[x.clone() * 2],
            )
            .unwrap();
        assert_eq!(d, subs * 2);
        // the deferred substitution resolves once the function is known
        let sin_2x = apply(&ctx, &sin(), &[x.clone() * 2]);
        let cos_2x = apply(&ctx, &cos(), &[x.clone() * 2]);
        let replaced = ctx.replace_function(&d, &f, &sin()).unwrap();
        assert_eq!(ctx.doit(&replaced).unwrap(), cos_2x * 2);
        assert_eq!(ctx.diff_var(&sin_2x, &x).unwrap(), apply(&ctx, &cos(), &[x.clone() * 2]) * 2);
    }

    #[test]
    fn test_second_derivative_at_non_symbol_argument() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let f2x = apply(&ctx, &f, &[x.clone() * 2]);
        let d2 = ctx.diff_n(&f2x, &x, 2).unwrap();
        let (coeff, rest) = d2.as_coeff_mul();
        assert_eq!(coeff.to_f64(), 4.0);
        assert!(matches!(rest.kind(), ExprKind::Subs { .. }));
        assert_eq!(rest.free_symbols().len(), 1);
    }

    #[test]
    fn test_mixed_partials_are_sorted() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        let f = Function::undefined("f");
        let fxy = apply(&ctx, &f, &[x.clone(), y.clone()]);
        let yx = ctx.diff(&fxy, &[(&y).into(), (&x).into()]).unwrap();
        let xy = ctx.diff(&fxy, &[(&x).into(), (&y).into()]).unwrap();
        assert_eq!(yx, xy);
        assert_eq!(yx.to_string(), "Derivative(f(x, y), x, y)");
        let raw = ctx.differentiate(&fxy, &[(&y).into(), (&x).into()], false).unwrap();
        assert_eq!(raw.to_string(), "Derivative(f(x, y), y, x)");
    }

    #[test]
    fn test_specs_errors() {
        let ctx = Context::new();
        let (x, y) = symbols!(x, y);
        let e = x.clone() * y.clone();
        assert!(matches!(
            ctx.diff(&e, &[]),
            Err(SymbolicError::Ambiguous { .. })
        ));
        assert_eq!(ctx.diff(&x.pow(2), &[]).unwrap(), x.clone() * 2);
        assert!(matches!(
            ctx.diff(&e, &[Expr::integer(2).into()]),
            Err(SymbolicError::NotDifferentiable { .. })
        ));
        assert!(matches!(
            ctx.diff(&e, &[VariableSpec::Order(2)]),
            Err(SymbolicError::NotDifferentiable { .. })
        ));
    }

    #[test]
    fn test_sort_variables_cases() {
        let (x, y, z) = symbols!(x, y, z);
        let ctx = Context::new();
        let f = Function::undefined("f");
        let g = Function::undefined("g");
        let h = Function::undefined("h");
        let fx = apply(&ctx, &f, &[x.clone()]);
        let gx = apply(&ctx, &g, &[x.clone()]);
        let hx = apply(&ctx, &h, &[x.clone()]);
        let fy = apply(&ctx, &f, &[y.clone()]);

        let cases: Vec<(Vec<Expr>, Vec<Expr>)> = vec![
            (
                vec![x.clone(), y.clone(), z.clone()],
                vec![x.clone(), y.clone(), z.clone()],
            ),
            (
                vec![hx.clone(), gx.clone(), fx.clone()],
                vec![fx.clone(), gx.clone(), hx.clone()],
            ),
            (
                vec![z.clone(), y.clone(), x.clone(), hx.clone(), gx.clone(), fx.clone()],
                vec![x.clone(), y.clone(), z.clone(), fx.clone(), gx.clone(), hx.clone()],
            ),
            (
                vec![x.clone(), fx.clone(), y.clone(), fy.clone()],
                vec![x.clone(), fx.clone(), y.clone(), fy.clone()],
            ),
            (
                vec![
                    y.clone(),
                    x.clone(),
                    gx.clone(),
                    fx.clone(),
                    z.clone(),
                    hx.clone(),
                    y.clone(),
                    x.clone(),
                ],
                vec![
                    x.clone(),
                    y.clone(),
                    fx.clone(),
                    gx.clone(),
                    z.clone(),
                    hx.clone(),
                    x.clone(),
                    y.clone(),
                ],
            ),
            (
                vec![z.clone(), y.clone(), fx.clone(), x.clone(), fx.clone(), gx.clone()],
                vec![y.clone(), z.clone(), fx.clone(), x.clone(), fx.clone(), gx.clone()],
            ),
            (
                vec![
                    z.clone(),
                    y.clone(),
                    fx.clone(),
                    x.clone(),
                    fx.clone(),
                    gx.clone(),
                    z.clone(),
                    z.clone(),
                    y.clone(),
                    x.clone(),
                ],
                vec![
                    y.clone(),
                    z.clone(),
                    fx.clone(),
                    x.clone(),
                    fx.clone(),
                    gx.clone(),
                    x.clone(),
                    y.clone(),
                    z.clone(),
                    z.clone(),
                ],
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(sort_variables(&input), expected);
        }
    }

    /// computes nothing when differentiated by a placeholder, so steps by non-symbols are deferred
    struct PlaceholderBlind;

    impl FunctionBehaviour for PlaceholderBlind {
        fn eval_derivative(
            &self,
            _ctx: &Context,
            _node: &Expr,
            s: &Expr,
        ) -> Result<DerivativeRule, SymbolicError> {
            if s.as_symbol().is_some_and(Symbol::is_dummy) {
                Ok(DerivativeRule::NotComputable)
            } else {
                Ok(DerivativeRule::ChainRule)
            }
        }
    }

    #[test]
    fn test_deferred_non_symbol_blocks_later_steps() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let f = Function::undefined("f");
        let fx = apply(&ctx, &f, &[x.clone()]);
        let g = Function::defined("g", Arity::Exactly(1), Arc::new(PlaceholderBlind));
        let gfx = apply(&ctx, &g, &[fx.clone()]);
        // alone, the step by x succeeds through the chain rule
        assert!(!ctx.diff_var(&gfx, &x).unwrap().is_derivative());
        // after the deferred step by f(x) it is deferred too
        let d = ctx.diff(&gfx, &[(&fx).into(), (&x).into()]).unwrap();
        assert_eq!(
            d,
            Expr::derivative_raw(gfx.clone(), vec![(fx.clone(), 1), (x.clone(), 1)])
        );
    }

    #[test]
    fn test_derivative_of_lambda_is_deferred() {
        let ctx = Context::new();
        let x = Expr::symbol("x");
        let y = Expr::symbol("y");
        let l = Lambda::new(&[x.clone()], &(x.pow(2) * y.clone()));
        let d = ctx.diff_var(&l, &y).unwrap();
        assert!(d.is_derivative());
    }

    #[test]
    fn test_context_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Context>();
        assert_send_sync::<Expr>();
        let ctx = Arc::new(Context::new());
        let x = Expr::symbol("x");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                let x = x.clone();
                std::thread::spawn(move || {
                    let sx = ctx.call(&sin(), &[x.clone()]).unwrap();
                    ctx.diff_var(&sx, &x).unwrap()
                })
            })
            .collect();
        let expected = apply(&ctx, &cos(), &[x.clone()]);
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }
}

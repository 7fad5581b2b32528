#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// core expression type: symbols, exact rationals, floats, sums, products, powers, applied functions,
/// unevaluated derivatives, deferred substitutions and anonymous functions
///# Example#
/// ```
/// use RustedSymbolic::symbolic::symbolic_engine::Expr;
/// use RustedSymbolic::symbols;
/// let (x, y) = symbols!(x, y);
/// let e = x.clone() * y.clone() + x.clone() * y.clone();
/// assert_eq!(e.to_string(), "2*x*y");
/// ```
pub mod symbolic_engine;
/// exact rational and tagged-precision float numbers used by the engine
pub mod symbolic_numbers;
/// canonical total order of expressions (argument sorting, variable sorting)
pub mod symbolic_ordering;
/// canonicalizing constructors of sums, products and powers
pub mod symbolic_arithmetic;
/// memoization of node construction
pub mod symbolic_cache;
/// the engine context: owns configuration, construction cache, rewrite registry and numeric backend
/// ```
/// use RustedSymbolic::symbolic::symbolic_context::Context;
/// use RustedSymbolic::symbolic::symbolic_engine::Expr;
/// use RustedSymbolic::symbolic::symbolic_functions::Function;
/// let ctx = Context::new();
/// let x = Expr::symbol("x");
/// let f = Function::undefined("f");
/// let fx = ctx.call(&f, &[x.clone()]).unwrap();
/// let third = ctx.diff_n(&fx, &x, 3).unwrap();
/// assert_eq!(third.to_string(), "Derivative(f(x), x, x, x)");
/// ```
pub mod symbolic_context;
/// errors of the symbolic core
pub mod symbolic_errors;
/// coercion into expressions and the numeric evaluation backend
pub mod symbolic_traits;
/// applied functions: descriptors, behaviours, built-in elementary functions, partial derivatives
pub mod symbolic_functions;
/// ________________________________________________________________________________________________________________________________
/// # Differentiation
/// Derivative node, the differentiation engine and the per-node derivative protocol
///# Example#
/// ```
/// use RustedSymbolic::symbolic::symbolic_context::Context;
/// use RustedSymbolic::symbolic::symbolic_engine::Expr;
/// use RustedSymbolic::symbolic::symbolic_functions::sin;
/// let ctx = Context::new();
/// let x = Expr::symbol("x");
/// let e = ctx.call(&sin(), &[x.clone()]).unwrap() * x.pow(2);
/// let de = ctx.diff_var(&e, &x).unwrap();
/// assert_eq!(de.to_string(), "2*x*sin(x) + cos(x)*x^2");
/// ```
pub mod symbolic_engine_derivatives;
/// evaluating substitution, function replacement and `doit`
pub mod symbolic_substitution;
/// ________________________________________________________________________________________________________________________________
/// # Deferred substitution
/// `Subs(expr, variables, point)` with capture-safe placeholders
///# Example#
/// ```
/// use RustedSymbolic::symbolic::symbolic_context::Context;
/// use RustedSymbolic::symbolic::symbolic_engine::Expr;
/// let ctx = Context::new();
/// let (x, y) = (Expr::symbol("x"), Expr::symbol("y"));
/// let s = ctx.build_subs(&(x.clone() * y.clone()), &[x.clone()], &[Expr::integer(2)]).unwrap();
/// assert_eq!(ctx.doit(&s).unwrap(), y * 2);
/// ```
pub mod symbolic_subs;
/// anonymous functions
pub mod symbolic_lambda;
/// hint-driven rewrite dispatcher and the `expand` family
pub mod symbolic_rewrite;
/// scenario tests of the whole core
mod symbolic_engine_tests;
/// numeric derivative, operation counting, float conversion
pub mod utils;

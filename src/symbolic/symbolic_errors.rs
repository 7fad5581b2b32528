//! Errors of the symbolic core.
//!
//! Every variant is a precondition violation detected before a node is built, so a failed call
//! never leaves a partially constructed expression behind. A derivative hook that cannot compute
//! a result is not an error: it answers `None` and the engine keeps an unevaluated `Derivative`.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolicError {
    /// applied function or lambda called with a wrong number of arguments
    #[error("{name} takes exactly {expected} argument(s) ({given} given)")]
    ArityMismatch {
        name: String,
        expected: String,
        given: usize,
    },
    /// no differentiation variable given and the expression has several free symbols
    #[error(
        "since there is more than one variable in the expression, the variable(s) of differentiation must be supplied to differentiate {expr}"
    )]
    Ambiguous { expr: String },
    #[error("can't differentiate wrt the variable: {entity}")]
    NotDifferentiable { entity: String },
    #[error("invalid operation with argument number {argindex} for Function {function}")]
    ArgumentIndex { function: String, argindex: usize },
    #[error("cannot substitute expressions {repeated} more than once.")]
    DuplicateVariable { repeated: String },
    #[error(
        "number of point values must be the same as the number of variables ({variables} variables, {points} points)"
    )]
    LengthMismatch { variables: usize, points: usize },
    /// raised by series helpers when the expansion point is singular
    #[error("{0}")]
    PoleError(String),
    #[error("maximum recursion depth {limit} exceeded")]
    RecursionLimit { limit: usize },
    #[error("{expr} is not callable")]
    NotCallable { expr: String },
    #[error("not implemented: {0}")]
    Unsupported(String),
    #[error("configuration error: {0}")]
    Config(String),
}

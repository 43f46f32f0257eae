use hf_core::{Error, Span};

/// Runtime failure at `span`.
pub fn eval_error(message: impl Into<String>, span: Span) -> Error {
    Error::eval_at(message, span)
}

/// Attach `span` to an error raised by a native function or a nested call, unless it
/// already carries a position.
pub fn locate(err: Error, span: Span) -> Error {
    err.with_span(span)
}

/// Return early with an evaluation error at a span.
///
/// The error converts into whatever error type the enclosing function returns, so the
/// macro works both in plain `Result` functions and in the evaluator's control-flow
/// results.
#[macro_export]
macro_rules! interp_bail {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::eval_error(format!($($arg)*), $span).into())
    };
}

/// Ensure a condition holds, or return an evaluation error at a span.
#[macro_export]
macro_rules! interp_ensure {
    ($cond:expr, $span:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::interp_bail!($span, $($arg)*);
        }
    };
}

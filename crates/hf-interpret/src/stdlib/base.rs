use super::STD_SET;
use crate::engine::SCRIPT_LOG_TARGET;
use hf_core::{bail, Args, Error, Exports, IntTy, NativeFunction, Result, Ty, Value};
use itertools::Itertools;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const STRINGS: &str = "std::strings";
const MATH: &str = "std::math";
const TIME: &str = "std::time";
const LOG: &str = "std::log";

fn i64_ty() -> Ty {
    Ty::Int(IntTy::I64)
}

fn f64_ty() -> Ty {
    Ty::Float(hf_core::FloatTy::F64)
}

fn string_fn(name: &str, op: fn(&str) -> String) -> NativeFunction {
    NativeFunction::new(name, vec![Ty::Str], Ty::Str, move |args| Ok(Value::string(op(args.str(0)?))))
}

pub(super) fn exports() -> Exports {
    Exports::new(STD_SET)
        // std::strings
        .with_function(
            STRINGS,
            NativeFunction::new("join", vec![Ty::list(Ty::Any), Ty::Str], Ty::Str, |args| {
                let sep = args.str(1)?;
                Ok(Value::string(args.list(0)?.iter().map(ToString::to_string).join(sep)))
            }),
        )
        .with_function(
            STRINGS,
            NativeFunction::new("repeat", vec![Ty::Str, i64_ty()], Ty::Str, |args| {
                let count = args.int(1)?;
                let Ok(count) = usize::try_from(count) else {
                    bail!("`repeat` count must not be negative, found {count}");
                };
                Ok(Value::string(args.str(0)?.repeat(count)))
            }),
        )
        .with_function(
            STRINGS,
            NativeFunction::new("split", vec![Ty::Str, Ty::Str], Ty::list(Ty::Str), |args| {
                let parts = args.str(0)?.split(args.str(1)?).map(Value::from).collect::<Vec<_>>();
                Ok(Value::list(parts))
            }),
        )
        .with_function(STRINGS, string_fn("to_upper", str::to_uppercase))
        .with_function(STRINGS, string_fn("to_lower", str::to_lowercase))
        .with_function(STRINGS, string_fn("trim", |s| s.trim().to_string()))
        .with_function(
            STRINGS,
            NativeFunction::new("contains", vec![Ty::Str, Ty::Str], Ty::Bool, |args| {
                Ok(Value::Bool(args.str(0)?.contains(args.str(1)?)))
            }),
        )
        .with_function(
            STRINGS,
            NativeFunction::new("replace", vec![Ty::Str, Ty::Str, Ty::Str], Ty::Str, |args| {
                Ok(Value::string(args.str(0)?.replace(args.str(1)?, args.str(2)?)))
            }),
        )
        .with_function(
            STRINGS,
            NativeFunction::new("parse_int", vec![Ty::Str], i64_ty(), |args| {
                let text = args.str(0)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|err| Error::eval(format!("cannot parse `{text}` as an integer: {err}")))
            }),
        )
        .with_function(
            STRINGS,
            NativeFunction::new("parse_float", vec![Ty::Str], f64_ty(), |args| {
                let text = args.str(0)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|err| Error::eval(format!("cannot parse `{text}` as a float: {err}")))
            }),
        )
        // std::math
        .with_function(MATH, NativeFunction::new("abs", vec![Ty::Any], Ty::Any, abs))
        .with_function(MATH, NativeFunction::new("min", vec![Ty::Any, Ty::Any], Ty::Any, |args| extremum(args, false)))
        .with_function(MATH, NativeFunction::new("max", vec![Ty::Any, Ty::Any], Ty::Any, |args| extremum(args, true)))
        .with_function(
            MATH,
            NativeFunction::new("pow", vec![i64_ty(), i64_ty()], i64_ty(), |args| {
                let (base, exp) = (args.int(0)?, args.int(1)?);
                let Ok(exp) = u32::try_from(exp) else {
                    bail!("`pow` exponent must be a non-negative `u32`, found {exp}");
                };
                match base.checked_pow(exp) {
                    Some(v) => Ok(Value::Int(v)),
                    None => bail!("attempt to multiply with overflow"),
                }
            }),
        )
        .with_function(
            MATH,
            NativeFunction::new("sqrt", vec![Ty::Any], f64_ty(), |args| Ok(Value::Float(args.float(0)?.sqrt()))),
        )
        .with(MATH, "MAX_INT", Value::Int(i64::MAX))
        .with(MATH, "MIN_INT", Value::Int(i64::MIN))
        .with(MATH, "PI", Value::Float(std::f64::consts::PI))
        // std::time
        .with_function(
            TIME,
            NativeFunction::new("now_millis", vec![], i64_ty(), |_| {
                let elapsed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|err| Error::eval(format!("system clock is before the epoch: {err}")))?;
                Ok(Value::Int(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)))
            }),
        )
        .with_function(
            TIME,
            NativeFunction::new("sleep_millis", vec![i64_ty()], Ty::Unit, |args| {
                let millis = args.int(0)?;
                let Ok(millis) = u64::try_from(millis) else {
                    bail!("cannot sleep for a negative duration ({millis} ms)");
                };
                std::thread::sleep(Duration::from_millis(millis));
                Ok(Value::Unit)
            }),
        )
        // std::log
        .with_function(LOG, NativeFunction::variadic("info", |args| log_line(args, tracing::Level::INFO)))
        .with_function(LOG, NativeFunction::variadic("warn", |args| log_line(args, tracing::Level::WARN)))
        .with_function(LOG, NativeFunction::variadic("error", |args| log_line(args, tracing::Level::ERROR)))
}

fn abs(args: Args) -> Result<Value> {
    match args.get(0)? {
        Value::Int(v) => match v.checked_abs() {
            Some(v) => Ok(Value::Int(v)),
            None => bail!("attempt to negate with overflow"),
        },
        Value::Float(v) => Ok(Value::Float(v.abs())),
        other => bail!("`abs` expects a number, found `{}`", other.type_name()),
    }
}

fn extremum(args: Args, max: bool) -> Result<Value> {
    match (args.get(0)?, args.get(1)?) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if max { *a.max(b) } else { *a.min(b) })),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (args.float(0)?, args.float(1)?);
            Ok(Value::Float(if max { a.max(b) } else { a.min(b) }))
        }
        (a, b) => bail!(
            "`{}` expects two numbers, found `{}` and `{}`",
            if max { "max" } else { "min" },
            a.type_name(),
            b.type_name()
        ),
    }
}

fn log_line(args: Args, level: tracing::Level) -> Result<Value> {
    let line = args.into_vec().iter().map(ToString::to_string).join(" ");
    match level {
        tracing::Level::ERROR => tracing::error!(target: SCRIPT_LOG_TARGET, "{line}"),
        tracing::Level::WARN => tracing::warn!(target: SCRIPT_LOG_TARGET, "{line}"),
        _ => tracing::info!(target: SCRIPT_LOG_TARGET, "{line}"),
    }
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::SymbolTable;
    use pretty_assertions::assert_eq;

    fn call(package: &str, name: &str, args: Vec<Value>) -> Result<Value> {
        let table = SymbolTable::from_exports(&exports())?;
        let func = table
            .lookup(package, name)
            .and_then(Value::as_callable)
            .cloned()
            .ok_or_else(|| Error::unresolved(format!("{package}::{name}"), None))?;
        func.call(args)
    }

    #[test]
    fn string_helpers() {
        let parts = Value::list(vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(call(STRINGS, "join", vec![parts, Value::from("-")]).unwrap(), Value::from("a-1"));
        assert_eq!(call(STRINGS, "to_upper", vec![Value::from("hi")]).unwrap(), Value::from("HI"));
        assert_eq!(call(STRINGS, "parse_int", vec![Value::from(" 42 ")]).unwrap(), Value::Int(42));
        let err = call(STRINGS, "parse_int", vec![Value::from("x")]).unwrap_err();
        assert!(err.to_string().contains("cannot parse `x` as an integer"));
    }

    #[test]
    fn math_helpers_keep_integer_results() {
        assert_eq!(call(MATH, "max", vec![Value::Int(2), Value::Int(5)]).unwrap(), Value::Int(5));
        assert_eq!(call(MATH, "min", vec![Value::Int(2), Value::Float(1.5)]).unwrap(), Value::Float(1.5));
        assert_eq!(call(MATH, "abs", vec![Value::Int(-3)]).unwrap(), Value::Int(3));
        assert_eq!(call(MATH, "sqrt", vec![Value::Int(9)]).unwrap(), Value::Float(3.0));
        assert!(call(MATH, "pow", vec![Value::Int(2), Value::Int(64)]).is_err());
    }
}

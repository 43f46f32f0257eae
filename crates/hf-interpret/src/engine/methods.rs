//! Method calls.
//!
//! Calls on host objects dispatch through the method slot of the receiver's type, so a
//! script observes patches exactly like the host does. Every other receiver gets the
//! builtin methods below; the ones that mutate (`push`, `pop`, ...) write the updated
//! receiver back to the place it was read from.

use super::operators::partial_cmp;
use super::*;
use crate::error::locate;
use crate::{interp_bail, interp_ensure};
use hf_core::Args;
use hf_lang::ast::{Expr, ExprKind};
use std::cmp::Ordering;

/// Result of a builtin method: its value, and the receiver if the method changed it.
struct Outcome {
    value: Value,
    receiver: Option<Value>,
}

impl Outcome {
    fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            receiver: None,
        }
    }

    fn mutated(value: impl Into<Value>, receiver: Value) -> Self {
        Self {
            value: value.into(),
            receiver: Some(receiver),
        }
    }
}

fn is_place(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Path(path) => path.is_single(),
        ExprKind::Field { base, .. } | ExprKind::Index { base, .. } => is_place(base),
        ExprKind::Ref { expr, .. } => is_place(expr),
        _ => false,
    }
}

fn place_of(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Ref { expr, .. } => place_of(expr),
        _ => expr,
    }
}

impl<'p> Evaluator<'p> {
    pub(super) fn eval_method_call(
        &mut self,
        receiver_expr: &Expr,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Eval<Value> {
        let receiver = self.eval_expr(receiver_expr)?;
        let args = self.eval_args(args)?;

        if let Value::Host(host) = &receiver {
            let Some(slot) = host.ty.method(method) else {
                return Err(Error::MethodNotFound {
                    owner: host.ty.name().to_string(),
                    method: method.to_string(),
                    available: Some(format!("available methods: {}", host.ty.method_names().join(", "))),
                }
                .into());
            };
            let slot = slot.clone();
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(receiver);
            call_args.extend(args);
            return Ok(slot.call(call_args).map_err(|err| locate(err, span))?);
        }

        let outcome = self.builtin_method(receiver, method, args, span)?;
        if let Some(updated) = outcome.receiver {
            if is_place(receiver_expr) {
                self.assign(place_of(receiver_expr), updated)?;
            }
        }
        Ok(outcome.value)
    }

    fn builtin_method(&mut self, receiver: Value, method: &str, args: Vec<Value>, span: Span) -> Result<Outcome> {
        let args = Args::new(method, args);
        // available on every value
        match method {
            "clone" | "to_owned" | "iter" | "into_iter" | "collect" | "as_str" | "borrow" => {
                expect_args(&args, 0, span)?;
                return Ok(Outcome::value(receiver));
            }
            "to_string" => {
                expect_args(&args, 0, span)?;
                return Ok(Outcome::value(Value::string(receiver.to_string())));
            }
            _ => {}
        }
        match receiver {
            Value::Str(text) => string_method(&text, method, &args, span),
            Value::List(items) => self.list_method(items, method, &args, span),
            Value::Int(v) => int_method(v, method, &args, span),
            Value::Float(v) => float_method(v, method, &args, span),
            Value::Char(c) => char_method(c, method, &args, span),
            other => Err(no_method(&other, method, span)),
        }
    }

    fn list_method(&mut self, items: Arc<Vec<Value>>, method: &str, args: &Args, span: Span) -> Result<Outcome> {
        let outcome = match method {
            "len" => Outcome::value(items.len() as i64),
            "is_empty" => Outcome::value(items.is_empty()),
            "contains" => Outcome::value(items.contains(args.get(0)?)),
            "join" => {
                let sep = args.str(0)?;
                let joined = items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join(sep);
                Outcome::value(joined)
            }
            "push" => {
                expect_args(args, 1, span)?;
                let mut items = items;
                Arc::make_mut(&mut items).push(args.get(0)?.clone());
                Outcome::mutated(Value::Unit, Value::List(items))
            }
            "pop" => {
                let mut items = items;
                let Some(last) = Arc::make_mut(&mut items).pop() else {
                    interp_bail!(span, "`pop` on an empty list");
                };
                Outcome::mutated(last, Value::List(items))
            }
            "insert" => {
                let idx = usize::try_from(args.int(0)?).unwrap_or(usize::MAX);
                interp_ensure!(
                    idx <= items.len(),
                    span,
                    "insertion index (is {}) should be <= len (is {})",
                    args.int(0)?,
                    items.len()
                );
                let mut items = items;
                Arc::make_mut(&mut items).insert(idx, args.get(1)?.clone());
                Outcome::mutated(Value::Unit, Value::List(items))
            }
            "remove" => {
                let idx = super::operators::element_index(args.get(0)?, items.len(), span)?;
                let mut items = items;
                let removed = Arc::make_mut(&mut items).remove(idx);
                Outcome::mutated(removed, Value::List(items))
            }
            "clear" => Outcome::mutated(Value::Unit, Value::list(Vec::new())),
            "extend" => {
                let mut items = items;
                Arc::make_mut(&mut items).extend(args.list(0)?.iter().cloned());
                Outcome::mutated(Value::Unit, Value::List(items))
            }
            "reverse" => {
                let mut items = items;
                Arc::make_mut(&mut items).reverse();
                Outcome::mutated(Value::Unit, Value::List(items))
            }
            "sort" => {
                let mut sorted = items.as_ref().clone();
                let mut failed = false;
                sorted.sort_by(|a, b| {
                    partial_cmp(a, b).unwrap_or_else(|| {
                        failed = true;
                        Ordering::Equal
                    })
                });
                interp_ensure!(!failed, span, "list elements cannot be ordered");
                Outcome::mutated(Value::Unit, Value::list(sorted))
            }
            "sum" => {
                let mut total = Value::Int(0);
                for item in items.iter() {
                    total = super::operators::binary(hf_lang::ast::BinOp::Add, total, item.clone(), span)?;
                }
                Outcome::value(total)
            }
            "map" => {
                let func = args.get(0)?.clone();
                let mut mapped = Vec::with_capacity(items.len());
                for item in items.iter() {
                    mapped.push(self.call_value(&func, vec![item.clone()], span)?);
                }
                Outcome::value(mapped)
            }
            "filter" => {
                let func = args.get(0)?.clone();
                let mut kept = Vec::new();
                for item in items.iter() {
                    if self.predicate(&func, item, span)? {
                        kept.push(item.clone());
                    }
                }
                Outcome::value(kept)
            }
            "any" | "all" => {
                let func = args.get(0)?.clone();
                let want = method == "any";
                let mut result = !want;
                for item in items.iter() {
                    if self.predicate(&func, item, span)? == want {
                        result = want;
                        break;
                    }
                }
                Outcome::value(result)
            }
            "for_each" => {
                let func = args.get(0)?.clone();
                for item in items.iter() {
                    self.call_value(&func, vec![item.clone()], span)?;
                }
                Outcome::value(Value::Unit)
            }
            _ => return Err(no_method(&Value::List(items), method, span)),
        };
        Ok(outcome)
    }

    fn predicate(&mut self, func: &Value, item: &Value, span: Span) -> Result<bool> {
        match self.call_value(func, vec![item.clone()], span)? {
            Value::Bool(v) => Ok(v),
            other => interp_bail!(
                span,
                "predicate should return `bool`, found `{}`",
                other.type_name()
            ),
        }
    }
}

fn expect_args(args: &Args, count: usize, span: Span) -> Result<()> {
    let found = args.len();
    interp_ensure!(
        found == count,
        span,
        "this method takes {count} argument(s) but {found} were supplied"
    );
    Ok(())
}

fn no_method(receiver: &Value, method: &str, span: Span) -> Error {
    crate::error::eval_error(
        format!(
            "no method named `{method}` found for `{}`",
            receiver.type_name()
        ),
        span,
    )
}

fn string_method(text: &Arc<str>, method: &str, args: &Args, span: Span) -> Result<Outcome> {
    let outcome = match method {
        "len" => Outcome::value(text.len() as i64),
        "is_empty" => Outcome::value(text.is_empty()),
        "to_uppercase" => Outcome::value(text.to_uppercase()),
        "to_lowercase" => Outcome::value(text.to_lowercase()),
        "trim" => Outcome::value(text.trim()),
        "contains" => Outcome::value(text.contains(pattern(args, span)?.as_str())),
        "starts_with" => Outcome::value(text.starts_with(pattern(args, span)?.as_str())),
        "ends_with" => Outcome::value(text.ends_with(pattern(args, span)?.as_str())),
        "replace" => Outcome::value(text.replace(args.str(0)?, args.str(1)?)),
        "split" => {
            let pattern = pattern(args, span)?;
            let parts = text.split(pattern.as_str()).map(Value::from).collect::<Vec<_>>();
            Outcome::value(parts)
        }
        "chars" => Outcome::value(text.chars().map(Value::Char).collect::<Vec<_>>()),
        "repeat" => {
            let count = usize::try_from(args.int(0)?).unwrap_or(0);
            Outcome::value(text.repeat(count))
        }
        "push_str" => {
            let mut updated = String::from(text.as_ref());
            updated.push_str(args.str(0)?);
            Outcome::mutated(Value::Unit, Value::string(updated))
        }
        "push" => {
            let Value::Char(c) = args.get(0)? else {
                interp_bail!(span, "`push` expects a `char`");
            };
            let mut updated = String::from(text.as_ref());
            updated.push(*c);
            Outcome::mutated(Value::Unit, Value::string(updated))
        }
        _ => return Err(no_method(&Value::Str(text.clone()), method, span)),
    };
    Ok(outcome)
}

/// String methods take either a `&str` or a `char` pattern.
fn pattern(args: &Args, span: Span) -> Result<String> {
    match args.get(0)? {
        Value::Str(s) => Ok(s.to_string()),
        Value::Char(c) => Ok(c.to_string()),
        other => interp_bail!(span, "expected a string or char pattern, found `{}`", other.type_name()),
    }
}

fn int_method(v: i64, method: &str, args: &Args, span: Span) -> Result<Outcome> {
    let outcome = match method {
        "abs" => match v.checked_abs() {
            Some(abs) => Outcome::value(abs),
            None => interp_bail!(span, "attempt to negate with overflow"),
        },
        "pow" => {
            let exp = u32::try_from(args.int(0)?).map_err(|_| crate::error::eval_error("exponent must be a non-negative `u32`", span))?;
            match v.checked_pow(exp) {
                Some(result) => Outcome::value(result),
                None => interp_bail!(span, "attempt to multiply with overflow"),
            }
        }
        "min" => Outcome::value(v.min(args.int(0)?)),
        "max" => Outcome::value(v.max(args.int(0)?)),
        "signum" => Outcome::value(v.signum()),
        _ => return Err(no_method(&Value::Int(v), method, span)),
    };
    Ok(outcome)
}

fn float_method(v: f64, method: &str, args: &Args, span: Span) -> Result<Outcome> {
    let outcome = match method {
        "abs" => Outcome::value(v.abs()),
        "sqrt" => Outcome::value(v.sqrt()),
        "floor" => Outcome::value(v.floor()),
        "ceil" => Outcome::value(v.ceil()),
        "round" => Outcome::value(v.round()),
        "min" => Outcome::value(v.min(args.float(0)?)),
        "max" => Outcome::value(v.max(args.float(0)?)),
        "powi" => Outcome::value(v.powi(i32::try_from(args.int(0)?).unwrap_or(i32::MAX))),
        "powf" => Outcome::value(v.powf(args.float(0)?)),
        _ => return Err(no_method(&Value::Float(v), method, span)),
    };
    Ok(outcome)
}

fn char_method(c: char, method: &str, _args: &Args, span: Span) -> Result<Outcome> {
    let outcome = match method {
        "is_alphabetic" => Outcome::value(c.is_alphabetic()),
        "is_numeric" => Outcome::value(c.is_numeric()),
        "is_whitespace" => Outcome::value(c.is_whitespace()),
        "is_uppercase" => Outcome::value(c.is_uppercase()),
        "is_lowercase" => Outcome::value(c.is_lowercase()),
        "to_ascii_uppercase" => Outcome::value(Value::Char(c.to_ascii_uppercase())),
        "to_ascii_lowercase" => Outcome::value(Value::Char(c.to_ascii_lowercase())),
        _ => return Err(no_method(&Value::Char(c), method, span)),
    };
    Ok(outcome)
}

//! Unary, binary and cast operators on script values.
//!
//! Integer arithmetic is checked and fails with the messages a Rust debug build panics
//! with.

use crate::interp_bail;
use hf_core::{FloatTy, IntTy, Result, Span, Ty, Value};
use hf_lang::ast::{BinOp, UnOp};
use std::cmp::Ordering;

/// Range of values an integer type holds, clamped to the `i64` carrier.
pub(crate) fn int_bounds(ty: IntTy) -> (i64, i64) {
    match ty {
        IntTy::I8 => (i8::MIN.into(), i8::MAX.into()),
        IntTy::I16 => (i16::MIN.into(), i16::MAX.into()),
        IntTy::I32 => (i32::MIN.into(), i32::MAX.into()),
        IntTy::I64 | IntTy::Isize => (i64::MIN, i64::MAX),
        IntTy::U8 => (0, u8::MAX.into()),
        IntTy::U16 => (0, u16::MAX.into()),
        IntTy::U32 => (0, u32::MAX.into()),
        // values are stored as i64; the unsigned maximum saturates
        IntTy::U64 | IntTy::Usize => (0, i64::MAX),
    }
}

pub(crate) fn unary(op: UnOp, value: Value, span: Span) -> Result<Value> {
    match (op, value) {
        (UnOp::Deref, value) => Ok(value),
        (UnOp::Neg, Value::Int(v)) => match v.checked_neg() {
            Some(v) => Ok(Value::Int(v)),
            None => interp_bail!(span, "attempt to negate with overflow"),
        },
        (UnOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnOp::Not, Value::Int(v)) => Ok(Value::Int(!v)),
        (op, value) => {
            let symbol = if op == UnOp::Neg { "-" } else { "!" };
            interp_bail!(
                span,
                "cannot apply unary operator `{symbol}` to type `{}`",
                value.type_name()
            )
        }
    }
}

pub(crate) fn binary(op: BinOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b, span),
        (Value::Float(a), Value::Float(b)) => float_op(op, *a, *b, span),
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::string(joined))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::And | BinOp::BitAnd => Ok(Value::Bool(*a && *b)),
            BinOp::Or | BinOp::BitOr => Ok(Value::Bool(*a || *b)),
            BinOp::BitXor => Ok(Value::Bool(a ^ b)),
            _ => compare(op, &lhs, &rhs, span),
        },
        _ => compare(op, &lhs, &rhs, span),
    }
}

fn int_op(op: BinOp, a: i64, b: i64, span: Span) -> Result<Value> {
    let checked = |result: Option<i64>, what: &str| match result {
        Some(v) => Ok(Value::Int(v)),
        None => Err(crate::error::eval_error(
            format!("attempt to {what} with overflow"),
            span,
        )),
    };
    match op {
        BinOp::Add => checked(a.checked_add(b), "add"),
        BinOp::Sub => checked(a.checked_sub(b), "subtract"),
        BinOp::Mul => checked(a.checked_mul(b), "multiply"),
        BinOp::Div => {
            if b == 0 {
                interp_bail!(span, "attempt to divide by zero");
            }
            checked(a.checked_div(b), "divide")
        }
        BinOp::Rem => {
            if b == 0 {
                interp_bail!(span, "attempt to calculate the remainder with a divisor of zero");
            }
            checked(a.checked_rem(b), "calculate the remainder")
        }
        BinOp::BitAnd => Ok(Value::Int(a & b)),
        BinOp::BitOr => Ok(Value::Int(a | b)),
        BinOp::BitXor => Ok(Value::Int(a ^ b)),
        BinOp::Shl | BinOp::Shr => {
            let shift = u32::try_from(b).ok().filter(|shift| *shift < i64::BITS);
            match (op, shift) {
                (BinOp::Shl, Some(shift)) => Ok(Value::Int(a << shift)),
                (BinOp::Shr, Some(shift)) => Ok(Value::Int(a >> shift)),
                (BinOp::Shl, None) => interp_bail!(span, "attempt to shift left with overflow"),
                _ => interp_bail!(span, "attempt to shift right with overflow"),
            }
        }
        _ => compare(op, &Value::Int(a), &Value::Int(b), span),
    }
}

fn float_op(op: BinOp, a: f64, b: f64, span: Span) -> Result<Value> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        _ => return compare(op, &Value::Float(a), &Value::Float(b), span),
    };
    Ok(Value::Float(value))
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
    let result = match op {
        BinOp::Eq | BinOp::Ne => {
            if !comparable(lhs, rhs) {
                return Err(mismatch(op, lhs, rhs, span));
            }
            (lhs == rhs) == (op == BinOp::Eq)
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let Some(ordering) = partial_cmp(lhs, rhs) else {
                // NaN compares false both ways
                if matches!((lhs, rhs), (Value::Float(_), Value::Float(_))) {
                    return Ok(Value::Bool(false));
                }
                return Err(mismatch(op, lhs, rhs, span));
            };
            match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Le => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
        _ => return Err(mismatch(op, lhs, rhs, span)),
    };
    Ok(Value::Bool(result))
}

fn comparable(lhs: &Value, rhs: &Value) -> bool {
    std::mem::discriminant(lhs) == std::mem::discriminant(rhs)
}

/// Ordering of two values of the same kind; lists compare lexicographically.
pub(crate) fn partial_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Unit, Value::Unit) => Some(Ordering::Equal),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match partial_cmp(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

fn mismatch(op: BinOp, lhs: &Value, rhs: &Value, span: Span) -> hf_core::Error {
    crate::error::eval_error(
        format!(
            "cannot apply `{}` to `{}` and `{}`",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ),
        span,
    )
}

/// `value as ty`. Float to integer casts saturate and map NaN to zero; integer to integer
/// casts truncate.
pub(crate) fn cast(value: Value, ty: &Ty, span: Span) -> Result<Value> {
    let cast = match (value, ty) {
        (value, Ty::Any | Ty::Infer) => value,
        (Value::Int(v), Ty::Int(int)) => Value::Int(int.wrap(v)),
        (Value::Int(v), Ty::Float(FloatTy::F32)) => Value::Float(f64::from(v as f32)),
        (Value::Int(v), Ty::Float(FloatTy::F64)) => Value::Float(v as f64),
        (Value::Int(v), Ty::Char) => match u8::try_from(v) {
            Ok(byte) => Value::Char(char::from(byte)),
            Err(_) => interp_bail!(span, "only `u8` values can be cast as `char`, found {v}"),
        },
        (Value::Float(v), Ty::Int(int)) => {
            let (min, max) = int_bounds(*int);
            // `as` saturates and maps NaN to 0
            Value::Int((v as i64).clamp(min, max))
        }
        (Value::Float(v), Ty::Float(FloatTy::F32)) => Value::Float(f64::from(v as f32)),
        (Value::Float(v), Ty::Float(FloatTy::F64)) => Value::Float(v),
        (Value::Bool(v), Ty::Int(int)) => Value::Int(int.wrap(i64::from(v))),
        (Value::Char(v), Ty::Int(int)) => Value::Int(int.wrap(i64::from(u32::from(v)))),
        (Value::Char(v), Ty::Char) => Value::Char(v),
        (Value::Bool(v), Ty::Bool) => Value::Bool(v),
        (Value::Str(v), Ty::Str) => Value::Str(v),
        (value, ty) => interp_bail!(span, "non-primitive cast: `{}` as `{}`", value.type_name(), ty),
    };
    Ok(cast)
}

/// Position `index` in a sequence of `len` elements.
pub(crate) fn element_index(index: &Value, len: usize, span: Span) -> Result<usize> {
    let Value::Int(raw) = index else {
        interp_bail!(
            span,
            "the type `[T]` cannot be indexed by `{}`",
            index.type_name()
        );
    };
    match usize::try_from(*raw) {
        Ok(idx) if idx < len => Ok(idx),
        _ => interp_bail!(span, "index out of bounds: the len is {len} but the index is {raw}"),
    }
}

pub(crate) fn index(base: &Value, index: &Value, span: Span) -> Result<Value> {
    match base {
        Value::List(items) => {
            let idx = element_index(index, items.len(), span)?;
            Ok(items[idx].clone())
        }
        Value::Str(_) => interp_bail!(
            span,
            "the type `str` cannot be indexed by `{}`; use a range or `.chars()`",
            index.type_name()
        ),
        other => interp_bail!(span, "cannot index into a value of type `{}`", other.type_name()),
    }
}

/// `base[start..end]` for lists and strings; string bounds are byte offsets.
pub(crate) fn slice(base: &Value, start: Option<i64>, end: Option<i64>, inclusive: bool, span: Span) -> Result<Value> {
    match base {
        Value::List(items) => {
            let (start, end) = slice_bounds(items.len(), start, end, inclusive, span)?;
            Ok(Value::list(items[start..end].to_vec()))
        }
        Value::Str(s) => {
            let (start, end) = slice_bounds(s.len(), start, end, inclusive, span)?;
            match s.get(start..end) {
                Some(part) => Ok(Value::from(part)),
                None => interp_bail!(span, "byte range {start}..{end} is not on a char boundary"),
            }
        }
        other => interp_bail!(span, "cannot slice a value of type `{}`", other.type_name()),
    }
}

fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>, inclusive: bool, span: Span) -> Result<(usize, usize)> {
    let to_usize = |bound: i64| {
        usize::try_from(bound)
            .map_err(|_| crate::error::eval_error(format!("slice index {bound} is negative"), span))
    };
    let start = start.map(to_usize).transpose()?.unwrap_or(0);
    let end = match end.map(to_usize).transpose()? {
        Some(end) if inclusive => end + 1,
        Some(end) => end,
        None => len,
    };
    if start > end {
        interp_bail!(span, "slice index starts at {start} but ends at {end}");
    }
    if end > len {
        interp_bail!(span, "range end index {end} out of range for slice of length {len}");
    }
    Ok((start, end))
}

use super::UNSAFE_SET;
use hf_core::{bail, Args, Exports, IntTy, NativeFunction, Result, Ty, Value};
use std::sync::Arc;

const MEM: &str = "unsafe::mem";

/// Address of the shared allocation behind a composite value.
fn address(value: &Value) -> Option<usize> {
    let addr = match value {
        Value::Str(s) => Arc::as_ptr(s) as *const u8 as usize,
        Value::List(items) => Arc::as_ptr(items) as usize,
        Value::Struct(s) => Arc::as_ptr(s) as usize,
        Value::Func(f) => Arc::as_ptr(f) as *const u8 as usize,
        Value::Host(host) => Arc::as_ptr(&host.object) as *const u8 as usize,
        _ => return None,
    };
    Some(addr)
}

/// Shallow size in bytes, counting the inline value plus its direct heap payload.
fn size_of_val(value: &Value) -> usize {
    let inline = std::mem::size_of::<Value>();
    match value {
        Value::Str(s) => inline + s.len(),
        Value::List(items) => inline + items.iter().map(size_of_val).sum::<usize>(),
        Value::Struct(s) => inline + s.fields.iter().map(size_of_val).sum::<usize>(),
        _ => inline,
    }
}

fn addr_of(args: Args) -> Result<Value> {
    let value = args.get(0)?;
    match address(value) {
        Some(addr) => Ok(Value::Int(addr as i64)),
        None => bail!("`addr_of` needs a heap value, `{}` is stored inline", value.type_name()),
    }
}

pub(super) fn exports() -> Exports {
    Exports::new(UNSAFE_SET)
        .with_function(MEM, NativeFunction::new("addr_of", vec![Ty::Any], Ty::Int(IntTy::Usize), addr_of))
        .with_function(
            MEM,
            NativeFunction::new("size_of_val", vec![Ty::Any], Ty::Int(IntTy::Usize), |args| {
                Ok(Value::Int(size_of_val(args.get(0)?) as i64))
            }),
        )
        .with_function(
            MEM,
            NativeFunction::new("same", vec![Ty::Any, Ty::Any], Ty::Bool, |args| {
                let (a, b) = (args.get(0)?, args.get(1)?);
                let same = match (address(a), address(b)) {
                    (Some(a), Some(b)) => a == b,
                    _ => a == b,
                };
                Ok(Value::Bool(same))
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_their_allocation() {
        let list = Value::list(vec![Value::Int(1)]);
        let copy = list.clone();
        assert_eq!(address(&list), address(&copy));
        assert_ne!(address(&list), address(&Value::list(vec![Value::Int(1)])));
        assert_eq!(address(&Value::Int(3)), None);
    }

    #[test]
    fn sizes_grow_with_contents() {
        let short = size_of_val(&Value::from("a"));
        let long = size_of_val(&Value::from("a longer string"));
        assert!(long > short);
    }
}

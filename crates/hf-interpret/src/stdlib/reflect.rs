use super::UNRESTRICTED_SET;
use hf_core::{bail, Args, Error, Exports, MethodSlot, NativeFunction, Result, Ty, TypeDescriptor, TypeToken, Value};
use std::sync::Arc;

const REFLECT: &str = "unrestricted::reflect";

fn type_of(value: &Value) -> TypeToken {
    match value {
        Value::Struct(s) => TypeToken::Struct(s.schema.clone()),
        Value::Host(host) => TypeToken::Host(host.ty.clone()),
        Value::Type(_) => TypeToken::Builtin(Ty::Type),
        Value::Func(f) => match f.signature() {
            Some(sig) => TypeToken::Builtin(Ty::func(sig.params.clone(), sig.ret.clone())),
            None => TypeToken::Builtin(Ty::Any),
        },
        Value::List(_) => TypeToken::Builtin(Ty::list(Ty::Any)),
        Value::Unit => TypeToken::Builtin(Ty::Unit),
        Value::Bool(_) => TypeToken::Builtin(Ty::Bool),
        Value::Int(_) => TypeToken::Builtin(Ty::Int(hf_core::IntTy::I64)),
        Value::Float(_) => TypeToken::Builtin(Ty::Float(hf_core::FloatTy::F64)),
        Value::Char(_) => TypeToken::Builtin(Ty::Char),
        Value::Str(_) => TypeToken::Builtin(Ty::Str),
    }
}

fn host_type(args: &Args, idx: usize) -> Result<Arc<TypeDescriptor>> {
    let token = args.ty(idx)?;
    match token.as_host() {
        Some(desc) => Ok(desc.clone()),
        None => bail!("`{}` is not a host type and has no patchable methods", token.name()),
    }
}

/// Look a method up, listing the alternatives when it is missing.
fn method_slot(desc: &TypeDescriptor, method: &str) -> Result<Arc<MethodSlot>> {
    desc.method(method).cloned().ok_or_else(|| Error::MethodNotFound {
        owner: desc.name().to_string(),
        method: method.to_string(),
        available: Some(format!("available methods: {}", desc.method_names().join(", "))),
    })
}

pub(super) fn exports() -> Exports {
    Exports::new(UNRESTRICTED_SET)
        .with_function(
            REFLECT,
            NativeFunction::new("type_of", vec![Ty::Any], Ty::Type, |args| {
                Ok(Value::Type(type_of(args.get(0)?)))
            }),
        )
        .with_function(
            REFLECT,
            NativeFunction::new("type_name", vec![Ty::Any], Ty::Str, |args| {
                Ok(Value::string(args.get(0)?.type_name()))
            }),
        )
        .with_function(
            REFLECT,
            NativeFunction::new("methods", vec![Ty::Type], Ty::list(Ty::Str), |args| {
                let desc = host_type(&args, 0)?;
                Ok(Value::list(desc.method_names().into_iter().map(Value::from).collect()))
            }),
        )
        .with_function(
            REFLECT,
            NativeFunction::new("signature", vec![Ty::Type, Ty::Str], Ty::Str, |args| {
                let desc = host_type(&args, 0)?;
                let slot = method_slot(&desc, args.str(1)?)?;
                Ok(Value::string(slot.signature().to_string()))
            }),
        )
        .with_function(
            REFLECT,
            NativeFunction::new(
                "call_method",
                vec![Ty::Type, Ty::Str, Ty::list(Ty::Any)],
                Ty::Any,
                |args| {
                    let desc = host_type(&args, 0)?;
                    let slot = method_slot(&desc, args.str(1)?)?;
                    slot.call(args.list(2)?.to_vec())
                },
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Counter(i64);

    fn counter_type() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Counter>("demo::Counter")
            .method("get", vec![], Ty::Int(hf_core::IntTy::I64), |counter, _| Ok(Value::Int(counter.0)))
            .build()
    }

    #[test]
    fn builtin_types_are_reported() {
        assert_eq!(type_of(&Value::Int(1)).name(), "i64");
        assert_eq!(type_of(&Value::from("s")).name(), "String");
    }

    #[test]
    fn missing_methods_list_the_alternatives() {
        let desc = counter_type();
        let err = method_slot(&desc, "set").unwrap_err();
        let Error::MethodNotFound { available, .. } = err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(available.as_deref(), Some("available methods: get"));
    }

    #[test]
    fn call_method_goes_through_the_slot() {
        let desc = counter_type();
        let counter = desc.instance(Arc::new(Counter(7))).unwrap();
        let slot = method_slot(&desc, "get").unwrap();
        assert_eq!(slot.call(vec![counter]).unwrap(), Value::Int(7));
    }
}

//! The `hotfix` symbol set and extraction of the patch descriptor a script evaluates to.

use crate::resolve::resolve;
use hf_core::{
    Args, Callable, Error, Exports, NativeFunction, Result, StructSchema, SymbolTable, Ty, TypeDescriptor,
    TypeToken, Value,
};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

pub const HOTFIX_SET: &str = "hotfix";
const PACKAGE: &str = "hotfix";

static FUNC_PATCH: Lazy<Arc<StructSchema>> = Lazy::new(|| {
    Arc::new(StructSchema::new(
        "hotfix::FuncPatch",
        vec![
            ("target".to_string(), Ty::Type),
            ("method".to_string(), Ty::Str),
            ("replacement".to_string(), Ty::Any),
        ],
    ))
});

static HOTFIX_SYMBOLS: Lazy<Result<SymbolTable>> = Lazy::new(|| SymbolTable::from_exports(&hotfix_exports()));

/// Exports `hotfix::FuncPatch`, `hotfix::original` and `hotfix::is_patched`.
pub fn hotfix_exports() -> Exports {
    Exports::new(HOTFIX_SET)
        .with_struct(PACKAGE, FUNC_PATCH.clone())
        .with_function(
            PACKAGE,
            NativeFunction::new("original", vec![Ty::Type, Ty::Str], Ty::Any, |args| {
                let slot = slot_arg(&args)?;
                Ok(Value::Func(slot.original()))
            }),
        )
        .with_function(
            PACKAGE,
            NativeFunction::new("is_patched", vec![Ty::Type, Ty::Str], Ty::Bool, |args| {
                Ok(Value::Bool(slot_arg(&args)?.is_patched()))
            }),
        )
}

/// The `hotfix` set as a table, built once.
pub fn hotfix_symbols() -> Result<SymbolTable> {
    match &*HOTFIX_SYMBOLS {
        Ok(table) => Ok(table.clone()),
        Err(err) => Err(Error::SymbolRegistry(err.to_string())),
    }
}

fn slot_arg(args: &Args) -> Result<Arc<hf_core::MethodSlot>> {
    let token = args.ty(0)?;
    let Some(owner) = token.as_host() else {
        return Err(Error::eval(format!(
            "`{}` is not a host type and has no patchable methods",
            token.name()
        )));
    };
    resolve(owner, args.str(1)?)
}

/// What a patch script asked for: replace `owner::method` with `replacement`.
#[derive(Clone)]
pub struct PatchDescriptor {
    pub owner: Arc<TypeDescriptor>,
    pub method: String,
    pub replacement: Callable,
}

impl PatchDescriptor {
    pub fn target(&self) -> String {
        format!("{}::{}", self.owner.name(), self.method)
    }
}

impl fmt::Debug for PatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signature = match self.replacement.signature() {
            Some(sig) => sig.to_string(),
            None => "fn(..)".to_string(),
        };
        f.debug_struct("PatchDescriptor")
            .field("owner", &self.owner.name())
            .field("method", &self.method)
            .field("replacement", &format_args!("{} {}", self.replacement.name(), signature))
            .finish()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidDescriptor(message.into())
}

/// Type-assert a script result into a [`PatchDescriptor`]. Nothing is coerced.
pub fn extract(value: Value) -> Result<PatchDescriptor> {
    let Value::Struct(patch) = &value else {
        return Err(invalid(format!(
            "expected `hotfix::FuncPatch`, found `{}`",
            value.type_name()
        )));
    };
    if !Arc::ptr_eq(&patch.schema, &FUNC_PATCH) {
        return Err(invalid(format!(
            "expected `hotfix::FuncPatch`, found `{}`",
            patch.schema.name
        )));
    }

    let owner = match patch.get("target") {
        Some(Value::Type(TypeToken::Host(owner))) => owner.clone(),
        Some(other) => {
            return Err(invalid(format!(
                "`target` must name a host type, found {other:?}"
            )))
        }
        None => return Err(invalid("`target` is missing")),
    };
    let method = match patch.get("method") {
        Some(Value::Str(method)) if !method.is_empty() => method.to_string(),
        Some(other) => {
            return Err(invalid(format!(
                "`method` must be a non-empty string, found {other:?}"
            )))
        }
        None => return Err(invalid("`method` is missing")),
    };
    let replacement = match patch.get("replacement") {
        Some(Value::Func(replacement)) => replacement.clone(),
        Some(other) => {
            return Err(invalid(format!(
                "`replacement` must be callable, found `{}`",
                other.type_name()
            )))
        }
        None => return Err(invalid("`replacement` is missing")),
    };
    Ok(PatchDescriptor {
        owner,
        method,
        replacement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::{ErrorKind, StructValue};

    struct Svc;

    fn svc_type() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Svc>("demo::Svc")
            .method("ping", vec![], Ty::Str, |_, _| Ok(Value::from("pong")))
            .build()
    }

    fn func_patch(target: Value, method: &str, replacement: Value) -> Value {
        Value::Struct(Arc::new(StructValue {
            schema: FUNC_PATCH.clone(),
            fields: vec![target, Value::from(method), replacement],
        }))
    }

    fn replacement() -> Value {
        NativeFunction::new("pong", vec![Ty::named("demo::Svc")], Ty::Str, |_| Ok(Value::from("PONG"))).into_value()
    }

    #[test]
    fn extracts_well_formed_patches() {
        let ty = svc_type();
        let patch = func_patch(Value::Type(TypeToken::Host(ty.clone())), "ping", replacement());
        let descriptor = extract(patch).unwrap();
        assert!(Arc::ptr_eq(&descriptor.owner, &ty));
        assert_eq!(descriptor.target(), "demo::Svc::ping");
    }

    #[test]
    fn rejects_everything_else() {
        let ty = Value::Type(TypeToken::Host(svc_type()));
        let cases = [
            Value::Int(1),
            func_patch(Value::Type(TypeToken::Builtin(Ty::Str)), "ping", replacement()),
            func_patch(ty.clone(), "", replacement()),
            func_patch(ty.clone(), "ping", Value::from("not callable")),
        ];
        for case in cases {
            let err = extract(case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDescriptor, "{err}");
        }

        let lookalike = Arc::new(StructSchema::new("FuncPatch", FUNC_PATCH.fields.clone()));
        let value = Value::Struct(Arc::new(StructValue {
            schema: lookalike,
            fields: vec![ty, Value::from("ping"), replacement()],
        }));
        assert_eq!(extract(value).unwrap_err().kind(), ErrorKind::InvalidDescriptor);
    }

    #[test]
    fn original_and_is_patched_see_the_slot() {
        let ty = svc_type();
        let table = hotfix_symbols().unwrap();
        let Some(Value::Func(is_patched)) = table.lookup("hotfix", "is_patched") else {
            panic!("missing hotfix::is_patched");
        };
        let args = vec![Value::Type(TypeToken::Host(ty)), Value::from("ping")];
        assert_eq!(is_patched.call(args.clone()).unwrap(), Value::Bool(false));

        let Some(Value::Func(original)) = table.lookup("hotfix", "original") else {
            panic!("missing hotfix::original");
        };
        assert!(matches!(original.call(args).unwrap(), Value::Func(_)));
    }
}

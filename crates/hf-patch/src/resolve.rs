use hf_core::{Error, MethodSlot, Result, TypeDescriptor};
use itertools::Itertools;
use std::sync::Arc;

/// Find the slot of `method` on `owner`. Host types have no inherited methods, so the
/// lookup is a single table probe.
pub fn resolve(owner: &TypeDescriptor, method: &str) -> Result<Arc<MethodSlot>> {
    owner.method(method).cloned().ok_or_else(|| {
        let names = owner.method_names();
        let available = if names.is_empty() {
            format!("`{}` has no patchable methods", owner.name())
        } else {
            format!("available methods: {}", names.iter().join(", "))
        };
        Error::MethodNotFound {
            owner: owner.name().to_string(),
            method: method.to_string(),
            available: Some(available),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::{ErrorKind, Ty, Value};
    use pretty_assertions::assert_eq;

    struct Svc;

    #[test]
    fn missing_methods_name_the_alternatives() {
        let ty = TypeDescriptor::builder::<Svc>("demo::Svc")
            .method("index", vec![], Ty::Str, |_, _| Ok(Value::from("i")))
            .method("hello", vec![], Ty::Str, |_, _| Ok(Value::from("h")))
            .build();
        assert_eq!(resolve(&ty, "index").unwrap().qualified_name(), "demo::Svc::index");

        let err = resolve(&ty, "Index").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotFound);
        let hf_core::Error::MethodNotFound { available, .. } = err else {
            unreachable!()
        };
        assert_eq!(available.as_deref(), Some("available methods: hello, index"));
    }

    #[test]
    fn empty_tables_say_so() {
        let ty = TypeDescriptor::builder::<Svc>("demo::Bare").build();
        let err = resolve(&ty, "index").unwrap_err();
        assert!(format!("{err:?}").contains("has no patchable methods"), "{err:?}");
    }
}

use crate::error::{Error, Result};
use crate::method::TypeDescriptor;
use crate::ty::{Signature, Ty};
use itertools::Itertools;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Anything a script or the host can call: native host functions, script functions and
/// closures, and method dispatchers.
pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    /// Declared signature, `None` for variadic natives.
    fn signature(&self) -> Option<&Signature>;

    fn call(&self, args: Vec<Value>) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

pub type Callable = Arc<dyn Function>;

type NativeFn = Box<dyn Fn(Args) -> Result<Value> + Send + Sync>;

/// Host function exported to scripts.
pub struct NativeFunction {
    name: String,
    signature: Option<Signature>,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, params: Vec<Ty>, ret: Ty, func: F) -> Self
    where
        F: Fn(Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Some(Signature::new(params, ret)),
            func: Box::new(func),
        }
    }

    /// A native that accepts any number of arguments and checks them itself.
    pub fn variadic<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: None,
            func: Box::new(func),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Func(Arc::new(self))
    }
}

impl Function for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    fn call(&self, args: Vec<Value>) -> Result<Value> {
        if let Some(sig) = &self.signature {
            if sig.arity() != args.len() {
                bail!(
                    "`{}` takes {} argument(s) but {} were supplied",
                    self.name,
                    sig.arity(),
                    args.len()
                );
            }
            for (idx, (param, arg)) in sig.params.iter().zip(args.iter()).enumerate() {
                if !arg.conforms_to(param) {
                    bail!(
                        "`{}` expects `{}` for argument {}, found `{}`",
                        self.name,
                        param,
                        idx + 1,
                        arg.type_name()
                    );
                }
            }
        }
        (self.func)(Args::new(self.name.clone(), args))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Arguments of a native call with typed accessors that produce uniform error messages.
#[derive(Debug, Clone)]
pub struct Args {
    name: String,
    values: Vec<Value>,
}

impl Args {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<&Value> {
        self.values.get(idx).ok_or_else(|| {
            Error::eval(format!(
                "`{}` is missing argument {} of {}",
                self.name,
                idx + 1,
                self.values.len().max(idx + 1)
            ))
        })
    }

    fn mismatch(&self, idx: usize, expected: &str, found: &Value) -> Error {
        Error::eval(format!(
            "`{}` expects {} for argument {}, found `{}`",
            self.name,
            expected,
            idx + 1,
            found.type_name()
        ))
    }

    pub fn int(&self, idx: usize) -> Result<i64> {
        match self.get(idx)? {
            Value::Int(v) => Ok(*v),
            other => Err(self.mismatch(idx, "an integer", other)),
        }
    }

    /// Floats accept integers as well.
    pub fn float(&self, idx: usize) -> Result<f64> {
        match self.get(idx)? {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(self.mismatch(idx, "a number", other)),
        }
    }

    pub fn bool(&self, idx: usize) -> Result<bool> {
        match self.get(idx)? {
            Value::Bool(v) => Ok(*v),
            other => Err(self.mismatch(idx, "a bool", other)),
        }
    }

    pub fn str(&self, idx: usize) -> Result<&str> {
        match self.get(idx)? {
            Value::Str(v) => Ok(v.as_ref()),
            other => Err(self.mismatch(idx, "a string", other)),
        }
    }

    pub fn list(&self, idx: usize) -> Result<&[Value]> {
        match self.get(idx)? {
            Value::List(v) => Ok(v.as_slice()),
            other => Err(self.mismatch(idx, "a list", other)),
        }
    }

    pub fn callable(&self, idx: usize) -> Result<Callable> {
        match self.get(idx)? {
            Value::Func(f) => Ok(f.clone()),
            other => Err(self.mismatch(idx, "a function", other)),
        }
    }

    pub fn ty(&self, idx: usize) -> Result<&TypeToken> {
        match self.get(idx)? {
            Value::Type(token) => Ok(token),
            other => Err(self.mismatch(idx, "a type", other)),
        }
    }

    /// Host object of Rust type `T`.
    pub fn host<T: Any + Send + Sync>(&self, idx: usize) -> Result<Arc<T>> {
        let value = self.get(idx)?;
        match value {
            Value::Host(host) => host.downcast::<T>().ok_or_else(|| {
                Error::eval(format!(
                    "`{}` received a `{}` host object of the wrong Rust type",
                    self.name,
                    host.ty.name()
                ))
            }),
            other => Err(self.mismatch(idx, "a host object", other)),
        }
    }

    /// Drop the first `n` arguments.
    pub fn skip(mut self, n: usize) -> Args {
        let n = n.min(self.values.len());
        self.values.drain(..n);
        self
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

/// Runtime value shared by scripts and the host.
///
/// Composite values are reference counted and copied on write, so assignment has value
/// semantics.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Struct(Arc<StructValue>),
    Func(Callable),
    Type(TypeToken),
    Host(HostValue),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Arc::from(s.into()))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::List(Arc::new(values))
    }

    pub fn func(f: impl Function + 'static) -> Value {
        Value::Func(Arc::new(f))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "i64".to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::List(_) => "Vec".to_string(),
            Value::Struct(s) => s.schema.name.clone(),
            Value::Func(f) => match f.signature() {
                Some(sig) => sig.to_string(),
                None => "fn(..)".to_string(),
            },
            Value::Type(_) => "type".to_string(),
            Value::Host(host) => host.ty.name().to_string(),
        }
    }

    /// Whether this value may be bound where `ty` is declared.
    pub fn conforms_to(&self, ty: &Ty) -> bool {
        match (ty, self) {
            (Ty::Any | Ty::Infer, _) => true,
            (Ty::Unit, Value::Unit)
            | (Ty::Bool, Value::Bool(_))
            | (Ty::Char, Value::Char(_))
            | (Ty::Str, Value::Str(_))
            | (Ty::Int(_), Value::Int(_))
            | (Ty::Float(_), Value::Float(_))
            | (Ty::Type, Value::Type(_)) => true,
            (Ty::List(elem), Value::List(items)) => items.iter().all(|item| item.conforms_to(elem)),
            (Ty::Fn(sig), Value::Func(f)) => match f.signature() {
                Some(found) => sig.compatible_with(found),
                None => true,
            },
            (Ty::Named(name), Value::Struct(s)) => &s.schema.name == name,
            (Ty::Named(name), Value::Host(host)) => host.ty.name() == name,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Display rendering, without quotes around strings.
    pub fn into_string(self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => {
                Arc::ptr_eq(&a.schema, &b.schema) && a.fields == b.fields
            }
            (Value::Func(a), Value::Func(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => {
                Arc::ptr_eq(&a.ty, &b.ty) && std::ptr::addr_eq(Arc::as_ptr(&a.object), Arc::as_ptr(&b.object))
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::string(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::list(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::Str(v) => write!(f, "{:?}", v.as_ref()),
            Value::List(items) => write!(f, "[{}]", items.iter().map(|v| format!("{v:?}")).join(", ")),
            Value::Struct(s) => {
                let fields = s
                    .schema
                    .fields
                    .iter()
                    .zip(s.fields.iter())
                    .map(|((name, _), value)| format!("{name}: {value:?}"))
                    .join(", ");
                if fields.is_empty() {
                    write!(f, "{}", s.schema.name)
                } else {
                    write!(f, "{} {{ {} }}", s.schema.name, fields)
                }
            }
            Value::Func(func) => write!(f, "<fn {}>", func.name()),
            Value::Type(token) => write!(f, "{}", token.name()),
            Value::Host(host) => write!(f, "<{}>", host.ty.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Layout of a script-declared struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub name: String,
    pub fields: Vec<(String, Ty)>,
}

impl StructSchema {
    pub fn new(name: impl Into<String>, fields: Vec<(String, Ty)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }
}

#[derive(Clone, PartialEq)]
pub struct StructValue {
    pub schema: Arc<StructSchema>,
    /// In schema order.
    pub fields: Vec<Value>,
}

impl StructValue {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .field_index(name)
            .and_then(|idx| self.fields.get(idx))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let idx = self.schema.field_index(name)?;
        self.fields.get_mut(idx)
    }
}

/// The value of a type path: a host type, a script struct or a builtin.
#[derive(Clone)]
pub enum TypeToken {
    Host(Arc<TypeDescriptor>),
    Struct(Arc<StructSchema>),
    Builtin(Ty),
}

impl TypeToken {
    pub fn name(&self) -> String {
        match self {
            TypeToken::Host(desc) => desc.name().to_string(),
            TypeToken::Struct(schema) => schema.name.clone(),
            TypeToken::Builtin(ty) => ty.to_string(),
        }
    }

    pub fn as_ty(&self) -> Ty {
        match self {
            TypeToken::Host(desc) => Ty::named(desc.name()),
            TypeToken::Struct(schema) => Ty::named(schema.name.clone()),
            TypeToken::Builtin(ty) => ty.clone(),
        }
    }

    pub fn as_host(&self) -> Option<&Arc<TypeDescriptor>> {
        match self {
            TypeToken::Host(desc) => Some(desc),
            _ => None,
        }
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeToken::Host(a), TypeToken::Host(b)) => Arc::ptr_eq(a, b),
            (TypeToken::Struct(a), TypeToken::Struct(b)) => Arc::ptr_eq(a, b),
            (TypeToken::Builtin(a), TypeToken::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken({})", self.name())
    }
}

/// Host object handed to scripts together with the descriptor of its type.
#[derive(Clone)]
pub struct HostValue {
    pub ty: Arc<TypeDescriptor>,
    pub object: Arc<dyn Any + Send + Sync>,
}

impl HostValue {
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostValue({})", self.ty.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::IntTy;

    #[test]
    fn debug_and_display_follow_rust_formatting() {
        let list = Value::list(vec![Value::from("a"), Value::Int(2), Value::Float(1.0)]);
        assert_eq!(format!("{list:?}"), r#"["a", 2, 1.0]"#);
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");

        let schema = Arc::new(StructSchema::new(
            "Point",
            vec![("x".into(), Ty::Int(IntTy::I64)), ("y".into(), Ty::Int(IntTy::I64))],
        ));
        let point = Value::Struct(Arc::new(StructValue {
            schema,
            fields: vec![Value::Int(1), Value::Int(-2)],
        }));
        assert_eq!(format!("{point:?}"), "Point { x: 1, y: -2 }");
    }

    #[test]
    fn native_calls_check_arity_and_types() {
        let add = NativeFunction::new(
            "add",
            vec![Ty::Int(IntTy::I64), Ty::Int(IntTy::I64)],
            Ty::Int(IntTy::I64),
            |args| Ok(Value::Int(args.int(0)? + args.int(1)?)),
        );
        assert_eq!(add.call(vec![Value::Int(2), Value::Int(3)]).ok(), Some(Value::Int(5)));

        let err = add.call(vec![Value::Int(2)]).unwrap_err();
        assert!(err.to_string().contains("takes 2 argument(s)"));

        let err = add.call(vec![Value::Int(2), Value::from("x")]).unwrap_err();
        assert!(err.to_string().contains("expects `i64` for argument 2"));
    }

    #[test]
    fn list_conformance_checks_elements() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(list.conforms_to(&Ty::list(Ty::Int(IntTy::I32))));
        assert!(!list.conforms_to(&Ty::list(Ty::Str)));
        assert!(list.conforms_to(&Ty::Infer));
    }
}

use itertools::Itertools;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
}

impl IntTy {
    pub const ALL: [IntTy; 10] = [
        IntTy::I8,
        IntTy::I16,
        IntTy::I32,
        IntTy::I64,
        IntTy::Isize,
        IntTy::U8,
        IntTy::U16,
        IntTy::U32,
        IntTy::U64,
        IntTy::Usize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntTy::I8 => "i8",
            IntTy::I16 => "i16",
            IntTy::I32 => "i32",
            IntTy::I64 => "i64",
            IntTy::Isize => "isize",
            IntTy::U8 => "u8",
            IntTy::U16 => "u16",
            IntTy::U32 => "u32",
            IntTy::U64 => "u64",
            IntTy::Usize => "usize",
        }
    }

    pub fn from_name(name: &str) -> Option<IntTy> {
        IntTy::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// Truncate `value` to this width, the way an `as` cast does.
    ///
    /// Values are carried as `i64`, so `u64`/`usize` keep their bit pattern.
    pub fn wrap(self, value: i64) -> i64 {
        match self {
            IntTy::I8 => value as i8 as i64,
            IntTy::I16 => value as i16 as i64,
            IntTy::I32 => value as i32 as i64,
            IntTy::I64 | IntTy::Isize => value,
            IntTy::U8 => value as u8 as i64,
            IntTy::U16 => value as u16 as i64,
            IntTy::U32 => value as u32 as i64,
            IntTy::U64 | IntTy::Usize => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatTy {
    F32,
    F64,
}

impl FloatTy {
    pub fn name(self) -> &'static str {
        match self {
            FloatTy::F32 => "f32",
            FloatTy::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<FloatTy> {
        match name {
            "f32" => Some(FloatTy::F32),
            "f64" => Some(FloatTy::F64),
            _ => None,
        }
    }
}

/// Structural type used in signatures and runtime conformance checks.
///
/// References are erased: `&T` and `&mut T` are represented as `T`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Unit,
    Bool,
    Char,
    Str,
    Int(IntTy),
    Float(FloatTy),
    List(Box<Ty>),
    Fn(Box<Signature>),
    /// Host type or script struct, by qualified name.
    Named(String),
    /// A type token (the value of a type path such as `HttpSvc`).
    Type,
    /// Accepts any value. Used by native functions with dynamic parameters.
    Any,
    /// `_`: not declared. Matches anything at runtime but never matches in a signature check.
    Infer,
}

impl Ty {
    pub fn named(name: impl Into<String>) -> Ty {
        Ty::Named(name.into())
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn func(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fn(Box::new(Signature::new(params, ret)))
    }

    /// Builtin type for a primitive name such as `i64`, `String` or `bool`.
    pub fn primitive(name: &str) -> Option<Ty> {
        if let Some(int) = IntTy::from_name(name) {
            return Some(Ty::Int(int));
        }
        if let Some(float) = FloatTy::from_name(name) {
            return Some(Ty::Float(float));
        }
        match name {
            "bool" => Some(Ty::Bool),
            "char" => Some(Ty::Char),
            "str" | "String" => Some(Ty::Str),
            _ => None,
        }
    }

    /// Loose compatibility used when checking values against declared types at runtime.
    pub fn accepts(&self, other: &Ty) -> bool {
        match (self, other) {
            (Ty::Any, _) | (_, Ty::Any) | (Ty::Infer, _) | (_, Ty::Infer) => true,
            (Ty::List(a), Ty::List(b)) => a.accepts(b),
            (Ty::Fn(a), Ty::Fn(b)) => a.compatible_with(b),
            _ => self == other,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unit => f.write_str("()"),
            Ty::Bool => f.write_str("bool"),
            Ty::Char => f.write_str("char"),
            Ty::Str => f.write_str("String"),
            Ty::Int(int) => f.write_str(int.name()),
            Ty::Float(float) => f.write_str(float.name()),
            Ty::List(elem) => write!(f, "Vec<{elem}>"),
            Ty::Fn(sig) => write!(f, "{sig}"),
            Ty::Named(name) => f.write_str(name),
            Ty::Type => f.write_str("type"),
            Ty::Any => f.write_str("any"),
            Ty::Infer => f.write_str("_"),
        }
    }
}

/// Parameter and return types of a callable. For methods the receiver is the first parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl Signature {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        Self { params, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn receiver(&self) -> Option<&Ty> {
        self.params.first()
    }

    /// Whether any part of the signature was left undeclared.
    pub fn has_holes(&self) -> bool {
        fn hole(ty: &Ty) -> bool {
            match ty {
                Ty::Infer => true,
                Ty::List(elem) => hole(elem),
                Ty::Fn(sig) => sig.has_holes(),
                _ => false,
            }
        }
        self.params.iter().any(hole) || hole(&self.ret)
    }

    /// Runtime conformance: same arity and pairwise [`Ty::accepts`].
    pub fn compatible_with(&self, other: &Signature) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.accepts(b))
            && self.ret.accepts(&other.ret)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({})", self.params.iter().join(", "))?;
        if self.ret != Ty::Unit {
            write!(f, " -> {}", self.ret)?;
        }
        Ok(())
    }
}

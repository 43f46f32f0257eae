//! Symbol sets exported to scripts.
//!
//! An [`Exports`] set maps package paths (`handler`, `net::http`) to identifiers. A
//! [`SymbolTable`] is the immutable union of several sets; it is built once, shared
//! behind an `Arc` and never mutated afterwards.

use crate::error::{Error, Result};
use crate::method::TypeDescriptor;
use crate::value::{NativeFunction, StructSchema, TypeToken, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const RESERVED: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "false", "fn", "for", "if", "in",
    "let", "loop", "match", "mod", "mut", "pub", "return", "self", "Self", "static", "struct",
    "super", "true", "use", "while",
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && name != "_"
        && !RESERVED.contains(&name)
}

fn is_package_path(path: &str) -> bool {
    path.split("::").all(is_identifier)
}

/// One named set of exported symbols.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    name: String,
    packages: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Exports {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Later inserts of the same identifier replace earlier ones within this set.
    pub fn insert(&mut self, package: &str, ident: &str, value: Value) -> &mut Self {
        self.packages
            .entry(package.to_string())
            .or_default()
            .insert(ident.to_string(), value);
        self
    }

    pub fn with(mut self, package: &str, ident: &str, value: Value) -> Self {
        self.insert(package, ident, value);
        self
    }

    /// Export a native function under its own name.
    pub fn with_function(self, package: &str, func: NativeFunction) -> Self {
        let ident = crate::value::Function::name(&func).to_string();
        self.with(package, &ident, func.into_value())
    }

    /// Export a host type under the package part of its qualified name.
    pub fn with_type(self, ty: &Arc<TypeDescriptor>) -> Self {
        let (package, ident) = ty.name().rsplit_once("::").unwrap_or(("", ty.name()));
        let (package, ident) = (package.to_string(), ident.to_string());
        self.with(&package, &ident, Value::Type(TypeToken::Host(ty.clone())))
    }

    /// Export a struct type that scripts may construct.
    pub fn with_struct(self, package: &str, schema: Arc<StructSchema>) -> Self {
        let ident = schema
            .name
            .rsplit("::")
            .next()
            .unwrap_or(&schema.name)
            .to_string();
        self.with(package, &ident, Value::Type(TypeToken::Struct(schema)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.packages.iter().flat_map(|(package, idents)| {
            idents
                .iter()
                .map(move |(ident, value)| (package.as_str(), ident.as_str(), value))
        })
    }

    pub fn validate(&self) -> Result<()> {
        for (package, idents) in &self.packages {
            if !is_package_path(package) {
                return Err(Error::SymbolRegistry(format!(
                    "set `{}` exports invalid package path `{}`",
                    self.name, package
                )));
            }
            for ident in idents.keys() {
                if !is_identifier(ident) {
                    return Err(Error::SymbolRegistry(format!(
                        "set `{}` exports invalid identifier `{}` in package `{}`",
                        self.name, ident, package
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    set: Arc<str>,
}

#[derive(Debug, Default)]
struct Inner {
    sets: Vec<String>,
    packages: BTreeMap<String, BTreeMap<String, Entry>>,
}

/// Read-only union of symbol sets. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    inner: Arc<Inner>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exports(exports: &Exports) -> Result<Self> {
        Self::new().extend(exports)
    }

    /// Compose sets in order; fails on the first malformed set or duplicate symbol.
    pub fn compose<'a>(sets: impl IntoIterator<Item = &'a Exports>) -> Result<Self> {
        let mut table = Self::new();
        for set in sets {
            table = table.extend(set)?;
        }
        Ok(table)
    }

    /// A new table holding this table's symbols plus `exports`.
    pub fn extend(&self, exports: &Exports) -> Result<Self> {
        exports.validate()?;
        let set: Arc<str> = Arc::from(exports.name());
        let mut inner = Inner {
            sets: self.inner.sets.clone(),
            packages: self.inner.packages.clone(),
        };
        for (package, ident, value) in exports.iter() {
            insert_unique(&mut inner, package, ident, value.clone(), set.clone())?;
        }
        inner.sets.push(exports.name().to_string());
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// A new table holding the symbols of both tables.
    pub fn merge(&self, other: &SymbolTable) -> Result<Self> {
        let mut inner = Inner {
            sets: self.inner.sets.clone(),
            packages: self.inner.packages.clone(),
        };
        for (package, idents) in &other.inner.packages {
            for (ident, entry) in idents {
                insert_unique(&mut inner, package, ident, entry.value.clone(), entry.set.clone())?;
            }
        }
        inner.sets.extend(other.inner.sets.iter().cloned());
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn lookup(&self, package: &str, ident: &str) -> Option<&Value> {
        self.inner
            .packages
            .get(package)
            .and_then(|idents| idents.get(ident))
            .map(|entry| &entry.value)
    }

    /// Name of the set that exported `package::ident`.
    pub fn origin(&self, package: &str, ident: &str) -> Option<&str> {
        self.inner
            .packages
            .get(package)
            .and_then(|idents| idents.get(ident))
            .map(|entry| entry.set.as_ref())
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.inner.packages.contains_key(package)
    }

    pub fn package(&self, package: &str) -> Option<impl Iterator<Item = (&str, &Value)>> {
        self.inner.packages.get(package).map(|idents| {
            idents
                .iter()
                .map(|(ident, entry)| (ident.as_str(), &entry.value))
        })
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.inner.packages.keys().map(String::as_str)
    }

    pub fn sets(&self) -> &[String] {
        &self.inner.sets
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.inner.packages.iter().flat_map(|(package, idents)| {
            idents
                .iter()
                .map(move |(ident, entry)| (package.as_str(), ident.as_str(), &entry.value))
        })
    }

    pub fn len(&self) -> usize {
        self.inner.packages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_unique(inner: &mut Inner, package: &str, ident: &str, value: Value, set: Arc<str>) -> Result<()> {
    let idents = inner.packages.entry(package.to_string()).or_default();
    if let Some(existing) = idents.get(ident) {
        return Err(Error::SymbolRegistry(format!(
            "`{}::{}` is exported by both `{}` and `{}`",
            package, ident, existing.set, set
        )));
    }
    idents.insert(ident.to_string(), Entry { value, set });
    Ok(())
}

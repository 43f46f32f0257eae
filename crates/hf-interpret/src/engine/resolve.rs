//! Path and type resolution.
//!
//! A path is looked up in the current module (its items, then its glob imports), then
//! among the prelude types, then among the packages of the symbol table. Imports are
//! stored unresolved and followed on every lookup, so declaration order never matters.

use super::operators::int_bounds;
use super::{Binding, ModuleData, ModuleId, ROOT_MODULE};
use crate::error::eval_error;
use hf_core::{Error, FloatTy, IntTy, NativeFunction, Result, Span, SymbolTable, Ty, TypeToken, Value};
use hf_lang::ast::{TypeExpr, TypeKind};
use std::cell::RefCell;

const MAX_IMPORT_DEPTH: usize = 32;

/// What a path resolved to.
pub(crate) enum Target<'a> {
    /// A script item other than a module or an import.
    Item(&'a Binding),
    Value(Value),
    Module(ModuleId),
    Package(String),
}

impl Target<'_> {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Target::Item(Binding::Fn(_)) => "function",
            Target::Item(Binding::Const(_)) => "constant",
            Target::Item(Binding::Struct(_)) => "struct",
            Target::Item(_) | Target::Module(_) => "module",
            Target::Value(Value::Type(_)) => "type",
            Target::Value(_) => "value",
            Target::Package(_) => "package",
        }
    }
}

/// Read-only view over the modules of a script and its symbols.
pub(crate) struct Scope<'a> {
    modules: &'a [ModuleData],
    symbols: &'a SymbolTable,
    /// Modules whose glob imports are being searched; a glob path never sees the globs
    /// of the module it is resolved in.
    expanding: RefCell<Vec<ModuleId>>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(modules: &'a [ModuleData], symbols: &'a SymbolTable) -> Self {
        Self {
            modules,
            symbols,
            expanding: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn resolve_path(&self, module: ModuleId, segments: &[String], span: Span) -> Result<Target<'a>> {
        self.resolve_segments(module, segments, span, 0)
    }

    fn resolve_segments(
        &self,
        module: ModuleId,
        segments: &[String],
        span: Span,
        depth: usize,
    ) -> Result<Target<'a>> {
        let unresolved = || Error::unresolved(segments.join("::"), Some(span));
        let Some((first, rest)) = segments.split_first() else {
            return Err(unresolved());
        };
        let mut target = self
            .resolve_first(module, first, span, depth)?
            .ok_or_else(unresolved)?;
        for segment in rest {
            target = self
                .member(target, segment, span, depth)?
                .ok_or_else(unresolved)?;
        }
        Ok(target)
    }

    fn resolve_first(
        &self,
        module: ModuleId,
        name: &str,
        span: Span,
        depth: usize,
    ) -> Result<Option<Target<'a>>> {
        match name {
            "crate" => return Ok(Some(Target::Module(ROOT_MODULE))),
            "self" => return Ok(Some(Target::Module(module))),
            "super" => {
                return match self.module(module)?.parent {
                    Some(parent) => Ok(Some(Target::Module(parent))),
                    None => Err(eval_error("there are too many leading `super` keywords", span)),
                }
            }
            _ => {}
        }
        if let Some(target) = self.lookup_in_module(module, name, span, depth)? {
            return Ok(Some(target));
        }
        if let Some(ty) = prelude_type(name) {
            return Ok(Some(Target::Value(Value::Type(TypeToken::Builtin(ty)))));
        }
        if self.is_package_prefix(name) {
            return Ok(Some(Target::Package(name.to_string())));
        }
        Ok(None)
    }

    /// Look `name` up among the items and glob imports of `module`.
    pub(crate) fn lookup_in_module(
        &self,
        module: ModuleId,
        name: &str,
        span: Span,
        depth: usize,
    ) -> Result<Option<Target<'a>>> {
        let data = self.module(module)?;
        if let Some(binding) = data.items.get(name) {
            return self.follow(module, binding, depth).map(Some);
        }
        if data.globs.is_empty() || self.expanding.borrow().contains(&module) {
            return Ok(None);
        }
        self.expanding.borrow_mut().push(module);
        let found = self.lookup_in_globs(module, data, name, span, depth);
        self.expanding.borrow_mut().pop();
        found
    }

    fn lookup_in_globs(
        &self,
        module: ModuleId,
        data: &'a ModuleData,
        name: &str,
        span: Span,
        depth: usize,
    ) -> Result<Option<Target<'a>>> {
        for (glob, glob_span) in &data.globs {
            match self.resolve_import(module, glob, *glob_span, depth)? {
                Target::Module(source) if source != module => {
                    if let Some(target) = self.lookup_in_module(source, name, span, depth + 1)? {
                        return Ok(Some(target));
                    }
                }
                Target::Package(package) => {
                    if let Some(value) = self.symbols.lookup(&package, name) {
                        return Ok(Some(Target::Value(value.clone())));
                    }
                }
                Target::Module(_) => {}
                other => {
                    return Err(eval_error(
                        format!("cannot glob-import from {} `{}`", other.describe(), glob.join("::")),
                        *glob_span,
                    ))
                }
            }
        }
        Ok(None)
    }

    fn follow(&self, module: ModuleId, binding: &'a Binding, depth: usize) -> Result<Target<'a>> {
        match binding {
            Binding::Import { path, span } => self.resolve_import(module, path, *span, depth),
            Binding::Module(id) => Ok(Target::Module(*id)),
            other => Ok(Target::Item(other)),
        }
    }

    pub(crate) fn resolve_import(
        &self,
        module: ModuleId,
        path: &[String],
        span: Span,
        depth: usize,
    ) -> Result<Target<'a>> {
        if depth >= MAX_IMPORT_DEPTH {
            return Err(eval_error(
                format!("import of `{}` does not terminate", path.join("::")),
                span,
            ));
        }
        self.resolve_segments(module, path, span, depth + 1)
    }

    fn member(&self, target: Target<'a>, name: &str, span: Span, depth: usize) -> Result<Option<Target<'a>>> {
        match target {
            Target::Module(module) => self.lookup_in_module(module, name, span, depth),
            Target::Package(package) => {
                if let Some(value) = self.symbols.lookup(&package, name) {
                    return Ok(Some(Target::Value(value.clone())));
                }
                let nested = format!("{package}::{name}");
                if self.is_package_prefix(&nested) {
                    return Ok(Some(Target::Package(nested)));
                }
                Ok(None)
            }
            Target::Value(Value::Type(token)) => Ok(type_member(&token, name).map(Target::Value)),
            Target::Item(_) | Target::Value(_) => Ok(None),
        }
    }

    fn module(&self, module: ModuleId) -> Result<&'a ModuleData> {
        self.modules
            .get(module)
            .ok_or_else(|| Error::eval(format!("module #{module} does not exist")))
    }

    fn is_package_prefix(&self, name: &str) -> bool {
        self.symbols
            .packages()
            .any(|package| package == name || package.strip_prefix(name).is_some_and(|rest| rest.starts_with("::")))
    }

    pub(crate) fn resolve_type(&self, module: ModuleId, ty: &TypeExpr) -> Result<Ty> {
        match &ty.kind {
            TypeKind::Ref(inner) => self.resolve_type(module, inner),
            TypeKind::Slice(elem) => Ok(Ty::list(self.resolve_type(module, elem)?)),
            TypeKind::Unit => Ok(Ty::Unit),
            TypeKind::Infer => Ok(Ty::Infer),
            TypeKind::Fn { params, ret } => {
                let params = params
                    .iter()
                    .map(|param| self.resolve_type(module, param))
                    .collect::<Result<Vec<_>>>()?;
                let ret = match ret {
                    Some(ret) => self.resolve_type(module, ret)?,
                    None => Ty::Unit,
                };
                Ok(Ty::func(params, ret))
            }
            TypeKind::Path { segments, generics } => {
                if let [name] = segments.as_slice() {
                    match (name.as_str(), generics.as_slice()) {
                        ("Vec", []) => return Ok(Ty::list(Ty::Infer)),
                        ("Vec", [elem]) => return Ok(Ty::list(self.resolve_type(module, elem)?)),
                        // smart pointers are transparent
                        ("Box" | "Arc" | "Rc", [inner]) => return self.resolve_type(module, inner),
                        (name, []) => {
                            if let Some(ty) = Ty::primitive(name) {
                                return Ok(ty);
                            }
                        }
                        _ => {}
                    }
                }
                let display = segments.join("::");
                match self.resolve_path(module, segments, ty.span)? {
                    Target::Item(Binding::Struct(schema)) => Ok(Ty::named(schema.name.clone())),
                    Target::Value(Value::Type(token)) => Ok(token.as_ty()),
                    other => Err(eval_error(
                        format!("expected type, found {} `{display}`", other.describe()),
                        ty.span,
                    )),
                }
            }
        }
    }
}

/// Builtin type names usable as paths: `String::new()`, `i64::MAX`, `Vec::new()`.
fn prelude_type(name: &str) -> Option<Ty> {
    match name {
        "Vec" => Some(Ty::list(Ty::Infer)),
        _ => Ty::primitive(name),
    }
}

fn type_member(token: &TypeToken, name: &str) -> Option<Value> {
    match token {
        TypeToken::Host(desc) => desc.method(name).map(|slot| Value::Func(slot.dispatcher())),
        TypeToken::Struct(_) => None,
        TypeToken::Builtin(ty) => builtin_member(ty, name),
    }
}

fn builtin_member(ty: &Ty, name: &str) -> Option<Value> {
    let value = match (ty, name) {
        (Ty::Str, "new") => NativeFunction::new("String::new", vec![], Ty::Str, |_| Ok(Value::string(""))).into_value(),
        (Ty::Str, "from") => NativeFunction::new("String::from", vec![Ty::Any], Ty::Str, |args| {
            Ok(Value::string(args.get(0)?.to_string()))
        })
        .into_value(),
        (Ty::List(_), "new") => {
            NativeFunction::new("Vec::new", vec![], Ty::list(Ty::Infer), |_| Ok(Value::list(Vec::new()))).into_value()
        }
        (Ty::List(_), "with_capacity") => NativeFunction::new(
            "Vec::with_capacity",
            vec![Ty::Int(IntTy::Usize)],
            Ty::list(Ty::Infer),
            |_| Ok(Value::list(Vec::new())),
        )
        .into_value(),
        (Ty::Int(int), "MAX") => Value::Int(int_bounds(*int).1),
        (Ty::Int(int), "MIN") => Value::Int(int_bounds(*int).0),
        (Ty::Float(FloatTy::F32), "MAX") => Value::Float(f32::MAX.into()),
        (Ty::Float(FloatTy::F32), "MIN") => Value::Float(f32::MIN.into()),
        (Ty::Float(FloatTy::F32), "EPSILON") => Value::Float(f32::EPSILON.into()),
        (Ty::Float(_), "MAX") => Value::Float(f64::MAX),
        (Ty::Float(_), "MIN") => Value::Float(f64::MIN),
        (Ty::Float(_), "EPSILON") => Value::Float(f64::EPSILON),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_members_cover_prelude_paths() {
        assert_eq!(builtin_member(&Ty::Int(IntTy::U8), "MAX"), Some(Value::Int(255)));
        assert_eq!(builtin_member(&Ty::Int(IntTy::I32), "MIN"), Some(Value::Int(i32::MIN.into())));
        assert!(builtin_member(&Ty::Str, "new").is_some());
        assert!(builtin_member(&Ty::Bool, "new").is_none());
    }
}

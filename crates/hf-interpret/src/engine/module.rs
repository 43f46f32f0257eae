use super::resolve::{Scope, Target};
use super::*;
use hf_core::{Signature, Ty};
use hf_lang::ast::{File, Item, ItemKind, Stmt, StructDecl};
use std::collections::HashSet;
use tracing::debug;

/// Collects the declarations of a parsed file into modules before a [`Program`] exists.
struct Loader<'s> {
    symbols: &'s SymbolTable,
    modules: Vec<ModuleData>,
    declared: HashSet<(ModuleId, String)>,
    structs: Vec<(ModuleId, StructDecl, Span)>,
    fns: Vec<(ModuleId, Arc<FnDecl>)>,
    stmts: Vec<Stmt>,
}

/// Load a parsed script: declare its items, resolve types and imports, then run its
/// top-level statements once, in source order.
pub(crate) fn load(
    file: File,
    origin: &str,
    symbols: &SymbolTable,
    options: &EvalOptions,
) -> Result<(Arc<Program>, Env)> {
    let started = Instant::now();
    let mut loader = Loader {
        symbols,
        modules: vec![ModuleData::new(Vec::new(), None)],
        declared: HashSet::new(),
        structs: Vec::new(),
        fns: Vec::new(),
        stmts: Vec::new(),
    };
    loader.declare(ROOT_MODULE, file.items)?;
    loader.define_structs()?;
    loader.define_fns()?;
    loader.validate_imports()?;

    let program = Arc::new(Program {
        origin: origin.to_string(),
        symbols: symbols.clone(),
        options: options.clone(),
        modules: loader.modules,
        globals: RwLock::default(),
    });
    let env = run_statements(&program, &loader.stmts)?;
    debug!(
        script = origin,
        modules = program.modules.len(),
        statements = loader.stmts.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "script loaded"
    );
    Ok((program, env))
}

impl Loader<'_> {
    fn scope(&self) -> Scope<'_> {
        Scope::new(&self.modules, self.symbols)
    }

    fn reserve(&mut self, module: ModuleId, name: &str, span: Span) -> Result<()> {
        if !self.declared.insert((module, name.to_string())) {
            return Err(eval_error(
                format!("the name `{name}` is defined multiple times"),
                span,
            ));
        }
        Ok(())
    }

    fn insert(&mut self, module: ModuleId, name: &str, binding: Binding) {
        if let Some(data) = self.modules.get_mut(module) {
            data.items.insert(name.to_string(), binding);
        }
    }

    fn declare(&mut self, module: ModuleId, items: Vec<Item>) -> Result<()> {
        for item in items {
            let span = item.span;
            match item.kind {
                ItemKind::Use(imports) => {
                    for import in imports {
                        if import.glob {
                            self.modules[module].globs.push((import.path, import.span));
                            continue;
                        }
                        let Some(name) = import.binding().map(str::to_string) else {
                            continue;
                        };
                        self.reserve(module, &name, import.span)?;
                        self.insert(
                            module,
                            &name,
                            Binding::Import {
                                path: import.path,
                                span: import.span,
                            },
                        );
                    }
                }
                ItemKind::Fn(decl) => {
                    self.reserve(module, &decl.name, span)?;
                    self.fns.push((module, decl));
                }
                ItemKind::Struct(decl) => {
                    self.reserve(module, &decl.name, span)?;
                    // placeholder so field and parameter types can name it before its
                    // own fields are resolved
                    let name = self.modules[module].qualify(&decl.name);
                    self.insert(
                        module,
                        &decl.name,
                        Binding::Struct(Arc::new(StructSchema::new(name, Vec::new()))),
                    );
                    self.structs.push((module, decl, span));
                }
                ItemKind::Const(decl) => {
                    self.reserve(module, &decl.name, span)?;
                    let name = decl.name.clone();
                    self.insert(module, &name, Binding::Const(Arc::new(ConstDef { decl, module })));
                }
                ItemKind::Mod(decl) => {
                    self.reserve(module, &decl.name, span)?;
                    let id = self.modules.len();
                    let mut path = self.modules[module].path.clone();
                    path.push(decl.name.clone());
                    self.modules.push(ModuleData::new(path, Some(module)));
                    self.insert(module, &decl.name, Binding::Module(id));
                    self.declare(id, decl.items)?;
                }
                ItemKind::Stmt(stmt) => {
                    if module != ROOT_MODULE {
                        return Err(eval_error(
                            "statements are only allowed at the top level of a script",
                            span,
                        ));
                    }
                    self.stmts.push(stmt);
                }
            }
        }
        Ok(())
    }

    fn define_structs(&mut self) -> Result<()> {
        let structs = std::mem::take(&mut self.structs);
        for (module, decl, span) in structs {
            let mut fields = Vec::with_capacity(decl.fields.len());
            for field in &decl.fields {
                if fields.iter().any(|(name, _)| name == &field.name) {
                    return Err(eval_error(
                        format!("field `{}` is already declared in `{}`", field.name, decl.name),
                        span,
                    ));
                }
                let ty = self.scope().resolve_type(module, &field.ty)?;
                fields.push((field.name.clone(), ty));
            }
            let schema = StructSchema::new(self.modules[module].qualify(&decl.name), fields);
            self.insert(module, &decl.name, Binding::Struct(Arc::new(schema)));
        }
        Ok(())
    }

    fn define_fns(&mut self) -> Result<()> {
        let fns = std::mem::take(&mut self.fns);
        for (module, decl) in fns {
            let scope = self.scope();
            let params = decl
                .params
                .iter()
                .map(|param| match &param.ty {
                    Some(ty) => scope.resolve_type(module, ty),
                    None => Ok(Ty::Infer),
                })
                .collect::<Result<Vec<_>>>()?;
            let ret = match &decl.ret {
                Some(ty) => scope.resolve_type(module, ty)?,
                None => Ty::Unit,
            };
            let def = FnDef {
                qualified_name: self.modules[module].qualify(&decl.name),
                signature: Signature::new(params, ret),
                module,
                decl: decl.clone(),
            };
            self.insert(module, &decl.name, Binding::Fn(Arc::new(def)));
        }
        Ok(())
    }

    fn validate_imports(&self) -> Result<()> {
        let scope = self.scope();
        for (id, module) in self.modules.iter().enumerate() {
            for binding in module.items.values() {
                if let Binding::Import { path, span } = binding {
                    scope.resolve_import(id, path, *span, 0)?;
                }
            }
            for (path, span) in &module.globs {
                match scope.resolve_import(id, path, *span, 0)? {
                    Target::Module(_) | Target::Package(_) => {}
                    other => {
                        return Err(eval_error(
                            format!("cannot glob-import from {} `{}`", other.describe(), path.join("::")),
                            *span,
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

fn stmt_span(stmt: &Stmt) -> Span {
    match stmt {
        Stmt::Let(stmt) => stmt.span,
        Stmt::Expr(expr) | Stmt::Semi(expr) => expr.span,
    }
}

fn run_statements(program: &Arc<Program>, stmts: &[Stmt]) -> Result<Env> {
    let mut evaluator = Evaluator::new(
        program,
        ROOT_MODULE,
        Env::default(),
        Limits::for_load(&program.options),
    );
    for stmt in stmts {
        let span = stmt_span(stmt);
        evaluator.check_deadline(span)?;
        let outcome = evaluator.exec_stmt(stmt);
        program.publish_globals(evaluator.env.root_bindings());
        if let Err(flow) = outcome {
            // a top-level `return` ends the script early
            flow.into_result(span)?;
            break;
        }
    }
    Ok(evaluator.env)
}

use super::*;
use crate::error::locate;
use crate::interp_bail;
use hf_core::{Function, Signature, Ty, TypeToken};
use hf_lang::ast::{ClosureExpr, Param};
use std::any::Any;
use std::fmt;

enum Body {
    Fn(Arc<FnDecl>),
    Closure(Arc<ClosureExpr>),
}

/// A function item or closure defined by a script.
///
/// It keeps its program alive, so the host may hold it (for example as the live entry of
/// a method slot) long after the interpreter that produced it is gone. Each call from the
/// host gets a fresh step budget.
pub struct ScriptFunction {
    name: String,
    signature: Signature,
    params: Vec<Param>,
    body: Body,
    captures: Vec<(String, Value, bool)>,
    module: ModuleId,
    program: Arc<Program>,
    span: Span,
}

impl ScriptFunction {
    pub(crate) fn from_item(def: &FnDef, program: &Arc<Program>) -> Self {
        Self {
            name: def.qualified_name.clone(),
            signature: def.signature.clone(),
            params: def.decl.params.clone(),
            body: Body::Fn(def.decl.clone()),
            captures: Vec::new(),
            module: def.module,
            program: program.clone(),
            span: def.decl.span,
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn origin(&self) -> &str {
        &self.program.origin
    }
}

impl Function for ScriptFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Option<&Signature> {
        Some(&self.signature)
    }

    fn call(&self, args: Vec<Value>) -> Result<Value> {
        let limits = Limits::for_host_call(&self.program.options);
        let mut evaluator = Evaluator::new(&self.program, self.module, Env::default(), limits);
        with_stack(|| evaluator.call_script(self, args, self.span))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("origin", &self.program.origin)
            .finish()
    }
}

impl<'p> Evaluator<'p> {
    pub(super) fn make_closure(&mut self, closure: &Arc<ClosureExpr>) -> Result<Value> {
        let scope = self.scope();
        let params = closure
            .params
            .iter()
            .map(|param| match &param.ty {
                Some(ty) => scope.resolve_type(self.module, ty),
                None => Ok(Ty::Infer),
            })
            .collect::<Result<Vec<_>>>()?;
        let ret = match &closure.ret {
            Some(ty) => scope.resolve_type(self.module, ty)?,
            None => Ty::Infer,
        };
        let function = ScriptFunction {
            name: format!("closure@{}", closure.span),
            signature: Signature::new(params, ret),
            params: closure.params.clone(),
            body: Body::Closure(closure.clone()),
            captures: self.env.snapshot(),
            module: self.module,
            program: self.program.clone(),
            span: closure.span,
        };
        Ok(Value::func(function))
    }

    /// Value of a function item, as a callable that can leave the interpreter.
    pub(super) fn item_function(&self, def: &FnDef) -> Value {
        Value::func(ScriptFunction::from_item(def, self.program))
    }

    /// Call any callable value. Script functions of this program run on this evaluator
    /// and share its step budget; everything else goes through [`Function::call`].
    pub(super) fn call_value(&mut self, callee: &Value, args: Vec<Value>, span: Span) -> Result<Value> {
        match callee {
            Value::Func(func) => {
                if let Some(script) = func.as_any().downcast_ref::<ScriptFunction>() {
                    if Arc::ptr_eq(&script.program, self.program) {
                        return self.call_script(script, args, span);
                    }
                }
                func.call(args).map_err(|err| locate(err, span))
            }
            Value::Type(TypeToken::Struct(schema)) => interp_bail!(
                span,
                "`{}` is a struct; build it with `{} {{ .. }}`",
                schema.name,
                schema.name
            ),
            other => interp_bail!(span, "expected function, found `{}`", other.type_name()),
        }
    }

    pub(super) fn call_script(&mut self, func: &ScriptFunction, args: Vec<Value>, span: Span) -> Result<Value> {
        let _depth = DepthGuard::enter(self.limits.max_call_depth, span)?;
        let sig = &func.signature;
        if sig.arity() != args.len() {
            interp_bail!(
                span,
                "`{}` takes {} argument(s) but {} were supplied",
                func.name,
                sig.arity(),
                args.len()
            );
        }
        for (idx, (ty, arg)) in sig.params.iter().zip(&args).enumerate() {
            if !arg.conforms_to(ty) {
                interp_bail!(
                    span,
                    "`{}` expects `{}` for argument {}, found `{}`",
                    func.name,
                    ty,
                    idx + 1,
                    arg.type_name()
                );
            }
        }

        let mut env = Env::default();
        for (name, value, mutable) in &func.captures {
            env.define(name, value.clone(), *mutable);
        }
        env.push_scope();
        for (param, arg) in func.params.iter().zip(args) {
            env.define(&param.name, arg, param.mutable);
        }

        let saved_env = std::mem::replace(&mut self.env, env);
        let saved_module = std::mem::replace(&mut self.module, func.module);
        let outcome = match &func.body {
            Body::Fn(decl) => self.eval_block(&decl.body),
            Body::Closure(closure) => self.eval_expr(&closure.body),
        };
        self.env = saved_env;
        self.module = saved_module;

        let value = match outcome {
            Ok(value) => value,
            Err(flow) => flow.into_result(span)?,
        };
        if !value.conforms_to(&sig.ret) {
            interp_bail!(
                span,
                "`{}` should return `{}`, found `{}`",
                func.name,
                sig.ret,
                value.type_name()
            );
        }
        Ok(value)
    }
}

use super::operators;
use super::resolve::Target;
use super::*;
use crate::{interp_bail, interp_ensure};
use hf_core::{StructValue, TypeToken};
use hf_lang::ast::{BinOp, Expr, ExprKind, Lit, Path};

/// One step of an assignment target below its root variable.
pub(super) enum Accessor {
    Field(String),
    Index(Value),
}

pub(super) fn lit_value(lit: &Lit) -> Value {
    match lit {
        Lit::Unit => Value::Unit,
        Lit::Bool(v) => Value::Bool(*v),
        Lit::Int(v) => Value::Int(*v),
        Lit::Float(v) => Value::Float(*v),
        Lit::Char(v) => Value::Char(*v),
        Lit::Str(v) => Value::from(v.as_str()),
    }
}

impl<'p> Evaluator<'p> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Eval<Value> {
        with_stack(|| self.eval_expr_inner(expr))
    }

    fn eval_expr_inner(&mut self, expr: &Expr) -> Eval<Value> {
        self.tick(expr.span)?;
        let span = expr.span;
        match &expr.kind {
            ExprKind::Lit(lit) => Ok(lit_value(lit)),
            ExprKind::Path(path) => Ok(self.eval_path(path)?),
            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(callee)?;
                let args = self.eval_args(args)?;
                Ok(self.call_value(&callee, args, span)?)
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.eval_method_call(receiver, method, args, span),
            ExprKind::Field { base, field } => {
                let base = self.eval_expr(base)?;
                Ok(self.field(&base, field, span)?)
            }
            ExprKind::Index { base, index } => {
                let base = self.eval_expr(base)?;
                if let ExprKind::Range {
                    start,
                    end,
                    inclusive,
                } = &index.kind
                {
                    let start = self.eval_bound(start.as_deref())?;
                    let end = self.eval_bound(end.as_deref())?;
                    return Ok(operators::slice(&base, start, end, *inclusive, index.span)?);
                }
                let index = self.eval_expr(index)?;
                Ok(operators::index(&base, &index, span)?)
            }
            ExprKind::Unary { op, expr } => {
                let value = self.eval_expr(expr)?;
                Ok(operators::unary(*op, value, span)?)
            }
            ExprKind::Binary {
                op: op @ (BinOp::And | BinOp::Or),
                lhs,
                rhs,
            } => {
                let lhs = self.eval_cond(lhs)?;
                // short-circuit
                if lhs == (*op == BinOp::Or) {
                    return Ok(Value::Bool(lhs));
                }
                Ok(Value::Bool(self.eval_cond(rhs)?))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                Ok(operators::binary(*op, lhs, rhs, span)?)
            }
            ExprKind::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                self.assign(target, value)?;
                Ok(Value::Unit)
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let current = self.eval_expr(target)?;
                let rhs = self.eval_expr(value)?;
                let value = operators::binary(*op, current, rhs, span)?;
                self.assign(target, value)?;
                Ok(Value::Unit)
            }
            ExprKind::Cast { expr, ty } => {
                let value = self.eval_expr(expr)?;
                let ty = self.scope().resolve_type(self.module, ty)?;
                Ok(operators::cast(value, &ty, span)?)
            }
            // values are never borrowed, so `&x` is `x`
            ExprKind::Ref { expr, .. } => self.eval_expr(expr),
            ExprKind::Block(block) => self.eval_block(block),
            ExprKind::If { cond, then, els } => {
                if self.eval_cond(cond)? {
                    self.eval_block(then)
                } else if let Some(els) = els {
                    self.eval_expr(els)
                } else {
                    Ok(Value::Unit)
                }
            }
            ExprKind::While { cond, body } => self.eval_while(cond, body),
            ExprKind::Loop { body } => self.eval_loop(body),
            ExprKind::For {
                binding,
                iter,
                body,
            } => self.eval_for(binding, iter, body),
            ExprKind::Match { scrutinee, arms } => self.eval_match(scrutinee, arms, span),
            ExprKind::Closure(closure) => Ok(self.make_closure(closure)?),
            ExprKind::Struct { path, fields } => self.eval_struct_literal(path, fields, span),
            ExprKind::Array(items) => Ok(Value::list(self.eval_args(items)?)),
            ExprKind::ArrayRepeat { value, count } => {
                let value = self.eval_expr(value)?;
                let count = match self.eval_expr(count)? {
                    Value::Int(n) => usize::try_from(n).ok(),
                    _ => None,
                };
                let Some(count) = count else {
                    interp_bail!(span, "array repeat count must be a non-negative integer");
                };
                interp_ensure!(
                    count as u64 <= self.limits.max_steps,
                    span,
                    "array of {count} elements exceeds the step budget"
                );
                Ok(Value::list(vec![value; count]))
            }
            ExprKind::Range {
                start,
                end,
                inclusive,
            } => {
                let start = self.eval_bound(start.as_deref())?;
                let end = self.eval_bound(end.as_deref())?;
                Ok(self.range_list(start, end, *inclusive, span)?)
            }
            ExprKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expr(value)?,
                    None => Value::Unit,
                };
                Err(Flow::Return(value))
            }
            ExprKind::Break(value) => {
                let value = match value {
                    Some(value) => self.eval_expr(value)?,
                    None => Value::Unit,
                };
                Err(Flow::Break(value))
            }
            ExprKind::Continue => Err(Flow::Continue),
            ExprKind::Macro(call) => self.eval_macro(call, span),
        }
    }

    pub(super) fn eval_args(&mut self, args: &[Expr]) -> Eval<Vec<Value>> {
        args.iter().map(|arg| self.eval_expr(arg)).collect()
    }

    pub(super) fn eval_cond(&mut self, expr: &Expr) -> Eval<bool> {
        match self.eval_expr(expr)? {
            Value::Bool(v) => Ok(v),
            other => interp_bail!(
                expr.span,
                "mismatched types: expected `bool`, found `{}`",
                other.type_name()
            ),
        }
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> Eval<Option<i64>> {
        let Some(bound) = bound else {
            return Ok(None);
        };
        match self.eval_expr(bound)? {
            Value::Int(v) => Ok(Some(v)),
            other => interp_bail!(
                bound.span,
                "range bounds must be integers, found `{}`",
                other.type_name()
            ),
        }
    }

    /// A range used as a value becomes the list of its elements.
    fn range_list(&self, start: Option<i64>, end: Option<i64>, inclusive: bool, span: Span) -> Result<Value> {
        let (Some(start), Some(end)) = (start, end) else {
            interp_bail!(span, "only ranges with both bounds can be used as values");
        };
        let end = if inclusive { end.saturating_add(1) } else { end };
        let len = u64::try_from(i128::from(end) - i128::from(start)).unwrap_or(0);
        interp_ensure!(
            len <= self.limits.max_steps,
            span,
            "range of {len} elements exceeds the step budget"
        );
        Ok(Value::list((start..end).map(Value::Int).collect()))
    }

    /// Value of a path: locals, then bindings made by the script's top-level statements,
    /// then items, imports and symbol packages.
    pub(super) fn eval_path(&mut self, path: &Path) -> Result<Value> {
        if let [name] = path.segments.as_slice() {
            if let Some(value) = self.env.get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = self.program.global(name) {
                return Ok(value);
            }
        }
        let target = self.scope().resolve_path(self.module, &path.segments, path.span)?;
        self.target_value(target, &path.to_string(), path.span)
    }

    fn target_value(&mut self, target: Target<'p>, display: &str, span: Span) -> Result<Value> {
        match target {
            Target::Value(value) => Ok(value),
            Target::Item(Binding::Fn(def)) => Ok(self.item_function(def)),
            Target::Item(Binding::Const(def)) => self.eval_const(def, span),
            Target::Item(Binding::Struct(schema)) => Ok(Value::Type(TypeToken::Struct(schema.clone()))),
            other => interp_bail!(span, "expected value, found {} `{display}`", other.describe()),
        }
    }

    /// Constants are evaluated where they are used, in the module that declares them.
    pub(super) fn eval_const(&mut self, def: &ConstDef, span: Span) -> Result<Value> {
        let _depth = DepthGuard::enter(self.limits.max_call_depth, span)?;
        let saved_env = std::mem::take(&mut self.env);
        let saved_module = std::mem::replace(&mut self.module, def.module);
        let outcome = self.eval_expr(&def.decl.value);
        self.env = saved_env;
        self.module = saved_module;

        let value = match outcome {
            Ok(value) => value,
            Err(flow) => flow.into_result(def.decl.value.span)?,
        };
        if let Some(ty) = &def.decl.ty {
            let ty = self.scope().resolve_type(def.module, ty)?;
            interp_ensure!(
                value.conforms_to(&ty),
                span,
                "constant `{}` is declared as `{}` but evaluates to `{}`",
                def.decl.name,
                ty,
                value.type_name()
            );
        }
        Ok(value)
    }

    fn eval_struct_literal(&mut self, path: &Path, fields: &[(String, Expr)], span: Span) -> Eval<Value> {
        let schema = match self.scope().resolve_path(self.module, &path.segments, path.span)? {
            Target::Item(Binding::Struct(schema)) => schema.clone(),
            Target::Value(Value::Type(TypeToken::Struct(schema))) => schema,
            other => interp_bail!(
                path.span,
                "expected struct, found {} `{path}`",
                other.describe()
            ),
        };
        let mut values: Vec<Option<Value>> = vec![None; schema.fields.len()];
        for (name, expr) in fields {
            let Some(idx) = schema.field_index(name) else {
                interp_bail!(expr.span, "struct `{}` has no field named `{name}`", schema.name);
            };
            interp_ensure!(
                values[idx].is_none(),
                expr.span,
                "field `{name}` specified more than once"
            );
            let value = self.eval_expr(expr)?;
            let ty = &schema.fields[idx].1;
            interp_ensure!(
                value.conforms_to(ty),
                expr.span,
                "mismatched types: field `{name}` of `{}` is `{ty}`, found `{}`",
                schema.name,
                value.type_name()
            );
            values[idx] = Some(value);
        }
        let mut complete = Vec::with_capacity(values.len());
        for (value, (name, _)) in values.into_iter().zip(&schema.fields) {
            match value {
                Some(value) => complete.push(value),
                None => interp_bail!(span, "missing field `{name}` in initializer of `{}`", schema.name),
            }
        }
        Ok(Value::Struct(Arc::new(StructValue {
            schema,
            fields: complete,
        })))
    }

    pub(super) fn field(&self, base: &Value, field: &str, span: Span) -> Result<Value> {
        match base {
            Value::Struct(value) => match value.get(field) {
                Some(value) => Ok(value.clone()),
                None => interp_bail!(span, "no field `{field}` on type `{}`", value.schema.name),
            },
            Value::Host(host) => match host.ty.field(host, field) {
                Some(value) => Ok(value),
                None => interp_bail!(
                    span,
                    "no field `{field}` on type `{}`; readable fields: [{}]",
                    host.ty.name(),
                    host.ty.field_names().join(", ")
                ),
            },
            other => interp_bail!(span, "no field `{field}` on type `{}`", other.type_name()),
        }
    }

    /// Store `value` into the place `target` names: a variable, a field or a list element,
    /// nested arbitrarily. Only the root variable needs to be declared `mut`.
    pub(super) fn assign(&mut self, target: &Expr, value: Value) -> Eval<()> {
        let mut accessors = Vec::new();
        let root = self.place(target, &mut accessors)?;
        let span = target.span;
        let Some((slot, mutable)) = self.env.get_mut(&root) else {
            if self.program.global(&root).is_some() {
                interp_bail!(
                    span,
                    "cannot assign to `{root}`: top-level bindings are read-only inside functions"
                );
            }
            return Err(Error::unresolved(root, Some(span)).into());
        };
        interp_ensure!(mutable, span, "cannot assign twice to immutable variable `{root}`");
        Ok(write_place(slot, &accessors, value, span)?)
    }

    /// Root variable of a place expression; accessors below it are pushed in order.
    fn place(&mut self, target: &Expr, accessors: &mut Vec<Accessor>) -> Eval<String> {
        match &target.kind {
            ExprKind::Path(path) if path.is_single() => Ok(path.last().to_string()),
            ExprKind::Field { base, field } => {
                let root = self.place(base, accessors)?;
                accessors.push(Accessor::Field(field.clone()));
                Ok(root)
            }
            ExprKind::Index { base, index } => {
                let root = self.place(base, accessors)?;
                let index = self.eval_expr(index)?;
                accessors.push(Accessor::Index(index));
                Ok(root)
            }
            ExprKind::Unary {
                op: hf_lang::ast::UnOp::Deref,
                expr,
            } => self.place(expr, accessors),
            _ => interp_bail!(target.span, "invalid left-hand side of assignment"),
        }
    }
}

/// Write through `accessors` into `slot`, copying shared composite values on the way.
fn write_place(slot: &mut Value, accessors: &[Accessor], value: Value, span: Span) -> Result<()> {
    let Some((first, rest)) = accessors.split_first() else {
        *slot = value;
        return Ok(());
    };
    match (first, slot) {
        (Accessor::Field(name), Value::Struct(record)) => {
            let record = Arc::make_mut(record);
            let Some(idx) = record.schema.field_index(name) else {
                interp_bail!(span, "no field `{name}` on type `{}`", record.schema.name);
            };
            if rest.is_empty() {
                let ty = &record.schema.fields[idx].1;
                interp_ensure!(
                    value.conforms_to(ty),
                    span,
                    "mismatched types: field `{name}` of `{}` is `{ty}`, found `{}`",
                    record.schema.name,
                    value.type_name()
                );
            }
            write_place(&mut record.fields[idx], rest, value, span)
        }
        (Accessor::Index(index), Value::List(items)) => {
            let idx = operators::element_index(index, items.len(), span)?;
            let items = Arc::make_mut(items);
            write_place(&mut items[idx], rest, value, span)
        }
        (Accessor::Field(name), Value::Host(host)) => interp_bail!(
            span,
            "cannot assign to field `{name}` of host type `{}`",
            host.ty.name()
        ),
        (Accessor::Field(name), other) => {
            interp_bail!(span, "no field `{name}` on type `{}`", other.type_name())
        }
        (Accessor::Index(_), other) => {
            interp_bail!(span, "cannot index into a value of type `{}`", other.type_name())
        }
    }
}

use super::eval_expr::lit_value;
use super::operators::partial_cmp;
use super::resolve::Target;
use super::*;
use crate::{interp_bail, interp_ensure};
use hf_lang::ast::{Block, Expr, ExprKind, LetStmt, Lit, MatchArm, Pattern, Stmt};
use std::cmp::Ordering;

impl<'p> Evaluator<'p> {
    pub(crate) fn eval_block(&mut self, block: &Block) -> Eval<Value> {
        // empty loop bodies still consume the budget
        self.tick(block.span)?;
        self.env.push_scope();
        let outcome = self.eval_block_body(block);
        self.env.pop_scope();
        outcome
    }

    fn eval_block_body(&mut self, block: &Block) -> Eval<Value> {
        for stmt in &block.stmts {
            self.exec_stmt(stmt)?;
        }
        match &block.tail {
            Some(tail) => self.eval_expr(tail),
            None => Ok(Value::Unit),
        }
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Eval<()> {
        match stmt {
            Stmt::Let(stmt) => self.exec_let(stmt),
            Stmt::Expr(expr) | Stmt::Semi(expr) => {
                self.eval_expr(expr)?;
                Ok(())
            }
        }
    }

    fn exec_let(&mut self, stmt: &LetStmt) -> Eval<()> {
        let Some(init) = &stmt.init else {
            // `let x;` is assigned later, exactly like a `mut` binding here
            self.env.define(&stmt.name, Value::Unit, true);
            return Ok(());
        };
        let value = self.eval_expr(init)?;
        if let Some(ty) = &stmt.ty {
            let ty = self.scope().resolve_type(self.module, ty)?;
            interp_ensure!(
                value.conforms_to(&ty),
                stmt.span,
                "mismatched types: `{}` is declared as `{ty}`, found `{}`",
                stmt.name,
                value.type_name()
            );
        }
        self.env.define(&stmt.name, value, stmt.mutable);
        Ok(())
    }

    pub(super) fn eval_while(&mut self, cond: &Expr, body: &Block) -> Eval<Value> {
        while self.eval_cond(cond)? {
            match self.eval_block(body) {
                Ok(_) | Err(Flow::Continue) => {}
                Err(Flow::Break(_)) => break,
                Err(flow) => return Err(flow),
            }
        }
        Ok(Value::Unit)
    }

    pub(super) fn eval_loop(&mut self, body: &Block) -> Eval<Value> {
        loop {
            match self.eval_block(body) {
                Ok(_) | Err(Flow::Continue) => {}
                Err(Flow::Break(value)) => return Ok(value),
                Err(flow) => return Err(flow),
            }
        }
    }

    /// `for` over an integer range (never materialized), a list, or the chars of a string.
    pub(super) fn eval_for(&mut self, binding: &str, iter: &Expr, body: &Block) -> Eval<Value> {
        if let ExprKind::Range {
            start: Some(start),
            end,
            inclusive,
        } = &iter.kind
        {
            let start = self.eval_int(start)?;
            return match end {
                Some(end) => {
                    let end = self.eval_int(end)?;
                    if *inclusive {
                        self.run_for(binding, (start..=end).map(Value::Int), body)
                    } else {
                        self.run_for(binding, (start..end).map(Value::Int), body)
                    }
                }
                // bounded by the step budget
                None => self.run_for(binding, (start..=i64::MAX).map(Value::Int), body),
            };
        }
        match self.eval_expr(iter)? {
            Value::List(items) => self.run_for(binding, items.iter().cloned(), body),
            Value::Str(text) => self.run_for(binding, text.chars().map(Value::Char), body),
            other => interp_bail!(
                iter.span,
                "`{}` is not an iterator",
                other.type_name()
            ),
        }
    }

    fn run_for(&mut self, binding: &str, items: impl Iterator<Item = Value>, body: &Block) -> Eval<Value> {
        for item in items {
            self.env.push_scope();
            self.env.define(binding, item, false);
            let outcome = self.eval_block(body);
            self.env.pop_scope();
            match outcome {
                Ok(_) | Err(Flow::Continue) => {}
                Err(Flow::Break(_)) => break,
                Err(flow) => return Err(flow),
            }
        }
        Ok(Value::Unit)
    }

    fn eval_int(&mut self, expr: &Expr) -> Eval<i64> {
        match self.eval_expr(expr)? {
            Value::Int(v) => Ok(v),
            other => interp_bail!(
                expr.span,
                "mismatched types: expected integer, found `{}`",
                other.type_name()
            ),
        }
    }

    pub(super) fn eval_match(&mut self, scrutinee: &Expr, arms: &[MatchArm], span: Span) -> Eval<Value> {
        let value = self.eval_expr(scrutinee)?;
        for arm in arms {
            self.env.push_scope();
            let outcome = self.eval_arm(&value, arm);
            self.env.pop_scope();
            if let Some(result) = outcome? {
                return Ok(result);
            }
        }
        interp_bail!(span, "non-exhaustive match: no arm matched `{value:?}`")
    }

    fn eval_arm(&mut self, value: &Value, arm: &MatchArm) -> Eval<Option<Value>> {
        if !self.bind_pattern(&arm.pattern, value, arm.span)? {
            return Ok(None);
        }
        if let Some(guard) = &arm.guard {
            if !self.eval_cond(guard)? {
                return Ok(None);
            }
        }
        self.eval_expr(&arm.body).map(Some)
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: &Value, span: Span) -> Result<bool> {
        match pattern {
            Pattern::Wildcard => Ok(true),
            Pattern::Binding(name) => {
                if let Some(constant) = self.pattern_constant(name, span)? {
                    return Ok(constant == *value);
                }
                self.env.define(name, value.clone(), false);
                Ok(true)
            }
            Pattern::Lit(lit) => Ok(lit_value(lit) == *value),
            Pattern::Range {
                start,
                end,
                inclusive,
            } => Ok(in_range(value, start, end, *inclusive)),
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    if self.bind_pattern(alternative, value, span)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// A capitalized name in a pattern that resolves to a constant is compared, not bound.
    fn pattern_constant(&mut self, name: &str, span: Span) -> Result<Option<Value>> {
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Ok(None);
        }
        match self.scope().resolve_path(self.module, &[name.to_string()], span) {
            Ok(Target::Item(Binding::Const(def))) => self.eval_const(def, span).map(Some),
            Ok(Target::Value(value)) if !matches!(value, Value::Type(_) | Value::Func(_)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }
}

fn in_range(value: &Value, start: &Lit, end: &Lit, inclusive: bool) -> bool {
    let (start, end) = (lit_value(start), lit_value(end));
    let above = matches!(partial_cmp(value, &start), Some(Ordering::Greater | Ordering::Equal));
    let below = match partial_cmp(value, &end) {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => inclusive,
        _ => false,
    };
    above && below
}

use hf_lang::ast::{BinOp, Expr, ExprKind, Lit, UnOp};
use hf_lang::parse_expression;

fn parse_expr(src: &str) -> Expr {
    parse_expression(src, "<test>").unwrap_or_else(|e| panic!("parse failed for `{src}`: {e}"))
}

fn is_path(expr: &Expr, name: &str) -> bool {
    matches!(&expr.kind, ExprKind::Path(path) if path.is_single() && path.last() == name)
}

#[test]
fn precedence_mul_over_add() {
    let expr = parse_expr("1 + 2 * 3");
    let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
        panic!("expected add");
    };
    assert_eq!(*op, BinOp::Add);
    match &rhs.kind {
        ExprKind::Binary { op, .. } => assert_eq!(*op, BinOp::Mul),
        other => panic!("rhs should be mul, got {:?}", other),
    }
}

#[test]
fn left_associative_subtraction() {
    let expr = parse_expr("1 - 2 - 3");
    let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
        panic!("expected outer sub");
    };
    assert_eq!(*op, BinOp::Sub);
    assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Sub, .. }));
}

#[test]
fn parentheses_override_precedence() {
    let expr = parse_expr("(1 + 2) * 3");
    let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
        panic!("expected mul");
    };
    assert_eq!(*op, BinOp::Mul);
    assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Add, .. }));
}

#[test]
fn assignment_is_right_associative() {
    let expr = parse_expr("a = b = c");
    let ExprKind::Assign { target, value } = &expr.kind else {
        panic!("expected assign");
    };
    assert!(is_path(target, "a"));
    assert!(matches!(value.kind, ExprKind::Assign { .. }));
}

#[test]
fn logical_and_binds_tighter_than_or() {
    let expr = parse_expr("a || b && c");
    let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
        panic!("expected or");
    };
    assert_eq!(*op, BinOp::Or);
    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::And, .. }));
}

#[test]
fn comparison_binds_looser_than_shift() {
    let expr = parse_expr("1 << 2 < 5");
    let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
        panic!("expected lt");
    };
    assert_eq!(*op, BinOp::Lt);
    assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Shl, .. }));
}

#[test]
fn cast_binds_tighter_than_arithmetic() {
    let expr = parse_expr("x as f64 * 2.0");
    let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
        panic!("expected mul");
    };
    assert_eq!(*op, BinOp::Mul);
    assert!(matches!(lhs.kind, ExprKind::Cast { .. }));
}

#[test]
fn unary_applies_before_method_call_result() {
    let expr = parse_expr("-a.len()");
    let ExprKind::Unary { op, expr: inner } = &expr.kind else {
        panic!("expected unary");
    };
    assert_eq!(*op, UnOp::Neg);
    assert!(matches!(inner.kind, ExprKind::MethodCall { .. }));
}

#[test]
fn negative_literals_fold() {
    assert_eq!(parse_expr("-5").kind, ExprKind::Lit(Lit::Int(-5)));
    assert_eq!(
        parse_expr("-9223372036854775808").kind,
        ExprKind::Lit(Lit::Int(i64::MIN))
    );
}

#[test]
fn range_binds_looser_than_addition() {
    let expr = parse_expr("0..n + 1");
    let ExprKind::Range {
        start,
        end,
        inclusive,
    } = &expr.kind
    else {
        panic!("expected range");
    };
    assert!(!inclusive);
    assert!(start.is_some());
    assert!(matches!(
        end.as_deref().map(|e| &e.kind),
        Some(ExprKind::Binary { op: BinOp::Add, .. })
    ));
}

#[test]
fn compound_assignment_parses() {
    let expr = parse_expr("total += x * 2");
    assert!(matches!(
        expr.kind,
        ExprKind::CompoundAssign { op: BinOp::Add, .. }
    ));
}

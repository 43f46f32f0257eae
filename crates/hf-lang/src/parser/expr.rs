use super::items::{parse_param, parse_type};
use super::{PResult, ParseError, TokenStream};
use crate::ast::{
    BinOp, Block, ClosureExpr, Expr, ExprKind, LetStmt, Lit, MacroArg, MacroCall, MatchArm, Path,
    Pattern, Stmt, UnOp,
};
use crate::lexer::tokenizer::{parse_float_literal, parse_int_literal};
use crate::lexer::{Keyword, Token, TokenKind};
use hf_core::Span;
use std::sync::Arc;

const KNOWN_MACROS: &[&str] = &[
    "format",
    "println",
    "print",
    "eprintln",
    "eprint",
    "vec",
    "panic",
    "assert",
    "assert_eq",
    "assert_ne",
    "unreachable",
];

#[derive(Debug, Clone, Copy)]
enum Infix {
    Assign,
    Compound(BinOp),
    Range { inclusive: bool },
    Cast,
    Bin(BinOp),
}

impl Infix {
    /// Left and right binding power; a lower right power makes the operator right-associative.
    fn binding_power(self) -> (u8, u8) {
        match self {
            Infix::Assign | Infix::Compound(_) => (2, 1),
            Infix::Range { .. } => (4, 5),
            Infix::Cast => (24, 25),
            Infix::Bin(op) => match op {
                BinOp::Or => (6, 7),
                BinOp::And => (8, 9),
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (10, 11),
                BinOp::BitOr => (12, 13),
                BinOp::BitXor => (14, 15),
                BinOp::BitAnd => (16, 17),
                BinOp::Shl | BinOp::Shr => (18, 19),
                BinOp::Add | BinOp::Sub => (20, 21),
                BinOp::Mul | BinOp::Div | BinOp::Rem => (22, 23),
            },
        }
    }
}

fn peek_binop(input: &TokenStream) -> Option<Infix> {
    let token = input.peek()?;
    if token.is_keyword(Keyword::As) {
        return Some(Infix::Cast);
    }
    if token.kind != TokenKind::Symbol {
        return None;
    }
    let op = match token.lexeme.as_str() {
        "=" => Infix::Assign,
        "+=" => Infix::Compound(BinOp::Add),
        "-=" => Infix::Compound(BinOp::Sub),
        "*=" => Infix::Compound(BinOp::Mul),
        "/=" => Infix::Compound(BinOp::Div),
        "%=" => Infix::Compound(BinOp::Rem),
        "&=" => Infix::Compound(BinOp::BitAnd),
        "|=" => Infix::Compound(BinOp::BitOr),
        "^=" => Infix::Compound(BinOp::BitXor),
        "<<=" => Infix::Compound(BinOp::Shl),
        ">>=" => Infix::Compound(BinOp::Shr),
        ".." => Infix::Range { inclusive: false },
        "..=" => Infix::Range { inclusive: true },
        "||" => Infix::Bin(BinOp::Or),
        "&&" => Infix::Bin(BinOp::And),
        "==" => Infix::Bin(BinOp::Eq),
        "!=" => Infix::Bin(BinOp::Ne),
        "<" => Infix::Bin(BinOp::Lt),
        "<=" => Infix::Bin(BinOp::Le),
        ">" => Infix::Bin(BinOp::Gt),
        ">=" => Infix::Bin(BinOp::Ge),
        "|" => Infix::Bin(BinOp::BitOr),
        "^" => Infix::Bin(BinOp::BitXor),
        "&" => Infix::Bin(BinOp::BitAnd),
        "<<" => Infix::Bin(BinOp::Shl),
        ">>" => Infix::Bin(BinOp::Shr),
        "+" => Infix::Bin(BinOp::Add),
        "-" => Infix::Bin(BinOp::Sub),
        "*" => Infix::Bin(BinOp::Mul),
        "/" => Infix::Bin(BinOp::Div),
        "%" => Infix::Bin(BinOp::Rem),
        _ => return None,
    };
    Some(op)
}

pub(crate) fn parse_expr(input: &mut TokenStream) -> PResult<Expr> {
    parse_expr_prec(input, 0)
}

fn parse_expr_prec(input: &mut TokenStream, min_bp: u8) -> PResult<Expr> {
    input.enter()?;
    let lhs = parse_unary(input)?;
    let expr = parse_infix(input, lhs, min_bp)?;
    input.leave();
    Ok(expr)
}

fn parse_infix(input: &mut TokenStream, mut lhs: Expr, min_bp: u8) -> PResult<Expr> {
    while let Some(op) = peek_binop(input) {
        let (l_bp, r_bp) = op.binding_power();
        if l_bp < min_bp {
            break;
        }
        input.advance();
        let start = lhs.span;
        let kind = match op {
            Infix::Assign => ExprKind::Assign {
                target: Box::new(lhs),
                value: Box::new(parse_expr_prec(input, r_bp)?),
            },
            Infix::Compound(op) => ExprKind::CompoundAssign {
                op,
                target: Box::new(lhs),
                value: Box::new(parse_expr_prec(input, r_bp)?),
            },
            Infix::Range { inclusive } => {
                let end = if can_start_expr(input) {
                    Some(Box::new(parse_expr_prec(input, r_bp)?))
                } else if inclusive {
                    return Err(input.unexpected("the end of an inclusive range"));
                } else {
                    None
                };
                ExprKind::Range {
                    start: Some(Box::new(lhs)),
                    end,
                    inclusive,
                }
            }
            Infix::Cast => ExprKind::Cast {
                expr: Box::new(lhs),
                ty: parse_type(input)?,
            },
            Infix::Bin(op) => ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(parse_expr_prec(input, r_bp)?),
            },
        };
        lhs = Expr::new(kind, input.since(start));
    }
    Ok(lhs)
}

/// Whether the next token can begin an operand (used for optional operands such as
/// `return`, `break` and open ranges).
fn can_start_expr(input: &TokenStream) -> bool {
    let Some(token) = input.peek() else {
        return false;
    };
    match token.kind {
        TokenKind::Symbol => match token.lexeme.as_str() {
            "{" => !input.no_struct,
            "(" | "[" | "|" | "||" | "-" | "!" | "*" | "&" | "&&" | ".." | "..=" => true,
            _ => false,
        },
        TokenKind::Keyword(keyword) => !matches!(
            keyword,
            Keyword::As
                | Keyword::Else
                | Keyword::In
                | Keyword::Fn
                | Keyword::Struct
                | Keyword::Use
                | Keyword::Mod
                | Keyword::Pub
                | Keyword::Let
                | Keyword::Const
                | Keyword::Static
                | Keyword::Mut
        ),
        _ => true,
    }
}

fn parse_unary(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    let op = if input.match_symbol("-") {
        Some(UnOp::Neg)
    } else if input.match_symbol("!") {
        Some(UnOp::Not)
    } else if input.match_symbol("*") {
        Some(UnOp::Deref)
    } else {
        None
    };
    if let Some(op) = op {
        let operand = parse_unary_operand(input)?;
        let span = input.since(start);
        // fold negative literals so `-9223372036854775808` stays representable
        if let (UnOp::Neg, ExprKind::Lit(lit)) = (op, &operand.kind) {
            match lit {
                Lit::Int(v) => return Ok(Expr::new(ExprKind::Lit(Lit::Int(v.wrapping_neg())), span)),
                Lit::Float(v) => return Ok(Expr::new(ExprKind::Lit(Lit::Float(-v)), span)),
                _ => {}
            }
        }
        return Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
            span,
        ));
    }
    if input.peek_symbol("&") || input.peek_symbol("&&") {
        let double = input.peek_symbol("&&");
        input.advance();
        let mutable = input.match_keyword(Keyword::Mut);
        let operand = parse_unary_operand(input)?;
        let mut expr = Expr::new(
            ExprKind::Ref {
                mutable,
                expr: Box::new(operand),
            },
            input.since(start),
        );
        if double {
            expr = Expr::new(
                ExprKind::Ref {
                    mutable: false,
                    expr: Box::new(expr),
                },
                input.since(start),
            );
        }
        return Ok(expr);
    }
    if input.peek_symbol("..") || input.peek_symbol("..=") {
        let inclusive = input.match_symbol("..=");
        if !inclusive {
            input.advance();
        }
        let end = if can_start_expr(input) {
            Some(Box::new(parse_expr_prec(input, 5)?))
        } else {
            None
        };
        return Ok(Expr::new(
            ExprKind::Range {
                start: None,
                end,
                inclusive,
            },
            input.since(start),
        ));
    }
    let primary = parse_primary(input)?;
    parse_postfix(input, primary)
}

fn parse_unary_operand(input: &mut TokenStream) -> PResult<Expr> {
    input.enter()?;
    let operand = parse_unary(input)?;
    input.leave();
    Ok(operand)
}

fn parse_postfix(input: &mut TokenStream, mut expr: Expr) -> PResult<Expr> {
    loop {
        let start = expr.span;
        if input.peek_symbol("(") {
            let args = parse_call_args(input)?;
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                input.since(start),
            );
        } else if input.match_symbol(".") {
            if input.peek().is_some_and(|t| t.kind == TokenKind::Int) {
                return Err(ParseError::new("tuple fields are not supported", input.span()));
            }
            let name = input.expect_ident()?;
            if input.peek_symbol("::") {
                input.advance();
                skip_generic_args(input)?;
            }
            if input.peek_symbol("(") {
                let args = parse_call_args(input)?;
                expr = Expr::new(
                    ExprKind::MethodCall {
                        receiver: Box::new(expr),
                        method: name,
                        args,
                    },
                    input.since(start),
                );
            } else {
                expr = Expr::new(
                    ExprKind::Field {
                        base: Box::new(expr),
                        field: name,
                    },
                    input.since(start),
                );
            }
        } else if input.match_symbol("[") {
            let index = input.with_no_struct(false, parse_expr)?;
            input.expect_symbol("]")?;
            expr = Expr::new(
                ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                input.since(start),
            );
        } else if input.peek_symbol("?") {
            return Err(ParseError::new("the `?` operator is not supported", input.span()));
        } else {
            return Ok(expr);
        }
    }
}

/// `<T, U>` after a turbofish `::`; the types are checked for syntax and dropped.
fn skip_generic_args(input: &mut TokenStream) -> PResult<()> {
    input.expect_symbol("<")?;
    loop {
        parse_type(input)?;
        if !input.match_symbol(",") {
            break;
        }
    }
    input.expect_symbol(">")
}

fn parse_call_args(input: &mut TokenStream) -> PResult<Vec<Expr>> {
    input.expect_symbol("(")?;
    input.with_no_struct(false, |input| {
        let mut args = Vec::new();
        while !input.match_symbol(")") {
            args.push(parse_expr(input)?);
            if !input.match_symbol(",") {
                input.expect_symbol(")")?;
                break;
            }
        }
        Ok(args)
    })
}

fn parse_primary(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    let Some(token) = input.peek().cloned() else {
        return Err(input.unexpected("an expression"));
    };
    match token.kind {
        TokenKind::Int | TokenKind::Float | TokenKind::Str | TokenKind::Char => {
            input.advance();
            let lit = literal_from_token(&token)?;
            Ok(Expr::new(ExprKind::Lit(lit), start))
        }
        TokenKind::Keyword(Keyword::True) => {
            input.advance();
            Ok(Expr::new(ExprKind::Lit(Lit::Bool(true)), start))
        }
        TokenKind::Keyword(Keyword::False) => {
            input.advance();
            Ok(Expr::new(ExprKind::Lit(Lit::Bool(false)), start))
        }
        TokenKind::Keyword(Keyword::If) => parse_if(input),
        TokenKind::Keyword(Keyword::While) => parse_while(input),
        TokenKind::Keyword(Keyword::Loop) => parse_loop(input),
        TokenKind::Keyword(Keyword::For) => parse_for(input),
        TokenKind::Keyword(Keyword::Match) => parse_match(input),
        TokenKind::Keyword(Keyword::Return) => {
            input.advance();
            let value = parse_optional_operand(input)?;
            Ok(Expr::new(ExprKind::Return(value), input.since(start)))
        }
        TokenKind::Keyword(Keyword::Break) => {
            input.advance();
            let value = parse_optional_operand(input)?;
            Ok(Expr::new(ExprKind::Break(value), input.since(start)))
        }
        TokenKind::Keyword(Keyword::Continue) => {
            input.advance();
            Ok(Expr::new(ExprKind::Continue, start))
        }
        TokenKind::Symbol => match token.lexeme.as_str() {
            "(" => parse_paren(input),
            "[" => parse_array(input),
            "{" => {
                let block = parse_block(input)?;
                let span = block.span;
                Ok(Expr::new(ExprKind::Block(block), span))
            }
            "|" | "||" => parse_closure(input),
            _ => Err(input.unexpected("an expression")),
        },
        TokenKind::Ident => {
            let closure_follows = input
                .peek_nth(1)
                .is_some_and(|t| t.is_symbol("|") || t.is_symbol("||"));
            if token.lexeme == "move" && closure_follows {
                input.advance();
                return parse_closure(input);
            }
            parse_path_expr(input)
        }
        TokenKind::Keyword(_) => Err(input.unexpected("an expression")),
    }
}

fn parse_optional_operand(input: &mut TokenStream) -> PResult<Option<Box<Expr>>> {
    if can_start_expr(input) {
        Ok(Some(Box::new(parse_expr(input)?)))
    } else {
        Ok(None)
    }
}

fn literal_from_token(token: &Token) -> PResult<Lit> {
    match token.kind {
        TokenKind::Int => parse_int_literal(&token.lexeme)
            .map(Lit::Int)
            .ok_or_else(|| ParseError::new(format!("invalid integer literal `{}`", token.lexeme), token.span)),
        TokenKind::Float => parse_float_literal(&token.lexeme)
            .map(Lit::Float)
            .ok_or_else(|| ParseError::new(format!("invalid float literal `{}`", token.lexeme), token.span)),
        TokenKind::Str => Ok(Lit::Str(token.lexeme.clone())),
        TokenKind::Char => token
            .lexeme
            .chars()
            .next()
            .map(Lit::Char)
            .ok_or_else(|| ParseError::new("empty character literal", token.span)),
        TokenKind::Keyword(Keyword::True) => Ok(Lit::Bool(true)),
        TokenKind::Keyword(Keyword::False) => Ok(Lit::Bool(false)),
        _ => Err(ParseError::new(
            format!("expected a literal, found `{}`", token.lexeme),
            token.span,
        )),
    }
}

fn parse_paren(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_symbol("(")?;
    if input.match_symbol(")") {
        return Ok(Expr::new(ExprKind::Lit(Lit::Unit), input.since(start)));
    }
    let inner = input.with_no_struct(false, parse_expr)?;
    if input.peek_symbol(",") {
        return Err(ParseError::new("tuples are not supported", input.span()));
    }
    input.expect_symbol(")")?;
    Ok(Expr::new(inner.kind, input.since(start)))
}

fn parse_array(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_symbol("[")?;
    let kind = input.with_no_struct(false, |input| parse_array_body(input, "]"))?;
    Ok(Expr::new(kind, input.since(start)))
}

/// Elements after the opening bracket, up to and including `close`.
fn parse_array_body(input: &mut TokenStream, close: &str) -> PResult<ExprKind> {
    if input.match_symbol(close) {
        return Ok(ExprKind::Array(Vec::new()));
    }
    let first = parse_expr(input)?;
    if input.match_symbol(";") {
        let count = parse_expr(input)?;
        input.expect_symbol(close)?;
        return Ok(ExprKind::ArrayRepeat {
            value: Box::new(first),
            count: Box::new(count),
        });
    }
    let mut elems = vec![first];
    while input.match_symbol(",") {
        if input.peek_symbol(close) {
            break;
        }
        elems.push(parse_expr(input)?);
    }
    input.expect_symbol(close)?;
    Ok(ExprKind::Array(elems))
}

fn parse_path_expr(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    let mut segments = vec![input.expect_ident()?];
    while input.peek_symbol("::") {
        input.advance();
        if input.peek_symbol("<") {
            skip_generic_args(input)?;
            if !input.peek_symbol("::") {
                break;
            }
            continue;
        }
        segments.push(input.expect_ident()?);
    }
    let path = Path {
        segments,
        span: input.since(start),
    };

    let macro_follows = input.peek_symbol("!")
        && input
            .peek_nth(1)
            .is_some_and(|t| t.is_symbol("(") || t.is_symbol("[") || t.is_symbol("{"));
    if path.is_single() && macro_follows {
        return parse_macro(input, path);
    }
    if !input.no_struct && input.peek_symbol("{") {
        return parse_struct_literal(input, path);
    }
    let span = path.span;
    Ok(Expr::new(ExprKind::Path(path), span))
}

fn parse_struct_literal(input: &mut TokenStream, path: Path) -> PResult<Expr> {
    let start = path.span;
    input.expect_symbol("{")?;
    let fields = input.with_no_struct(false, |input| {
        let mut fields = Vec::new();
        while !input.match_symbol("}") {
            if input.peek_symbol("..") {
                return Err(ParseError::new(
                    "struct update syntax is not supported",
                    input.span(),
                ));
            }
            let field_start = input.span();
            let name = input.expect_ident()?;
            let value = if input.match_symbol(":") {
                parse_expr(input)?
            } else {
                // shorthand `Foo { name }`
                Expr::new(
                    ExprKind::Path(Path {
                        segments: vec![name.clone()],
                        span: field_start,
                    }),
                    field_start,
                )
            };
            fields.push((name, value));
            if !input.match_symbol(",") {
                input.expect_symbol("}")?;
                break;
            }
        }
        Ok(fields)
    })?;
    Ok(Expr::new(ExprKind::Struct { path, fields }, input.since(start)))
}

fn parse_macro(input: &mut TokenStream, path: Path) -> PResult<Expr> {
    let start = path.span;
    let name = path.last().to_string();
    if !KNOWN_MACROS.contains(&name.as_str()) {
        return Err(ParseError::new(format!("unknown macro `{name}!`"), start));
    }
    input.expect_symbol("!")?;
    let close = match input.advance() {
        Some(t) if t.is_symbol("(") => ")",
        Some(t) if t.is_symbol("[") => "]",
        _ => "}",
    };
    if name == "vec" {
        let kind = input.with_no_struct(false, |input| parse_array_body(input, close))?;
        return Ok(Expr::new(kind, input.since(start)));
    }
    let args = input.with_no_struct(false, |input| {
        let mut args = Vec::new();
        while !input.match_symbol(close) {
            let named = input.peek().is_some_and(|t| t.kind == TokenKind::Ident)
                && input.peek_nth(1).is_some_and(|t| t.is_symbol("="));
            let name = if named {
                let name = input.expect_ident()?;
                input.advance();
                Some(name)
            } else {
                None
            };
            let value = parse_expr(input)?;
            args.push(MacroArg { name, value });
            if !input.match_symbol(",") {
                input.expect_symbol(close)?;
                break;
            }
        }
        Ok(args)
    })?;
    Ok(Expr::new(
        ExprKind::Macro(MacroCall { name, args }),
        input.since(start),
    ))
}

fn parse_closure(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    let mut params = Vec::new();
    if !input.match_symbol("||") {
        input.expect_symbol("|")?;
        while !input.match_symbol("|") {
            params.push(parse_param(input)?);
            if !input.match_symbol(",") {
                input.expect_symbol("|")?;
                break;
            }
        }
    }
    let ret = if input.match_symbol("->") {
        Some(parse_type(input)?)
    } else {
        None
    };
    let body = if ret.is_some() {
        let block = parse_block(input)?;
        let span = block.span;
        Expr::new(ExprKind::Block(block), span)
    } else {
        input.with_no_struct(false, parse_expr)?
    };
    let span = input.since(start);
    Ok(Expr::new(
        ExprKind::Closure(Arc::new(ClosureExpr {
            params,
            ret,
            body,
            span,
        })),
        span,
    ))
}

fn parse_head(input: &mut TokenStream) -> PResult<Expr> {
    input.with_no_struct(true, parse_expr)
}

fn parse_if(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_keyword(Keyword::If)?;
    if input.peek_keyword(Keyword::Let) {
        return Err(ParseError::new("`if let` is not supported; use `match`", input.span()));
    }
    let cond = parse_head(input)?;
    let then = parse_block(input)?;
    let els = if input.match_keyword(Keyword::Else) {
        if input.peek_keyword(Keyword::If) {
            Some(Box::new(parse_if(input)?))
        } else {
            let block = parse_block(input)?;
            let span = block.span;
            Some(Box::new(Expr::new(ExprKind::Block(block), span)))
        }
    } else {
        None
    };
    Ok(Expr::new(
        ExprKind::If {
            cond: Box::new(cond),
            then,
            els,
        },
        input.since(start),
    ))
}

fn parse_while(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_keyword(Keyword::While)?;
    if input.peek_keyword(Keyword::Let) {
        return Err(ParseError::new("`while let` is not supported", input.span()));
    }
    let cond = parse_head(input)?;
    let body = parse_block(input)?;
    Ok(Expr::new(
        ExprKind::While {
            cond: Box::new(cond),
            body,
        },
        input.since(start),
    ))
}

fn parse_loop(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_keyword(Keyword::Loop)?;
    let body = parse_block(input)?;
    Ok(Expr::new(ExprKind::Loop { body }, input.since(start)))
}

fn parse_for(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_keyword(Keyword::For)?;
    input.match_keyword(Keyword::Mut);
    let binding = input.expect_ident()?;
    input.expect_keyword(Keyword::In)?;
    let iter = parse_head(input)?;
    let body = parse_block(input)?;
    Ok(Expr::new(
        ExprKind::For {
            binding,
            iter: Box::new(iter),
            body,
        },
        input.since(start),
    ))
}

fn parse_match(input: &mut TokenStream) -> PResult<Expr> {
    let start = input.span();
    input.expect_keyword(Keyword::Match)?;
    let scrutinee = parse_head(input)?;
    input.expect_symbol("{")?;
    input.enter()?;
    let arms = input.with_no_struct(false, |input| {
        let mut arms = Vec::new();
        while !input.match_symbol("}") {
            let arm_start = input.span();
            let pattern = parse_pattern(input)?;
            let guard = if input.match_keyword(Keyword::If) {
                Some(parse_expr(input)?)
            } else {
                None
            };
            input.expect_symbol("=>")?;
            let body = parse_expr_stmt(input)?;
            let needs_comma = !body.is_block_like();
            arms.push(MatchArm {
                pattern,
                guard,
                body,
                span: input.since(arm_start),
            });
            if !input.match_symbol(",") {
                if input.match_symbol("}") {
                    break;
                }
                if needs_comma {
                    return Err(input.unexpected("`,` or `}`"));
                }
            }
        }
        Ok(arms)
    })?;
    input.leave();
    Ok(Expr::new(
        ExprKind::Match {
            scrutinee: Box::new(scrutinee),
            arms,
        },
        input.since(start),
    ))
}

fn parse_pattern(input: &mut TokenStream) -> PResult<Pattern> {
    input.match_symbol("|");
    let first = parse_pattern_atom(input)?;
    if !input.peek_symbol("|") {
        return Ok(first);
    }
    let mut alternatives = vec![first];
    while input.match_symbol("|") {
        alternatives.push(parse_pattern_atom(input)?);
    }
    Ok(Pattern::Or(alternatives))
}

fn parse_pattern_atom(input: &mut TokenStream) -> PResult<Pattern> {
    if input.peek_ident("_") {
        input.advance();
        return Ok(Pattern::Wildcard);
    }
    let mutable = input.match_keyword(Keyword::Mut);
    if let Some(token) = input.peek().filter(|t| t.kind == TokenKind::Ident).cloned() {
        let unsupported = input
            .peek_nth(1)
            .is_some_and(|t| t.is_symbol("::") || t.is_symbol("(") || t.is_symbol("{"));
        if unsupported {
            return Err(ParseError::new(
                "only literal, range, wildcard and binding patterns are supported",
                token.span,
            ));
        }
        input.advance();
        return Ok(Pattern::Binding(token.lexeme));
    }
    if mutable {
        return Err(input.unexpected("a binding name"));
    }
    let start = parse_pattern_lit(input)?;
    if input.peek_symbol("..") || input.peek_symbol("..=") {
        let inclusive = input.match_symbol("..=");
        if !inclusive {
            input.advance();
        }
        let end = parse_pattern_lit(input)?;
        return Ok(Pattern::Range {
            start,
            end,
            inclusive,
        });
    }
    Ok(Pattern::Lit(start))
}

fn parse_pattern_lit(input: &mut TokenStream) -> PResult<Lit> {
    let negative = input.match_symbol("-");
    let Some(token) = input.advance() else {
        return Err(input.unexpected("a pattern"));
    };
    let lit = literal_from_token(&token)?;
    match (negative, lit) {
        (false, lit) => Ok(lit),
        (true, Lit::Int(v)) => Ok(Lit::Int(v.wrapping_neg())),
        (true, Lit::Float(v)) => Ok(Lit::Float(-v)),
        (true, _) => Err(ParseError::new("only numbers can be negated in patterns", token.span)),
    }
}

fn starts_block_like(input: &TokenStream) -> bool {
    input.peek_symbol("{")
        || [Keyword::If, Keyword::While, Keyword::Loop, Keyword::For, Keyword::Match]
            .into_iter()
            .any(|keyword| input.peek_keyword(keyword))
}

/// An expression in statement position. Block-like expressions end the statement unless a
/// method call follows.
fn parse_expr_stmt(input: &mut TokenStream) -> PResult<Expr> {
    if starts_block_like(input) {
        let expr = parse_primary(input)?;
        if input.peek_symbol(".") {
            let expr = parse_postfix(input, expr)?;
            return parse_infix(input, expr, 0);
        }
        return Ok(expr);
    }
    parse_expr(input)
}

fn starts_item(input: &TokenStream) -> bool {
    [
        Keyword::Fn,
        Keyword::Struct,
        Keyword::Use,
        Keyword::Mod,
        Keyword::Const,
        Keyword::Static,
        Keyword::Pub,
    ]
    .into_iter()
    .any(|keyword| input.peek_keyword(keyword))
}

fn parse_let(input: &mut TokenStream) -> PResult<LetStmt> {
    let start = input.span();
    input.expect_keyword(Keyword::Let)?;
    let mutable = input.match_keyword(Keyword::Mut);
    if input.peek_symbol("(") {
        return Err(ParseError::new("tuple patterns are not supported", input.span()));
    }
    let name = input.expect_ident()?;
    let ty = if input.match_symbol(":") {
        Some(parse_type(input)?)
    } else {
        None
    };
    let init = if input.match_symbol("=") {
        Some(parse_expr(input)?)
    } else {
        None
    };
    if input.peek_keyword(Keyword::Else) {
        return Err(ParseError::new("`let ... else` is not supported", input.span()));
    }
    input.expect_symbol(";")?;
    Ok(LetStmt {
        name,
        mutable,
        ty,
        init,
        span: input.since(start),
    })
}

pub(crate) fn parse_block(input: &mut TokenStream) -> PResult<Block> {
    let start = input.span();
    input.expect_symbol("{")?;
    input.enter()?;
    let block = input.with_no_struct(false, |input| parse_block_body(input, start))?;
    input.leave();
    Ok(block)
}

fn parse_block_body(input: &mut TokenStream, start: Span) -> PResult<Block> {
    let mut stmts = Vec::new();
    let mut tail = None;
    loop {
        if input.match_symbol("}") {
            break;
        }
        if input.match_symbol(";") {
            continue;
        }
        if input.peek_keyword(Keyword::Let) {
            stmts.push(Stmt::Let(parse_let(input)?));
            continue;
        }
        if starts_item(input) {
            return Err(ParseError::new(
                "items can only be declared at module level",
                input.span(),
            ));
        }
        let expr = parse_expr_stmt(input)?;
        if input.match_symbol(";") {
            stmts.push(Stmt::Semi(expr));
        } else if input.match_symbol("}") {
            tail = Some(Box::new(expr));
            break;
        } else if expr.is_block_like() {
            stmts.push(Stmt::Expr(expr));
        } else {
            return Err(input.unexpected("`;` or `}`"));
        }
    }
    Ok(Block {
        stmts,
        tail,
        span: input.since(start),
    })
}

/// A statement at the top level of a script or module.
pub(crate) fn parse_stmt(input: &mut TokenStream) -> PResult<Stmt> {
    if input.peek_keyword(Keyword::Let) {
        return Ok(Stmt::Let(parse_let(input)?));
    }
    let expr = parse_expr_stmt(input)?;
    if input.match_symbol(";") {
        return Ok(Stmt::Semi(expr));
    }
    if expr.is_block_like() || input.is_eof() {
        return Ok(Stmt::Expr(expr));
    }
    Err(input.unexpected("`;`"))
}

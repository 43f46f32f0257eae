use super::expr::{parse_block, parse_expr, parse_stmt};
use super::{PResult, ParseError, TokenStream};
use crate::ast::{
    ConstDecl, FieldDecl, FnDecl, Item, ItemKind, ModDecl, Param, StructDecl, TypeExpr, TypeKind,
    UseImport,
};
use crate::lexer::{Keyword, TokenKind};
use std::sync::Arc;

/// Items until end of input, or until the closing `}` of an inline module.
pub(crate) fn parse_items(input: &mut TokenStream, in_mod: bool) -> PResult<Vec<Item>> {
    let mut items = Vec::new();
    loop {
        if input.is_eof() {
            if in_mod {
                return Err(input.unexpected("`}`"));
            }
            break;
        }
        if in_mod && input.peek_symbol("}") {
            break;
        }
        if input.match_symbol(";") {
            continue;
        }
        items.push(parse_item(input)?);
    }
    Ok(items)
}

fn parse_item(input: &mut TokenStream) -> PResult<Item> {
    skip_attributes(input)?;
    let start = input.span();
    let public = parse_visibility(input)?;

    let kind = if input.match_keyword(Keyword::Use) {
        ItemKind::Use(parse_use_item(input)?)
    } else if input.match_keyword(Keyword::Fn) {
        ItemKind::Fn(Arc::new(parse_fn_item(input, start)?))
    } else if input.match_keyword(Keyword::Struct) {
        ItemKind::Struct(parse_struct_item(input)?)
    } else if input.match_keyword(Keyword::Const) || input.match_keyword(Keyword::Static) {
        input.match_keyword(Keyword::Mut);
        ItemKind::Const(parse_const_item(input)?)
    } else if input.match_keyword(Keyword::Mod) {
        ItemKind::Mod(parse_mod_item(input)?)
    } else if public {
        return Err(input.unexpected("an item after `pub`"));
    } else {
        ItemKind::Stmt(parse_stmt(input)?)
    };
    Ok(Item {
        kind,
        span: input.since(start),
    })
}

/// `#[...]` and `#![...]` are accepted and ignored.
fn skip_attributes(input: &mut TokenStream) -> PResult<()> {
    while input.peek_symbol("#") {
        input.advance();
        input.match_symbol("!");
        input.expect_symbol("[")?;
        let mut depth = 1usize;
        while depth > 0 {
            let Some(token) = input.advance() else {
                return Err(input.unexpected("`]`"));
            };
            if token.is_symbol("[") {
                depth += 1;
            } else if token.is_symbol("]") {
                depth -= 1;
            }
        }
    }
    Ok(())
}

fn parse_visibility(input: &mut TokenStream) -> PResult<bool> {
    if !input.match_keyword(Keyword::Pub) {
        return Ok(false);
    }
    if input.match_symbol("(") {
        // pub(crate), pub(super), pub(in path)
        while !input.match_symbol(")") {
            if input.advance().is_none() {
                return Err(input.unexpected("`)`"));
            }
        }
    }
    Ok(true)
}

fn parse_use_item(input: &mut TokenStream) -> PResult<Vec<UseImport>> {
    let mut imports = Vec::new();
    input.match_symbol("::");
    parse_use_tree(input, Vec::new(), &mut imports)?;
    input.expect_symbol(";")?;
    Ok(imports)
}

fn parse_use_tree(
    input: &mut TokenStream,
    mut prefix: Vec<String>,
    out: &mut Vec<UseImport>,
) -> PResult<()> {
    let start = input.span();
    loop {
        if input.match_symbol("*") {
            out.push(UseImport {
                path: prefix,
                alias: None,
                glob: true,
                span: input.since(start),
            });
            return Ok(());
        }
        if input.match_symbol("{") {
            input.enter()?;
            loop {
                if input.match_symbol("}") {
                    break;
                }
                parse_use_tree(input, prefix.clone(), out)?;
                if !input.match_symbol(",") {
                    input.expect_symbol("}")?;
                    break;
                }
            }
            input.leave();
            return Ok(());
        }
        prefix.push(input.expect_ident()?);
        if !input.match_symbol("::") {
            break;
        }
    }
    // `use a::{self}` imports `a`
    if prefix.len() > 1 && prefix.last().is_some_and(|s| s == "self") {
        prefix.pop();
    }
    let alias = if input.match_keyword(Keyword::As) {
        Some(input.expect_ident()?)
    } else {
        None
    };
    out.push(UseImport {
        path: prefix,
        alias,
        glob: false,
        span: input.since(start),
    });
    Ok(())
}

fn parse_fn_item(input: &mut TokenStream, start: hf_core::Span) -> PResult<FnDecl> {
    let name = input.expect_ident()?;
    input.expect_symbol("(")?;
    let mut params = Vec::new();
    while !input.match_symbol(")") {
        let param = parse_param(input)?;
        if param.ty.is_none() {
            return Err(ParseError::new(
                format!("parameter `{}` of `{}` needs a type", param.name, name),
                param.span,
            ));
        }
        params.push(param);
        if !input.match_symbol(",") {
            input.expect_symbol(")")?;
            break;
        }
    }
    let ret = if input.match_symbol("->") {
        Some(parse_type(input)?)
    } else {
        None
    };
    let body = parse_block(input)?;
    Ok(FnDecl {
        name,
        params,
        ret,
        body,
        span: input.since(start),
    })
}

/// `[mut] name [: Type]`, shared by functions and closures.
pub(crate) fn parse_param(input: &mut TokenStream) -> PResult<Param> {
    let start = input.span();
    let mutable = input.match_keyword(Keyword::Mut);
    let name = input.expect_ident()?;
    let ty = if input.match_symbol(":") {
        Some(parse_type(input)?)
    } else {
        None
    };
    Ok(Param {
        name,
        mutable,
        ty,
        span: input.since(start),
    })
}

fn parse_struct_item(input: &mut TokenStream) -> PResult<StructDecl> {
    let name = input.expect_ident()?;
    if input.match_symbol(";") {
        return Ok(StructDecl {
            name,
            fields: Vec::new(),
        });
    }
    if input.peek_symbol("(") {
        return Err(ParseError::new(
            "tuple structs are not supported; use named fields",
            input.span(),
        ));
    }
    input.expect_symbol("{")?;
    let mut fields = Vec::new();
    while !input.match_symbol("}") {
        skip_attributes(input)?;
        parse_visibility(input)?;
        let field = input.expect_ident()?;
        input.expect_symbol(":")?;
        let ty = parse_type(input)?;
        fields.push(FieldDecl { name: field, ty });
        if !input.match_symbol(",") {
            input.expect_symbol("}")?;
            break;
        }
    }
    Ok(StructDecl { name, fields })
}

fn parse_const_item(input: &mut TokenStream) -> PResult<ConstDecl> {
    let name = input.expect_ident()?;
    let ty = if input.match_symbol(":") {
        Some(parse_type(input)?)
    } else {
        None
    };
    input.expect_symbol("=")?;
    let value = parse_expr(input)?;
    input.expect_symbol(";")?;
    Ok(ConstDecl { name, ty, value })
}

fn parse_mod_item(input: &mut TokenStream) -> PResult<ModDecl> {
    let name = input.expect_ident()?;
    if input.peek_symbol(";") {
        return Err(ParseError::new(
            format!("module `{name}` must be inline; file modules are not supported"),
            input.span(),
        ));
    }
    input.expect_symbol("{")?;
    input.enter()?;
    let items = parse_items(input, true)?;
    input.leave();
    input.expect_symbol("}")?;
    Ok(ModDecl { name, items })
}

pub(crate) fn parse_type(input: &mut TokenStream) -> PResult<TypeExpr> {
    input.enter()?;
    let start = input.span();
    let kind = parse_type_kind(input)?;
    input.leave();
    Ok(TypeExpr {
        kind,
        span: input.since(start),
    })
}

fn parse_type_kind(input: &mut TokenStream) -> PResult<TypeKind> {
    if input.match_symbol("&") {
        input.match_keyword(Keyword::Mut);
        return Ok(TypeKind::Ref(Box::new(parse_type(input)?)));
    }
    if input.match_symbol("&&") {
        input.match_keyword(Keyword::Mut);
        let inner = parse_type(input)?;
        let span = inner.span;
        let once = TypeExpr {
            kind: TypeKind::Ref(Box::new(inner)),
            span,
        };
        return Ok(TypeKind::Ref(Box::new(once)));
    }
    if input.match_symbol("(") {
        if input.match_symbol(")") {
            return Ok(TypeKind::Unit);
        }
        let inner = parse_type(input)?;
        if input.peek_symbol(",") {
            return Err(ParseError::new("tuple types are not supported", input.span()));
        }
        input.expect_symbol(")")?;
        return Ok(inner.kind);
    }
    if input.match_symbol("[") {
        let elem = parse_type(input)?;
        if input.match_symbol(";") {
            parse_expr(input)?;
        }
        input.expect_symbol("]")?;
        return Ok(TypeKind::Slice(Box::new(elem)));
    }
    if input.match_keyword(Keyword::Fn) {
        return parse_fn_type(input);
    }
    if input.peek_ident("_") {
        input.advance();
        return Ok(TypeKind::Infer);
    }
    // `impl Fn(A) -> R` and `dyn Fn(A) -> R` are plain function types here
    if input.peek_ident("impl") || input.peek_ident("dyn") {
        input.advance();
    }
    if input
        .peek()
        .is_some_and(|t| t.kind == TokenKind::Ident && matches!(t.lexeme.as_str(), "Fn" | "FnMut" | "FnOnce"))
        && input.peek_nth(1).is_some_and(|t| t.is_symbol("("))
    {
        input.advance();
        return parse_fn_type(input);
    }

    let mut segments = vec![input.expect_ident()?];
    while input.match_symbol("::") {
        segments.push(input.expect_ident()?);
    }
    let mut generics = Vec::new();
    if input.match_symbol("<") {
        loop {
            generics.push(parse_type(input)?);
            if !input.match_symbol(",") {
                break;
            }
            if input.peek_symbol(">") || input.peek_symbol(">>") {
                break;
            }
        }
        input.expect_symbol(">")?;
    }
    Ok(TypeKind::Path { segments, generics })
}

/// After `fn` or `Fn`: `(A, B) -> R`.
fn parse_fn_type(input: &mut TokenStream) -> PResult<TypeKind> {
    input.expect_symbol("(")?;
    let mut params = Vec::new();
    while !input.match_symbol(")") {
        params.push(parse_type(input)?);
        if !input.match_symbol(",") {
            input.expect_symbol(")")?;
            break;
        }
    }
    let ret = if input.match_symbol("->") {
        Some(Box::new(parse_type(input)?))
    } else {
        None
    };
    Ok(TypeKind::Fn { params, ret })
}

use winnow::combinator::{alt, cut_err, opt, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, take_till, take_until, take_while};
use winnow::{ModalResult, Parser};

pub(crate) const MULTI_PUNCT: &[&str] = &[
    "<<=", ">>=", "..=", "...", "::", "=>", "->", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "..",
];
pub(crate) const SINGLE_PUNCT: &str = "=+-*/%&|^!~@#$?:;,.()[]{}<>";

pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    repeat::<_, _, (), _, _>(0.., alt((whitespace, line_comment, block_comment)))
        .parse_next(input)?;
    Ok(())
}

pub(crate) fn whitespace(input: &mut &str) -> ModalResult<()> {
    take_while(1.., char::is_whitespace)
        .map(|_| ())
        .parse_next(input)
}

pub(crate) fn line_comment(input: &mut &str) -> ModalResult<()> {
    literal("//").parse_next(input)?;
    take_till(0.., |c: char| c == '\n').parse_next(input)?;
    opt(literal("\n")).parse_next(input)?;
    Ok(())
}

pub(crate) fn block_comment(input: &mut &str) -> ModalResult<()> {
    literal("/*").parse_next(input)?;
    cut_err(take_until(0.., "*/")).parse_next(input)?;
    literal("*/").parse_next(input)?;
    Ok(())
}

/// Consume a `"..."` literal and return its body with escapes still in place.
pub(crate) fn parse_cooked_string_literal<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let slice = *input;
    if !slice.starts_with('"') {
        return Err(backtrack_err());
    }
    let bytes = slice.as_bytes();
    let mut idx = 1;
    let mut escape = false;
    while idx < bytes.len() {
        let b = bytes[idx];
        idx += 1;
        if b == b'\\' && !escape {
            escape = true;
            continue;
        }
        if b == b'"' && !escape {
            *input = &slice[idx..];
            return Ok(&slice[1..idx - 1]);
        }
        escape = false;
    }
    Err(ErrMode::Cut(ContextError::new()))
}

/// Consume `r"..."` / `r#"..."#` and return the body.
pub(crate) fn parse_raw_string_literal<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let slice = *input;
    if !slice.starts_with('r') {
        return Err(backtrack_err());
    }
    let bytes = slice.as_bytes();
    let mut idx = 1;
    let mut hashes = 0usize;
    while idx < bytes.len() && bytes[idx] == b'#' {
        hashes += 1;
        idx += 1;
    }
    if idx >= bytes.len() || bytes[idx] != b'"' {
        return Err(backtrack_err());
    }
    idx += 1; // opening quote
    let body_start = idx;
    let mut cursor = idx;
    while cursor < bytes.len() {
        if bytes[cursor] == b'"' && matches_hashes(bytes, cursor + 1, hashes) {
            let end = cursor + 1 + hashes;
            *input = &slice[end..];
            return Ok(&slice[body_start..cursor]);
        }
        cursor += 1;
    }
    Err(ErrMode::Cut(ContextError::new()))
}

/// Consume a `'c'` literal and return its body with escapes still in place.
pub(crate) fn parse_char_literal<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let slice = *input;
    if !slice.starts_with('\'') {
        return Err(backtrack_err());
    }
    let rest = &slice[1..];
    let body_len = if let Some(escaped) = rest.strip_prefix('\\') {
        if escaped.starts_with("u{") {
            match escaped.find('}') {
                Some(close) => 1 + close + 1,
                None => return Err(ErrMode::Cut(ContextError::new())),
            }
        } else {
            match escaped.chars().next() {
                Some(c) => 1 + c.len_utf8(),
                None => return Err(ErrMode::Cut(ContextError::new())),
            }
        }
    } else {
        match rest.chars().next() {
            Some(c) if c != '\'' => c.len_utf8(),
            _ => return Err(ErrMode::Cut(ContextError::new())),
        }
    };
    if !rest[body_len..].starts_with('\'') {
        return Err(ErrMode::Cut(ContextError::new()));
    }
    *input = &rest[body_len + 1..];
    Ok(&rest[..body_len])
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

pub(crate) fn backtrack_err() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}

fn matches_hashes(bytes: &[u8], start: usize, count: usize) -> bool {
    if start + count > bytes.len() {
        return false;
    }
    bytes[start..start + count].iter().all(|b| *b == b'#')
}

/// Resolve backslash escapes in a string or char literal body.
pub fn unescape(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err("expected `{` after `\\u`".to_string());
                }
                let mut hex = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_hexdigit() || d == '_' => {
                            if d != '_' {
                                hex.push(d)
                            }
                        }
                        _ => return Err("malformed unicode escape".to_string()),
                    }
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| "malformed unicode escape".to_string())?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("invalid unicode scalar {code:#x}"))?;
                out.push(ch);
            }
            Some(other) => return Err(format!("unknown escape `\\{other}`")),
            None => return Err("dangling backslash".to_string()),
        }
    }
    Ok(out)
}

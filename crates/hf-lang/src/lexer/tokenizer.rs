use super::winnow::{
    backtrack_err, is_ident_continue, is_ident_start, parse_char_literal,
    parse_cooked_string_literal, parse_raw_string_literal, unescape, ws, MULTI_PUNCT,
    SINGLE_PUNCT,
};
use hf_core::Span;
use thiserror::Error;
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, one_of, take_while};
use winnow::{ModalResult, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    As,
    Break,
    Const,
    Continue,
    Else,
    False,
    Fn,
    For,
    If,
    In,
    Let,
    Loop,
    Match,
    Mod,
    Mut,
    Pub,
    Return,
    Static,
    Struct,
    True,
    Use,
    While,
}

impl Keyword {
    fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "as" => Some(Self::As),
            "break" => Some(Self::Break),
            "const" => Some(Self::Const),
            "continue" => Some(Self::Continue),
            "else" => Some(Self::Else),
            "false" => Some(Self::False),
            "fn" => Some(Self::Fn),
            "for" => Some(Self::For),
            "if" => Some(Self::If),
            "in" => Some(Self::In),
            "let" => Some(Self::Let),
            "loop" => Some(Self::Loop),
            "match" => Some(Self::Match),
            "mod" => Some(Self::Mod),
            "mut" => Some(Self::Mut),
            "pub" => Some(Self::Pub),
            "return" => Some(Self::Return),
            "static" => Some(Self::Static),
            "struct" => Some(Self::Struct),
            "true" => Some(Self::True),
            "use" => Some(Self::Use),
            "while" => Some(Self::While),
            _ => None,
        }
    }
}

/// A token. For string and char literals `lexeme` holds the unescaped value; for every
/// other kind it is the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.lexeme == symbol
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Str,
    Char,
    Symbol,
    Keyword(Keyword),
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

/// Byte offset to line and column translation.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { source, starts }
    }

    fn span(&self, lo: usize, hi: usize) -> Span {
        let line = match self.starts.binary_search(&lo) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.starts[line];
        let column = self.source[line_start..lo].chars().count() + 1;
        Span::new(lo as u32, hi as u32, line as u32 + 1, column as u32)
    }
}

pub fn lex(source: &str) -> Result<Vec<Token>, LexerError> {
    let index = LineIndex::new(source);
    let mut input = source;
    let mut tokens = Vec::new();
    while !input.is_empty() {
        let offset = source.len() - input.len();
        ws.parse_next(&mut input).map_err(|_| LexerError {
            message: "unterminated block comment".to_string(),
            span: index.span(offset, source.len()),
        })?;
        if input.is_empty() {
            break;
        }
        let start = source.len() - input.len();
        let (kind, body) = match token_parser().parse_next(&mut input) {
            Ok(parsed) => parsed,
            Err(err) => {
                let message = match (&err, source[start..].chars().next()) {
                    (ErrMode::Cut(_), Some('\'')) => "unterminated character literal".to_string(),
                    (ErrMode::Cut(_), _) => "unterminated string literal".to_string(),
                    (_, Some(c)) => format!("unexpected character `{c}`"),
                    (_, None) => "unexpected end of input".to_string(),
                };
                return Err(LexerError {
                    message,
                    span: index.span(start, start + 1),
                });
            }
        };
        let end = source.len() - input.len();
        let span = index.span(start, end);
        let (kind, lexeme) = match kind {
            TokenKind::Ident => match Keyword::from_lexeme(body) {
                Some(keyword) => (TokenKind::Keyword(keyword), body.to_string()),
                None => (TokenKind::Ident, body.to_string()),
            },
            TokenKind::Str | TokenKind::Char if body_is_escaped(&source[start..end]) => {
                let cooked = unescape(body).map_err(|message| LexerError { message, span })?;
                (kind, cooked)
            }
            other => (other, body.to_string()),
        };
        tokens.push(Token { kind, lexeme, span });
    }
    Ok(tokens)
}

fn body_is_escaped(raw: &str) -> bool {
    !raw.starts_with('r')
}

fn token_parser<'a>() -> impl Parser<&'a str, (TokenKind, &'a str), ErrMode<ContextError>> {
    alt((
        parse_raw_string_literal.map(|body| (TokenKind::Str, body)),
        parse_cooked_string_literal.map(|body| (TokenKind::Str, body)),
        parse_char_literal.map(|body| (TokenKind::Char, body)),
        number_token,
        ident_token.map(|text| (TokenKind::Ident, text)),
        symbol_token.map(|text| (TokenKind::Symbol, text)),
    ))
}

fn ident_token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        take_while(1.., is_ident_start),
        take_while(0.., is_ident_continue),
    )
        .take()
        .parse_next(input)
}

fn digits<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        take_while(1.., |c: char| c.is_ascii_digit()),
        take_while(0.., |c: char| c.is_ascii_digit() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn number_token<'a>(input: &mut &'a str) -> ModalResult<(TokenKind, &'a str)> {
    let start = *input;
    let radix = opt(alt((literal("0x"), literal("0b"), literal("0o")))).parse_next(input)?;
    if radix.is_some() {
        take_while(1.., is_ident_continue).parse_next(input)?;
        let consumed = start.len() - input.len();
        return Ok((TokenKind::Int, &start[..consumed]));
    }

    digits.parse_next(input)?;
    let mut float = false;
    // `1.0` is a float; `1..2` and `1.max(2)` are not
    let fraction_follows = input.starts_with('.')
        && input[1..].chars().next().is_some_and(|c| c.is_ascii_digit());
    if fraction_follows {
        literal(".").parse_next(input)?;
        digits.parse_next(input)?;
        float = true;
    }
    if exponent_follows(input) {
        one_of(['e', 'E']).parse_next(input)?;
        opt(one_of(['+', '-'])).parse_next(input)?;
        digits.parse_next(input)?;
        float = true;
    }
    let suffix = take_while(0.., is_ident_continue).parse_next(input)?;
    if suffix.starts_with('f') {
        float = true;
    }
    let consumed = start.len() - input.len();
    let kind = if float { TokenKind::Float } else { TokenKind::Int };
    Ok((kind, &start[..consumed]))
}

fn exponent_follows(input: &str) -> bool {
    let mut chars = input.chars();
    if !matches!(chars.next(), Some('e' | 'E')) {
        return false;
    }
    match chars.next() {
        Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(c) => c.is_ascii_digit(),
        None => false,
    }
}

fn symbol_token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((multi_punct_token, single_punct_token)).parse_next(input)
}

fn multi_punct_token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    for sym in MULTI_PUNCT {
        if input.starts_with(sym) {
            let (matched, rest) = input.split_at(sym.len());
            *input = rest;
            return Ok(matched);
        }
    }
    Err(backtrack_err())
}

fn single_punct_token<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1..=1, |c: char| SINGLE_PUNCT.contains(c)).parse_next(input)
}

/// Value of an integer literal lexeme, with `_` separators and type suffixes removed.
pub fn parse_int_literal(lexeme: &str) -> Option<i64> {
    let cleaned: String = lexeme.chars().filter(|c| *c != '_').collect();
    let (radix, digits) = if let Some(rest) = cleaned.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = cleaned.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = cleaned.strip_prefix("0o") {
        (8, rest)
    } else {
        (10, cleaned.as_str())
    };
    let digits = strip_int_suffix(digits);
    // u64 literals above i64::MAX keep their bit pattern
    u64::from_str_radix(digits, radix).ok().map(|v| v as i64)
}

fn strip_int_suffix(digits: &str) -> &str {
    const SUFFIXES: &[&str] = &[
        "isize", "usize", "i128", "u128", "i64", "u64", "i32", "u32", "i16", "u16", "i8", "u8",
    ];
    for suffix in SUFFIXES {
        if let Some(stripped) = digits.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    digits
}

pub fn parse_float_literal(lexeme: &str) -> Option<f64> {
    let cleaned: String = lexeme.chars().filter(|c| *c != '_').collect();
    let trimmed = cleaned
        .strip_suffix("f64")
        .or_else(|| cleaned.strip_suffix("f32"))
        .unwrap_or(&cleaned);
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_literals_strip_suffixes() {
        assert_eq!(parse_int_literal("0xff"), Some(255));
        assert_eq!(parse_int_literal("0b1010_u8"), Some(10));
        assert_eq!(parse_int_literal("1_000i64"), Some(1000));
        assert_eq!(parse_int_literal("0xzz"), None);
        assert_eq!(parse_float_literal("2.5f32"), Some(2.5));
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = lex("let x = 1;\n  y").unwrap();
        let y = tokens.last().unwrap();
        assert_eq!((y.span.line, y.span.column), (2, 3));
    }
}

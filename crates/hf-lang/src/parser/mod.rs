//! Recursive-descent parser over the token stream produced by [`crate::lexer`].
//!
//! Items are handled in `items`, expressions, statements and patterns in `expr`. Both work
//! on a shared [`TokenStream`] cursor that tracks nesting depth so hostile input fails with
//! a parse error instead of overflowing the stack.

use crate::ast::{Expr, File};
use crate::lexer::{self, Keyword, LexerError, Token, TokenKind};
use hf_core::Span;
use thiserror::Error;

mod expr;
mod items;

const MAX_DEPTH: usize = 200;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Attach the origin (file path or `<expr>`) and convert into the engine error.
    pub fn into_error(self, origin: &str) -> hf_core::Error {
        hf_core::Error::Parse {
            origin: origin.to_string(),
            message: self.message,
            span: self.span,
        }
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        ParseError::new(err.message, err.span)
    }
}

pub(crate) type PResult<T> = Result<T, ParseError>;

pub(crate) struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Set while parsing `if`/`while`/`match`/`for` heads, where `{` opens the body.
    no_struct: bool,
    eof: Span,
}

impl TokenStream {
    fn new(source: &str) -> PResult<Self> {
        let tokens = lexer::lex(source)?;
        let end = source.len() as u32;
        let eof = match tokens.last() {
            Some(last) => Span::new(end, end, last.span.line, last.span.column + 1),
            None => Span::new(0, 0, 1, 1),
        };
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            no_struct: false,
            eof,
        })
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Span of the next token, or the end of input.
    pub(crate) fn span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or(self.eof)
    }

    /// Span of the most recently consumed token.
    pub(crate) fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.span)
            .unwrap_or(self.eof)
    }

    /// Span from `start` to the last consumed token.
    pub(crate) fn since(&self, start: Span) -> Span {
        start.to(self.prev_span())
    }

    pub(crate) fn peek_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    pub(crate) fn peek_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub(crate) fn peek_ident(&self, ident: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && t.lexeme == ident)
    }

    pub(crate) fn match_symbol(&mut self, symbol: &str) -> bool {
        if self.peek_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_symbol(&mut self, symbol: &str) -> PResult<()> {
        if self.match_symbol(symbol) {
            return Ok(());
        }
        // `>>` closes two generic lists
        if symbol == ">" && self.peek_symbol(">>") {
            if let Some(token) = self.tokens.get_mut(self.pos) {
                token.lexeme = ">".to_string();
                token.span.lo += 1;
                token.span.column += 1;
            }
            return Ok(());
        }
        Err(self.unexpected(&format!("`{symbol}`")))
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> PResult<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", keyword_text(keyword))))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> PResult<String> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                let lexeme = token.lexeme.clone();
                self.pos += 1;
                Ok(lexeme)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(
                format!("expected {expected}, found `{}`", token.lexeme),
                token.span,
            ),
            None => ParseError::new(
                format!("expected {expected}, found end of input"),
                self.eof,
            ),
        }
    }

    pub(crate) fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new("nesting too deep", self.span()));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Run `f` with struct literals disabled (or re-enabled inside delimiters).
    pub(crate) fn with_no_struct<T>(
        &mut self,
        no_struct: bool,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let saved = std::mem::replace(&mut self.no_struct, no_struct);
        let result = f(self);
        self.no_struct = saved;
        result
    }
}

pub(crate) fn keyword_text(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::As => "as",
        Keyword::Break => "break",
        Keyword::Const => "const",
        Keyword::Continue => "continue",
        Keyword::Else => "else",
        Keyword::False => "false",
        Keyword::Fn => "fn",
        Keyword::For => "for",
        Keyword::If => "if",
        Keyword::In => "in",
        Keyword::Let => "let",
        Keyword::Loop => "loop",
        Keyword::Match => "match",
        Keyword::Mod => "mod",
        Keyword::Mut => "mut",
        Keyword::Pub => "pub",
        Keyword::Return => "return",
        Keyword::Static => "static",
        Keyword::Struct => "struct",
        Keyword::True => "true",
        Keyword::Use => "use",
        Keyword::While => "while",
    }
}

/// Parse a whole script. `origin` names the script in error messages.
pub fn parse_file(source: &str, origin: &str) -> hf_core::Result<File> {
    let parse = || -> PResult<File> {
        let mut stream = TokenStream::new(source)?;
        let items = items::parse_items(&mut stream, false)?;
        Ok(File { items })
    };
    parse().map_err(|err| err.into_error(origin))
}

/// Parse a standalone expression such as the hotfix entry expression.
pub fn parse_expression(source: &str, origin: &str) -> hf_core::Result<Expr> {
    let parse = || -> PResult<Expr> {
        let mut stream = TokenStream::new(source)?;
        if stream.is_eof() {
            return Err(ParseError::new("empty expression", stream.span()));
        }
        let expr = expr::parse_expr(&mut stream)?;
        if !stream.is_eof() {
            return Err(stream.unexpected("end of expression"));
        }
        Ok(expr)
    };
    parse().map_err(|err| err.into_error(origin))
}

//! Lexer utilities and tokenization for hotfix scripts.

pub mod tokenizer;
pub mod winnow;

pub use tokenizer::{lex, Keyword, LexerError, Token, TokenKind};

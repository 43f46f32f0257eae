use hf_lang::lexer::{lex, Keyword, TokenKind};
use pretty_assertions::assert_eq;

fn kinds(src: &str) -> Vec<(TokenKind, String)> {
    lex(src)
        .unwrap_or_else(|e| panic!("lex failed for `{src}`: {e}"))
        .into_iter()
        .map(|t| (t.kind, t.lexeme))
        .collect()
}

#[test]
fn keywords_idents_and_longest_punctuation() {
    let tokens = kinds("let x_1 = a..=b >>= 2;");
    assert_eq!(
        tokens,
        vec![
            (TokenKind::Keyword(Keyword::Let), "let".to_string()),
            (TokenKind::Ident, "x_1".to_string()),
            (TokenKind::Symbol, "=".to_string()),
            (TokenKind::Ident, "a".to_string()),
            (TokenKind::Symbol, "..=".to_string()),
            (TokenKind::Ident, "b".to_string()),
            (TokenKind::Symbol, ">>=".to_string()),
            (TokenKind::Int, "2".to_string()),
            (TokenKind::Symbol, ";".to_string()),
        ]
    );
}

#[test]
fn numbers_distinguish_ranges_and_method_calls() {
    let tokens = kinds("1..2 1.5 3.max 2e3 7f64");
    let summary: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        summary,
        vec![
            TokenKind::Int,
            TokenKind::Symbol,
            TokenKind::Int,
            TokenKind::Float,
            TokenKind::Int,
            TokenKind::Symbol,
            TokenKind::Ident,
            TokenKind::Float,
            TokenKind::Float,
        ]
    );
}

#[test]
fn string_literals_are_unescaped() {
    let tokens = kinds(r#""a\tb\n\u{41}" r"raw\n" '\''"#);
    assert_eq!(tokens[0], (TokenKind::Str, "a\tb\nA".to_string()));
    assert_eq!(tokens[1], (TokenKind::Str, "raw\\n".to_string()));
    assert_eq!(tokens[2], (TokenKind::Char, "'".to_string()));
}

#[test]
fn comments_are_skipped() {
    let tokens = kinds("a // line\n/* block\n comment */ b");
    assert_eq!(tokens.len(), 2);
}

#[test]
fn unterminated_string_reports_position() {
    let err = lex("let s = \"abc").unwrap_err();
    assert_eq!(err.message, "unterminated string literal");
    assert_eq!((err.span.line, err.span.column), (1, 9));
}

#[test]
fn unexpected_character_is_reported() {
    let err = lex("a ` b").unwrap_err();
    assert!(err.message.contains('`'), "{}", err.message);
}

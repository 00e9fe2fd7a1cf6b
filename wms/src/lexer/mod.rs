//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::{LineIndex, Span};
use crate::error::{Result, WmsError};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let slice = lexer.slice();
                let message = if slice.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("integer literal out of range: {slice}")
                } else if slice.starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    format!("unexpected character: {slice:?}")
                };
                return Err(WmsError::lexer(message, span, &LineIndex::new(source)));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_function_header() {
        assert_eq!(
            kinds("func add(a, b) {"),
            vec![
                Token::Func,
                Token::Ident("add".to_string()),
                Token::LParen,
                Token::Ident("a".to_string()),
                Token::Comma,
                Token::Ident("b".to_string()),
                Token::RParen,
                Token::LBrace,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("+ - * / % == != < > <= >= && ||"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::EqEq,
                Token::NotEq,
                Token::Lt,
                Token::Gt,
                Token::LtEq,
                Token::GtEq,
                Token::AmpAmp,
                Token::PipePipe,
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_both_comment_styles() {
        let tokens = kinds("x // slash comment\n# hash comment\ny");
        assert_eq!(
            tokens,
            vec![Token::Ident("x".to_string()), Token::Ident("y".to_string())]
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("func main").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 4));
        assert_eq!(tokens[1].1, Span::new(5, 9));
    }

    #[test]
    fn test_tokenize_negative_integer_as_minus_then_int() {
        assert_eq!(kinds("-5"), vec![Token::Minus, Token::IntLit(5)]);
    }

    #[test]
    fn test_tokenize_foreach_header() {
        assert_eq!(
            kinds("for (k, v in a)"),
            vec![
                Token::For,
                Token::LParen,
                Token::Ident("k".to_string()),
                Token::Comma,
                Token::Ident("v".to_string()),
                Token::In,
                Token::Ident("a".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_unexpected_character_error() {
        let err = tokenize("x = 1;\ny = $;").unwrap_err();
        assert!(matches!(err, WmsError::Lexer { line: 2, column: 5, .. }));
        assert!(err.to_string().contains("unexpected character"));
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let err = tokenize("s = \"open").unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }
}

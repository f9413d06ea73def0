use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")] // Skip whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[regex(r"[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidInteger(slice.to_string()))
    })]
    Integer(i64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[error("unexpected character")]
    #[default]
    UnexpectedCharacter,
    #[error("integer literal out of range: '{0}'")]
    InvalidInteger(String),
}

/// A lexing failure. `remaining` is the unconsumed input starting at the
/// offending character.
#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
    pub remaining: String,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            LexerErrorKind::UnexpectedCharacter => {
                write!(f, "unexpected character: {}", self.remaining)
            }
            other => other.fmt(f),
        }
    }
}

impl std::error::Error for LexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

/// Converts source text into tokens, stopping at the first character run no
/// token pattern accepts.
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: Span::from(range),
            }),
            Err(error) => Err(LexerError {
                error,
                remaining: input[range.start..].to_string(),
                span: Span::from(range),
            }),
        })
        .collect()
}

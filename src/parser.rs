use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::Node;
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse Error [at {}]: Unexpected token '{}', expected {expected}", .found.span, .found.kind)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Parse Error: Unexpected end of input during parsing. Expected {0}")]
    UnexpectedEof(String),
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn peek_token(&mut self) -> Option<&Token> {
        self.tokens.peek()
    }

    /// Parses one bracketed list from the front of the token stream, leaving
    /// the tokens after its closing `]` in place.
    pub fn parse_list(&mut self) -> ParseResult<Node> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::LBracket,
                span,
            }) => self.parse_list_body(span),
            Some(found) => Err(ParseError::UnexpectedToken {
                found,
                expected: "'['".to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("'['".to_string())),
        }
    }

    /// Parses list elements after an already consumed `[` up to the matching `]`.
    fn parse_list_body(&mut self, open_span: Span) -> ParseResult<Node> {
        let mut children = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RBracket,
                    span,
                }) => return Ok(Node::new_list(children, open_span.merge(span))),
                Some(Token {
                    kind: TokenKind::LBracket,
                    span,
                }) => children.push(self.parse_list_body(span)?),
                Some(Token {
                    kind: TokenKind::Integer(n),
                    span,
                }) => children.push(Node::new_integer(n, span)),
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    span,
                }) => children.push(Node::new_identifier(name, span)),
                None => return Err(ParseError::UnexpectedEof("']'".to_string())),
            }
        }
    }

    /// Parses a whole program: one or more top-level lists, back to back.
    pub fn parse_program(mut self) -> ParseResult<Vec<Node>> {
        let mut forms = vec![self.parse_list()?];
        while self.peek_token().is_some() {
            forms.push(self.parse_list()?);
        }
        Ok(forms)
    }
}

/// Lexes and parses a program in one step.
pub fn parse_str(input: &str) -> ParseResult<Vec<Node>> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse_program()
}

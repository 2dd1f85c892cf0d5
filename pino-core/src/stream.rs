//! Explicit-offset navigation over the token sequence.
//!
//! There is no cursor anywhere in the pipeline. Every grammar routine
//! receives a starting offset, inspects tokens relative to it, and
//! reports the offset of the last token it consumed. Re-invoking any
//! routine at the same offset therefore yields the same result, which
//! keeps individual grammar rules testable in isolation.

use crate::error::CoreError;
use crate::token::{Keyword, Token};

/// What a builder hands back: the finished value and the offset of
/// the last token it consumed. Callers resume at `end_index + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Peek<T> {
    pub data: T,
    pub end_index: usize,
}

/// An ordered token sequence, immutable after lexing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stream {
    tokens: Vec<Token>,
}

impl Stream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Stream { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Token at `index`, or an internal error: builders only index
    /// positions the grammar has already promised exist.
    pub fn at(&self, index: usize) -> Result<&Token, CoreError> {
        self.tokens
            .get(index)
            .ok_or_else(|| CoreError::internal(format!("token index {index} is out of bounds")))
    }

    /// Token just past `start`.
    pub fn get_next(&self, start: usize) -> Result<&Token, CoreError> {
        self.at(start + 1)
    }

    /// Consuming lookahead: the token at `start + 1` must satisfy the
    /// predicate. A mismatch is an internal error because it means a
    /// grammar rule asked for something that cannot be there; call
    /// sites where the mismatch is a reachable user mistake re-map
    /// the error to a user-facing one.
    pub fn peek(
        &self,
        start: usize,
        predicate: impl Fn(&Token) -> bool,
    ) -> Result<Peek<Token>, CoreError> {
        let index = start + 1;
        match self.tokens.get(index) {
            Some(token) if predicate(token) => Ok(Peek {
                data: token.clone(),
                end_index: index,
            }),
            Some(token) => Err(CoreError::internal(format!(
                "unexpected token '{}' on line {}",
                token.text, token.line
            ))),
            None => Err(CoreError::internal("unexpected end of stream")),
        }
    }

    /// Non-consuming lookahead at `start + 1`.
    pub fn is_next(&self, start: usize, predicate: impl Fn(&Token) -> bool) -> bool {
        self.tokens
            .get(start + 1)
            .is_some_and(|token| predicate(token))
    }

    pub fn is_next_keyword(&self, start: usize, keyword: Keyword) -> bool {
        self.is_next(start, |token| token.is_given_keyword(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn sample() -> Stream {
        Stream::new(vec![
            Token::new(TokenKind::Keyword, "var", 1),
            Token::new(TokenKind::Identifier, "x", 1),
            Token::new(TokenKind::Operator, "=", 1),
        ])
    }

    #[test]
    fn peek_returns_token_and_position() {
        let stream = sample();
        let name = stream
            .peek(0, |token| token.kind == TokenKind::Identifier)
            .expect("identifier follows the keyword");
        assert_eq!(name.data.text, "x");
        assert_eq!(name.end_index, 1);
    }

    #[test]
    fn peek_mismatch_is_internal() {
        let stream = sample();
        let err = stream
            .peek(0, |token| token.kind == TokenKind::Marker)
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn peek_past_end_is_internal() {
        let stream = sample();
        let err = stream.peek(2, |_| true).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn is_next_does_not_consume() {
        let stream = sample();
        assert!(stream.is_next(0, |token| token.text == "x"));
        assert!(stream.is_next(0, |token| token.text == "x"));
        assert!(!stream.is_next(2, |_| true));
    }
}

//! Lexer: source text to a flat token stream.
//!
//! Input is processed one physical line at a time; no token ever
//! spans lines. Within a line, characters accumulate into a buffer
//! until whitespace or a marker character flushes it, at which point
//! the buffer is classified against the token tables. Markers become
//! single-character tokens, with two exceptions: a quote opens
//! string-literal scanning (recording `#name` interpolation
//! injections along the way), and `[` directly followed by `]` folds
//! into one array literal token.
//!
//! The only way lexing fails is a string literal with no closing
//! quote before the end of its line.

use crate::error::CoreError;
use crate::stream::Stream;
use crate::token::{self, LiteralKind, Marker, Token, TokenKind};

/// Lex a complete source text into a stream.
pub fn lex(source: &str) -> Result<Stream, CoreError> {
    let mut tokens = Vec::new();
    for (index, line) in source.lines().enumerate() {
        lex_line(line, index + 1, &mut tokens)?;
    }
    Ok(Stream::new(tokens))
}

/// Lex a single physical line, appending onto `tokens`.
pub fn lex_line(line: &str, number: usize, tokens: &mut Vec<Token>) -> Result<(), CoreError> {
    let mut lexer = LineLexer {
        chars: line.chars().collect(),
        number,
        index: 0,
    };
    lexer.run(tokens)
}

struct LineLexer {
    chars: Vec<char>,
    number: usize,
    index: usize,
}

impl LineLexer {
    fn run(&mut self, tokens: &mut Vec<Token>) -> Result<(), CoreError> {
        let mut buffer = String::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.flush(&mut buffer, tokens);
                self.consume_char();
                continue;
            }

            if let Some(marker) = token::marker(ch) {
                self.flush(&mut buffer, tokens);

                match marker {
                    Marker::StrQuote => {
                        let literal = self.lex_str_literal()?;
                        tokens.push(literal);
                    }
                    Marker::LeftBracket if self.peek_next() == Some(']') => {
                        tokens.push(Token::literal(LiteralKind::Array, "[]", self.number));
                        self.consume_char();
                        self.consume_char();
                    }
                    _ => {
                        tokens.push(Token::new(TokenKind::Marker, ch.to_string(), self.number));
                        self.consume_char();
                    }
                }

                continue;
            }

            buffer.push(ch);
            self.consume_char();
        }

        self.flush(&mut buffer, tokens);
        Ok(())
    }

    /// Classify and emit the accumulated buffer, if any.
    fn flush(&self, buffer: &mut String, tokens: &mut Vec<Token>) {
        if buffer.is_empty() {
            return;
        }

        let text = std::mem::take(buffer);
        let token = if token::is_operator(&text) {
            Token::new(TokenKind::Operator, text, self.number)
        } else if token::keyword(&text).is_some() {
            Token::new(TokenKind::Keyword, text, self.number)
        } else if token::is_bool_literal(&text) {
            Token::literal(LiteralKind::Boolean, text, self.number)
        } else if token::is_int_literal(&text) {
            Token::literal(LiteralKind::Integer, text, self.number)
        } else if token::is_float_literal(&text) {
            Token::literal(LiteralKind::Float, text, self.number)
        } else {
            Token::new(TokenKind::Identifier, text, self.number)
        };

        tokens.push(token);
    }

    /// Scan a string literal starting at the opening quote. `#name`
    /// interpolation markers are recorded as injections but stay
    /// inline in the literal text.
    fn lex_str_literal(&mut self) -> Result<Token, CoreError> {
        self.consume_char();

        let mut literal = String::new();
        let mut injections = Vec::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                '"' => {
                    self.consume_char();
                    let mut token = Token::literal(LiteralKind::String, literal, self.number);
                    token.injections = injections;
                    return Ok(token);
                }
                '#' => {
                    literal.push('#');
                    self.consume_char();
                    let name = self.lex_str_injection();
                    literal.push_str(&name);
                    if !name.is_empty() {
                        injections.push(name);
                    }
                }
                _ => {
                    literal.push(ch);
                    self.consume_char();
                }
            }
        }

        Err(CoreError::LexError {
            line: self.number,
            message: "unterminated string literal".into(),
        })
    }

    /// Consume the identifier following a `#` inside a string.
    fn lex_str_injection(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek_char() {
            if token::is_valid_id_char(ch) {
                name.push(ch);
                self.consume_char();
            } else {
                break;
            }
        }
        name
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(stream: &Stream) -> Vec<&str> {
        stream.tokens().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn lexes_a_declaration_line() {
        let stream = lex("var count = 42").expect("lex");
        assert_eq!(texts(&stream), ["var", "count", "=", "42"]);

        let kinds: Vec<TokenKind> = stream.tokens().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Literal,
            ]
        );
        assert_eq!(stream.tokens()[3].literal, LiteralKind::Integer);
    }

    #[test]
    fn markers_split_the_buffer_without_whitespace() {
        let stream = lex("greet(name,loud)").expect("lex");
        assert_eq!(texts(&stream), ["greet", "(", "name", ",", "loud", ")"]);
    }

    #[test]
    fn folds_empty_brackets_into_an_array_token() {
        let stream = lex("var xs = []int").expect("lex");
        assert_eq!(texts(&stream), ["var", "xs", "=", "[]", "int"]);
        assert!(stream.tokens()[3].is_given_literal(LiteralKind::Array));
    }

    #[test]
    fn classifies_floats_and_booleans() {
        let stream = lex("val pi = 3.14\nval flag = true").expect("lex");
        assert_eq!(stream.tokens()[3].literal, LiteralKind::Float);
        assert_eq!(stream.tokens()[7].literal, LiteralKind::Boolean);
        assert_eq!(stream.tokens()[7].line, 2);
    }

    #[test]
    fn records_string_injections_inline() {
        let stream = lex("println(\"hello #name, age #age\")").expect("lex");
        let literal = &stream.tokens()[2];
        assert_eq!(literal.literal, LiteralKind::String);
        assert_eq!(literal.text, "hello #name, age #age");
        assert_eq!(literal.injections, ["name", "age"]);
    }

    #[test]
    fn rejects_unterminated_string_literals() {
        let err = lex("val s = \"oops").unwrap_err();
        match err {
            CoreError::LexError { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("unterminated"));
            }
            other => panic!("expected a lex error, got {other:?}"),
        }
    }

    #[test]
    fn token_texts_round_trip_identifiers_and_literals() {
        let source = "fn greet(name str) { println(name) }";
        let stream = lex(source).expect("lex");
        for token in stream.tokens() {
            if token.kind != TokenKind::Literal {
                assert!(source.contains(&token.text), "lost text {:?}", token.text);
            }
        }
        assert_eq!(
            texts(&stream).join(" "),
            "fn greet ( name str ) { println ( name ) }"
        );
    }
}

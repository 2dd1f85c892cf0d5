//! Structural type descriptors.
//!
//! A `Typing` is derived, never authoritative: it is built either by
//! inspecting an already-parsed expression or by reading a type
//! annotation, and it never drives a parsing decision. The checker
//! compares descriptors structurally; the generator reads them to
//! pick loop and array shapes.

use crate::error::CoreError;
use crate::stream::{Peek, Stream};
use crate::token::{Keyword, LiteralKind, Marker, TokenKind};
use crate::ast::{Expression, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct Typing {
    pub kind: LiteralKind,
    /// Human-readable display: `int`, `[]str`, `Point`, `fn(int)`.
    pub value: String,
    /// Element type for arrays, parameter types for functions.
    pub children: Vec<Typing>,
}

impl Default for Typing {
    fn default() -> Self {
        Typing::unknown()
    }
}

impl Typing {
    pub fn new(kind: LiteralKind, value: impl Into<String>) -> Self {
        Typing {
            kind,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        Typing::new(LiteralKind::Unknown, "unknown")
    }

    /// Canonical display name of a built-in literal kind.
    pub fn built_in_name(kind: LiteralKind) -> &'static str {
        match kind {
            LiteralKind::Array => "[]",
            LiteralKind::Boolean => "bool",
            LiteralKind::Integer => "int",
            LiteralKind::String => "str",
            LiteralKind::Float => "float",
            LiteralKind::Lambda => "fn",
            LiteralKind::Void => "void",
            LiteralKind::Struct | LiteralKind::Unknown => "unknown",
        }
    }

    /// Interpret a bare annotation name. Uppercase-first names are
    /// struct types by the language's naming rule.
    pub fn from_annotation_name(name: &str) -> Self {
        match name {
            "bool" => Typing::new(LiteralKind::Boolean, "bool"),
            "int" => Typing::new(LiteralKind::Integer, "int"),
            "str" => Typing::new(LiteralKind::String, "str"),
            "float" => Typing::new(LiteralKind::Float, "float"),
            _ if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) => {
                Typing::new(LiteralKind::Struct, name)
            }
            _ => Typing::new(LiteralKind::Unknown, name),
        }
    }

    /// Derive a descriptor from an expression.
    ///
    /// Scalar literals map to their canonical names; arrays carry
    /// their declared element type; struct literals carry the struct
    /// name; lambdas synthesize a `fn(...)` signature from their
    /// parameters; a block propagates the type of its trailing typed
    /// construct. Everything else is unknown.
    pub fn infer(expression: &Expression) -> Self {
        match expression {
            Expression::Literal(literal) => match literal.kind {
                LiteralKind::Boolean
                | LiteralKind::Integer
                | LiteralKind::String
                | LiteralKind::Float => {
                    Typing::new(literal.kind, Typing::built_in_name(literal.kind))
                }
                _ => Typing::unknown(),
            },
            Expression::Array(array) => array.typing.clone(),
            Expression::StructLiteral(object) => {
                Typing::new(LiteralKind::Struct, object.name.clone())
            }
            Expression::Lambda(lambda) => {
                let children: Vec<Typing> = lambda
                    .parameters
                    .iter()
                    .map(|parameter| parameter.typing.clone())
                    .collect();
                Typing::function_signature(children)
            }
            Expression::Block(block) => match block.body.last() {
                Some(Statement::Expression(trailing)) => Typing::infer(trailing),
                Some(Statement::Variable(variable)) => variable.typing.clone(),
                _ => Typing::unknown(),
            },
            _ => Typing::unknown(),
        }
    }

    /// Build a `fn(...)` descriptor from parameter types.
    pub fn function_signature(parameters: Vec<Typing>) -> Self {
        let display: Vec<&str> = parameters.iter().map(|t| t.value.as_str()).collect();
        Typing {
            kind: LiteralKind::Lambda,
            value: format!("fn({})", display.join(", ")),
            children: parameters,
        }
    }

    /// Parse a type annotation starting at `start`: a bare name, a
    /// bracketed element type for arrays, or a `fn(T, T)` signature.
    pub fn build(stream: &Stream, start: usize) -> Result<Peek<Typing>, CoreError> {
        let token = stream
            .at(start)
            .map_err(|_| CoreError::ParseError("missing type annotation".into()))?;

        if token.is_given_literal(LiteralKind::Array) {
            let element = Typing::build(stream, start + 1)?;
            let typing = Typing {
                kind: LiteralKind::Array,
                value: format!("[]{}", element.data.value),
                children: vec![element.data],
            };
            return Ok(Peek {
                data: typing,
                end_index: element.end_index,
            });
        }

        if token.is_given_keyword(Keyword::Fn) {
            return Typing::build_fn_signature(stream, start);
        }

        if token.kind == TokenKind::Identifier {
            return Ok(Peek {
                data: Typing::from_annotation_name(&token.text),
                end_index: start,
            });
        }

        Err(CoreError::ParseError(format!(
            "invalid type annotation '{}' on line {}",
            token.text, token.line
        )))
    }

    fn build_fn_signature(stream: &Stream, start: usize) -> Result<Peek<Typing>, CoreError> {
        let invalid = |_| CoreError::ParseError("invalid function type annotation".into());

        stream
            .peek(start, |t| t.is_given_marker(&[Marker::LeftParen]))
            .map_err(invalid)?;

        let mut parameters = Vec::new();
        let mut index = start + 1;

        loop {
            let next = stream
                .peek(index, |t| {
                    t.is_given_marker(&[Marker::RightParen, Marker::Comma])
                        || t.kind == TokenKind::Identifier
                        || t.is_given_literal(LiteralKind::Array)
                        || t.is_given_keyword(Keyword::Fn)
                })
                .map_err(invalid)?;

            if next.data.is_given_marker(&[Marker::Comma]) {
                index = next.end_index;
                continue;
            }

            if next.data.is_given_marker(&[Marker::RightParen]) {
                return Ok(Peek {
                    data: Typing::function_signature(parameters),
                    end_index: next.end_index,
                });
            }

            let parameter = Typing::build(stream, next.end_index)?;
            parameters.push(parameter.data);
            index = parameter.end_index;
        }
    }
}

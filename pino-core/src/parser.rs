//! Recursive-descent parser.
//!
//! Every syntactic form has a recognizer (`is_x`, lookahead only) and
//! a builder (`build_x`). A builder receives the offset of its first
//! token and returns the finished node together with the offset of
//! the last token it consumed; callers resume at `end_index + 1`.
//! Builders never touch shared state, so any of them can be invoked
//! at any offset without interfering with another parse.
//!
//! Binary expressions deliberately have no precedence table: the
//! right operand greedily re-enters full expression parsing, so
//! `a + b * c` nests as `a + (b * c)` and chains always lean right.
//! Changing this would change the parse trees of existing programs.

use crate::ast::{
    ArrayLiteral, Binary, BinaryVariant, Block, Call, Else, EnumDecl, Expression, For, ForVariant,
    Function, If, Lambda, Literal, Match, Object, Program, Property, Statement, StructDecl,
    Variable, When,
};
use crate::error::CoreError;
use crate::lexer::lex;
use crate::stream::{Peek, Stream};
use crate::token::{self, Keyword, LiteralKind, Marker, Token, TokenKind};
use crate::types::Typing;

/// Lex and parse a complete source text.
pub fn parse(source: &str) -> Result<Program, CoreError> {
    let stream = lex(source)?;
    let block = build_block(&stream, 0, true)?;
    Ok(Program {
        children: block.data,
    })
}

/// Build a `{ ... }` body, or the whole program when `is_top_level`.
///
/// For a nested block, `start` must be the offset of the opening
/// brace and the returned `end_index` is the closing brace. The top
/// level has neither brace and ends at the end of the stream.
pub fn build_block(
    stream: &Stream,
    start: usize,
    is_top_level: bool,
) -> Result<Peek<Vec<Statement>>, CoreError> {
    if !is_top_level {
        let opening = stream.at(start)?;
        if !opening.is_given_marker(&[Marker::LeftBrace]) {
            return Err(CoreError::internal(format!(
                "block not opened on line {}",
                opening.line
            )));
        }
    }

    let mut children = Vec::new();
    let mut index = if is_top_level { start } else { start + 1 };

    while index < stream.len() {
        let token = stream.at(index)?;

        if token.is_given_marker(&[Marker::RightBrace]) {
            if is_top_level {
                return Err(CoreError::ParseError(format!(
                    "unexpected '}}' on line {}",
                    token.line
                )));
            }
            return Ok(Peek {
                data: children,
                end_index: index,
            });
        }

        let statement = build_statement(stream, index)?;
        children.push(statement.data);
        index = statement.end_index + 1;
    }

    if !is_top_level {
        return Err(CoreError::ParseError("block not closed".into()));
    }

    Ok(Peek {
        data: children,
        end_index: stream.len(),
    })
}

fn build_statement(stream: &Stream, start: usize) -> Result<Peek<Statement>, CoreError> {
    let token = stream.at(start)?;

    if token.kind == TokenKind::Keyword {
        match token::keyword(&token.text) {
            Some(Keyword::Enum) => {
                let node = build_enum(stream, start)?;
                return Ok(Peek {
                    data: Statement::Enum(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::For) => {
                let node = build_for(stream, start)?;
                return Ok(Peek {
                    data: Statement::For(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::Fn) if !is_lambda(stream, start) => {
                let node = build_function(stream, start)?;
                return Ok(Peek {
                    data: Statement::Function(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::Struct) => {
                let node = build_struct(stream, start)?;
                return Ok(Peek {
                    data: Statement::Struct(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::Var) | Some(Keyword::Val) => {
                let node = build_variable(stream, start)?;
                return Ok(Peek {
                    data: Statement::Variable(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::If) => {
                let node = build_if(stream, start)?;
                return Ok(Peek {
                    data: Statement::If(node.data),
                    end_index: node.end_index,
                });
            }
            Some(Keyword::Match) => {
                let node = build_match(stream, start)?;
                return Ok(Peek {
                    data: Statement::Match(node.data),
                    end_index: node.end_index,
                });
            }
            _ => {}
        }
    }

    if is_expression(stream, start) {
        let expression = build_expression(stream, start)?;
        return Ok(Peek {
            data: Statement::Expression(expression.data),
            end_index: expression.end_index,
        });
    }

    Err(CoreError::ParseError(format!(
        "unexpected token '{}' on line {}",
        token.text, token.line
    )))
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

pub fn is_expression(stream: &Stream, start: usize) -> bool {
    let Some(token) = stream.get(start) else {
        return false;
    };
    token.is_given_kind(&[TokenKind::Identifier, TokenKind::Literal])
        || is_lambda(stream, start)
        || token.is_given_marker(&[Marker::LeftBrace])
}

pub fn build_expression(stream: &Stream, start: usize) -> Result<Peek<Expression>, CoreError> {
    if is_lambda(stream, start) {
        let lambda = build_lambda(stream, start)?;
        return Ok(Peek {
            data: Expression::Lambda(lambda.data),
            end_index: lambda.end_index,
        });
    }

    if is_binary_expression(stream, start) {
        return build_binary(stream, start);
    }

    if is_fn_call(stream, start) {
        return build_call(stream, start);
    }

    if is_struct_literal(stream, start) {
        return build_object(stream, start);
    }

    if is_arr_literal(stream, start) {
        return build_array(stream, start);
    }

    let token = stream.at(start)?;

    if token.is_given_marker(&[Marker::LeftBrace]) {
        let body = build_block(stream, start, false)?;
        return Ok(Peek {
            data: Expression::Block(Block { body: body.data }),
            end_index: body.end_index,
        });
    }

    match token.kind {
        TokenKind::Identifier => Ok(Peek {
            data: Expression::Identifier(token.text.clone()),
            end_index: start,
        }),
        TokenKind::Literal => Ok(Peek {
            data: literal_expression(token),
            end_index: start,
        }),
        _ => Err(CoreError::internal(format!(
            "not an expression at '{}' on line {}",
            token.text, token.line
        ))),
    }
}

fn literal_expression(token: &Token) -> Expression {
    Expression::Literal(Literal {
        kind: token.literal,
        value: token.text.clone(),
        injections: token.injections.clone(),
    })
}

fn is_binary_expression(stream: &Stream, start: usize) -> bool {
    stream
        .get(start)
        .is_some_and(|t| t.is_given_kind(&[TokenKind::Identifier, TokenKind::Literal]))
        && stream.is_next(start, |t| token::is_binary_operator(&t.text))
}

fn build_binary(stream: &Stream, start: usize) -> Result<Peek<Expression>, CoreError> {
    let token = stream.at(start)?;
    let left = match token.kind {
        TokenKind::Identifier => Expression::Identifier(token.text.clone()),
        TokenKind::Literal => literal_expression(token),
        _ => {
            return Err(CoreError::internal(format!(
                "invalid left operand '{}' on line {}",
                token.text, token.line
            )));
        }
    };

    let operation = stream.peek(start, |t| token::is_binary_operator(&t.text))?;
    let right = build_expression(stream, operation.end_index + 1)?;

    let operator = operation.data.text;
    let variant = if token::is_assignment_operator(&operator) {
        BinaryVariant::Assignment
    } else if operator == ":" {
        BinaryVariant::PropertyAccess
    } else {
        BinaryVariant::Operation
    };

    Ok(Peek {
        data: Expression::Binary(Box::new(Binary {
            variant,
            operator,
            left,
            right: right.data,
        })),
        end_index: right.end_index,
    })
}

fn is_fn_call(stream: &Stream, start: usize) -> bool {
    stream
        .get(start)
        .is_some_and(|t| t.kind == TokenKind::Identifier)
        && stream.is_next(start, |t| t.is_given_marker(&[Marker::LeftParen]))
}

fn build_call(stream: &Stream, start: usize) -> Result<Peek<Expression>, CoreError> {
    let name = stream.at(start)?.text.clone();
    stream.peek(start, |t| t.is_given_marker(&[Marker::LeftParen]))?;

    let mut arguments = Vec::new();
    let mut index = start + 1;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_marker(&[Marker::RightParen, Marker::Comma, Marker::LeftBrace])
                    || t.is_given_kind(&[TokenKind::Identifier, TokenKind::Literal])
                    || t.is_given_keyword(Keyword::Fn)
            })
            .map_err(|_| CoreError::ParseError(format!("unterminated call to '{name}'")))?;

        if next.data.is_given_marker(&[Marker::Comma]) {
            index = next.end_index;
            continue;
        }

        if next.data.is_given_marker(&[Marker::RightParen]) {
            return Ok(Peek {
                data: Expression::Call(Call { name, arguments }),
                end_index: next.end_index,
            });
        }

        let argument = build_expression(stream, next.end_index)?;
        arguments.push(argument.data);
        index = argument.end_index;
    }
}

/// A struct literal is told apart from a bare identifier followed by
/// a block purely by capitalization: the language requires struct
/// names to start uppercase.
fn is_struct_literal(stream: &Stream, start: usize) -> bool {
    let starts_upper = stream.get(start).is_some_and(|t| {
        t.kind == TokenKind::Identifier
            && t.text.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    });
    starts_upper && stream.is_next(start, |t| t.is_given_marker(&[Marker::LeftBrace]))
}

fn build_object(stream: &Stream, start: usize) -> Result<Peek<Expression>, CoreError> {
    let name = stream.at(start)?.text.clone();
    stream.peek(start, |t| t.is_given_marker(&[Marker::LeftBrace]))?;

    let mut properties = Vec::new();
    let mut index = start + 1;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_marker(&[Marker::RightBrace, Marker::Comma])
                    || t.kind == TokenKind::Identifier
            })
            .map_err(|_| {
                CoreError::ParseError(format!("unterminated struct literal '{name}'"))
            })?;

        if next.data.is_given_marker(&[Marker::Comma]) {
            index = next.end_index;
            continue;
        }

        if next.data.is_given_marker(&[Marker::RightBrace]) {
            return Ok(Peek {
                data: Expression::StructLiteral(Object { name, properties }),
                end_index: next.end_index,
            });
        }

        let property = build_property(stream, next.end_index)?;
        properties.push(property.data);
        index = property.end_index;
    }
}

/// `name: <expr>` inside a struct literal or array initializer.
fn build_property(stream: &Stream, start: usize) -> Result<Peek<Property>, CoreError> {
    let name = stream.at(start)?.text.clone();
    let colon = stream
        .peek(start, |t| t.is_given_marker(&[Marker::Colon]))
        .map_err(|_| CoreError::ParseError(format!("property '{name}' is missing a value")))?;

    let value = build_expression(stream, colon.end_index + 1)?;
    Ok(Peek {
        data: Property {
            name,
            value: value.data,
        },
        end_index: value.end_index,
    })
}

fn is_arr_literal(stream: &Stream, start: usize) -> bool {
    stream
        .get(start)
        .is_some_and(|t| t.is_given_literal(LiteralKind::Array))
}

fn build_array(stream: &Stream, start: usize) -> Result<Peek<Expression>, CoreError> {
    if !is_arr_literal(stream, start) {
        let line = stream.at(start)?.line;
        return Err(CoreError::internal(format!(
            "not an array literal on line {line}"
        )));
    }

    let typing = Typing::build(stream, start)?;
    let mut len = None;
    let mut init = None;
    let mut end = typing.end_index;

    if stream.is_next(end, |t| t.is_given_marker(&[Marker::LeftBrace])) {
        let mut index = end + 1;
        loop {
            let next = stream
                .peek(index, |t| {
                    t.is_given_marker(&[Marker::RightBrace, Marker::Comma])
                        || t.kind == TokenKind::Identifier
                })
                .map_err(|_| CoreError::ParseError("unterminated array initializer".into()))?;

            if next.data.is_given_marker(&[Marker::Comma]) {
                index = next.end_index;
                continue;
            }

            if next.data.is_given_marker(&[Marker::RightBrace]) {
                end = next.end_index;
                break;
            }

            let property = build_property(stream, next.end_index)?;
            match property.data.name.as_str() {
                "len" => len = Some(Box::new(property.data.value)),
                "init" => init = Some(Box::new(property.data.value)),
                other => {
                    return Err(CoreError::ParseError(format!(
                        "unknown array initializer key '{other}'"
                    )));
                }
            }
            index = property.end_index;
        }

        if init.is_some() && len.is_none() {
            return Err(CoreError::ParseError(
                "array initializer has 'init' but no 'len'".into(),
            ));
        }
    }

    Ok(Peek {
        data: Expression::Array(ArrayLiteral {
            typing: typing.data,
            len,
            init,
        }),
        end_index: end,
    })
}

fn is_lambda(stream: &Stream, start: usize) -> bool {
    stream
        .get(start)
        .is_some_and(|t| t.is_given_keyword(Keyword::Fn))
        && stream.is_next(start, |t| {
            t.is_given_marker(&[Marker::LeftParen, Marker::LeftBrace])
        })
}

fn build_lambda(stream: &Stream, start: usize) -> Result<Peek<Lambda>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Fn) {
        return Err(CoreError::internal(format!(
            "expected 'fn' on line {}",
            keyword.line
        )));
    }

    let (parameters, params_end) =
        if stream.is_next(start, |t| t.is_given_marker(&[Marker::LeftParen])) {
            build_parameters(stream, start + 1)?
        } else {
            (Vec::new(), start)
        };

    let open = stream
        .peek(params_end, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError("lambda is missing its body".into()))?;
    let body = build_block(stream, open.end_index, false)?;

    Ok(Peek {
        data: Lambda {
            parameters,
            body: body.data,
        },
        end_index: body.end_index,
    })
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

fn build_variable(stream: &Stream, start: usize) -> Result<Peek<Variable>, CoreError> {
    let keyword = stream.at(start)?;
    let kind = token::keyword(&keyword.text);
    if !matches!(kind, Some(Keyword::Var | Keyword::Val)) {
        return Err(CoreError::internal(format!(
            "expected 'var' or 'val' on line {}",
            keyword.line
        )));
    }

    let name = stream
        .peek(start, |t| t.kind == TokenKind::Identifier)
        .map_err(|_| {
            CoreError::ParseError(format!(
                "declaration on line {} is missing a name",
                keyword.line
            ))
        })?;

    let assignment = stream
        .peek(name.end_index, |t| {
            t.kind == TokenKind::Operator && t.text == "="
        })
        .map_err(|_| {
            CoreError::ParseError(format!(
                "declaration of '{}' is missing '='",
                name.data.text
            ))
        })?;

    let value = build_expression(stream, assignment.end_index + 1)?;
    let typing = Typing::infer(&value.data);

    Ok(Peek {
        data: Variable {
            name: name.data.text,
            value: Some(value.data),
            typing,
            is_constant: kind == Some(Keyword::Val),
            is_field: false,
        },
        end_index: value.end_index,
    })
}

/// `name <type>` or `name = <default>`, used for struct fields and
/// function parameters.
fn build_field(stream: &Stream, start: usize) -> Result<Peek<Variable>, CoreError> {
    let name = stream.at(start)?.text.clone();

    let next = stream
        .peek(start, |t| {
            t.kind == TokenKind::Identifier
                || t.is_given_literal(LiteralKind::Array)
                || t.is_given_keyword(Keyword::Fn)
                || (t.kind == TokenKind::Operator && t.text == "=")
        })
        .map_err(|_| {
            CoreError::ParseError(format!("field '{name}' needs a type or a default value"))
        })?;

    if next.data.kind == TokenKind::Operator {
        let value = build_expression(stream, next.end_index + 1)?;
        let typing = Typing::infer(&value.data);
        return Ok(Peek {
            data: Variable {
                name,
                value: Some(value.data),
                typing,
                is_constant: false,
                is_field: true,
            },
            end_index: value.end_index,
        });
    }

    let typing = Typing::build(stream, next.end_index)?;
    Ok(Peek {
        data: Variable {
            name,
            value: None,
            typing: typing.data,
            is_constant: false,
            is_field: true,
        },
        end_index: typing.end_index,
    })
}

fn build_function(stream: &Stream, start: usize) -> Result<Peek<Function>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Fn) {
        return Err(CoreError::internal(format!(
            "expected 'fn' on line {}",
            keyword.line
        )));
    }

    let name = stream
        .peek(start, |t| t.kind == TokenKind::Identifier)
        .map_err(|_| {
            CoreError::ParseError(format!(
                "function declaration on line {} is missing a name",
                keyword.line
            ))
        })?;

    let (parameters, params_end) =
        if stream.is_next(name.end_index, |t| t.is_given_marker(&[Marker::LeftParen])) {
            build_parameters(stream, name.end_index + 1)?
        } else {
            (Vec::new(), name.end_index)
        };

    let open = stream
        .peek(params_end, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| {
            CoreError::ParseError(format!("function '{}' is missing its body", name.data.text))
        })?;
    let body = build_block(stream, open.end_index, false)?;

    Ok(Peek {
        data: Function {
            name: name.data.text,
            parameters,
            body: body.data,
        },
        end_index: body.end_index,
    })
}

/// Parse `(name <type>, ...)` starting at the opening parenthesis.
/// Returns the parameters and the offset of the closing parenthesis.
fn build_parameters(stream: &Stream, open: usize) -> Result<(Vec<Variable>, usize), CoreError> {
    let mut parameters = Vec::new();
    let mut index = open;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_marker(&[Marker::RightParen, Marker::Comma])
                    || t.kind == TokenKind::Identifier
            })
            .map_err(|_| CoreError::ParseError("unterminated parameter list".into()))?;

        if next.data.is_given_marker(&[Marker::Comma]) {
            index = next.end_index;
            continue;
        }

        if next.data.is_given_marker(&[Marker::RightParen]) {
            return Ok((parameters, next.end_index));
        }

        let parameter = build_field(stream, next.end_index)?;
        parameters.push(parameter.data);
        index = parameter.end_index;
    }
}

fn build_struct(stream: &Stream, start: usize) -> Result<Peek<StructDecl>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Struct) {
        return Err(CoreError::internal(format!(
            "expected 'struct' on line {}",
            keyword.line
        )));
    }

    let name = stream
        .peek(start, |t| t.kind == TokenKind::Identifier)
        .map_err(|_| {
            CoreError::ParseError(format!(
                "struct declaration on line {} is missing a name",
                keyword.line
            ))
        })?;
    let name = name_starts_uppercase("struct", &name.data)?;
    let name_end = start + 1;

    let open = stream
        .peek(name_end, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError(format!("struct '{name}' is missing its body")))?;

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    let mut index = open.end_index;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_marker(&[Marker::RightBrace, Marker::Comma])
                    || t.kind == TokenKind::Identifier
                    || t.is_given_keyword(Keyword::Fn)
            })
            .map_err(|_| {
                CoreError::ParseError(format!("unterminated struct '{name}' declaration"))
            })?;

        if next.data.is_given_marker(&[Marker::Comma]) {
            index = next.end_index;
            continue;
        }

        if next.data.is_given_keyword(Keyword::Fn) {
            let method = build_function(stream, next.end_index)?;
            methods.push(method.data);
            index = method.end_index;
            continue;
        }

        if next.data.is_given_marker(&[Marker::RightBrace]) {
            if fields.is_empty() {
                return Err(CoreError::ParseError(format!(
                    "struct '{name}' has no fields"
                )));
            }
            return Ok(Peek {
                data: StructDecl {
                    name,
                    fields,
                    methods,
                },
                end_index: next.end_index,
            });
        }

        let field = build_field(stream, next.end_index)?;
        fields.push(field.data);
        index = field.end_index;
    }
}

fn build_enum(stream: &Stream, start: usize) -> Result<Peek<EnumDecl>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Enum) {
        return Err(CoreError::internal(format!(
            "expected 'enum' on line {}",
            keyword.line
        )));
    }

    let name = stream
        .peek(start, |t| t.kind == TokenKind::Identifier)
        .map_err(|_| {
            CoreError::ParseError(format!(
                "enum declaration on line {} is missing a name",
                keyword.line
            ))
        })?;
    let name = name_starts_uppercase("enum", &name.data)?;

    let open = stream
        .peek(start + 1, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError(format!("enum '{name}' is missing its body")))?;

    let mut values = Vec::new();
    let mut index = open.end_index;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_marker(&[Marker::RightBrace, Marker::Comma])
                    || t.kind == TokenKind::Identifier
            })
            .map_err(|_| {
                CoreError::ParseError(format!("unterminated enum '{name}' declaration"))
            })?;

        if next.data.is_given_marker(&[Marker::Comma]) {
            index = next.end_index;
            continue;
        }

        if next.data.is_given_marker(&[Marker::RightBrace]) {
            if values.is_empty() {
                return Err(CoreError::ParseError(format!("enum '{name}' has no values")));
            }
            return Ok(Peek {
                data: EnumDecl { name, values },
                end_index: next.end_index,
            });
        }

        if !is_all_upper(&next.data.text) {
            return Err(CoreError::ParseError(format!(
                "enum value '{}' must be all uppercase",
                next.data.text
            )));
        }
        values.push(next.data.text.clone());
        index = next.end_index;
    }
}

fn name_starts_uppercase(what: &str, token: &Token) -> Result<String, CoreError> {
    if token.text.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        Ok(token.text.clone())
    } else {
        Err(CoreError::ParseError(format!(
            "{what} name '{}' must start with an uppercase letter",
            token.text
        )))
    }
}

fn is_all_upper(text: &str) -> bool {
    text.chars()
        .filter(|c| *c != '_' && !c.is_ascii_digit())
        .all(|c| c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------

fn build_for(stream: &Stream, start: usize) -> Result<Peek<For>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::For) {
        return Err(CoreError::internal(format!(
            "expected 'for' on line {}",
            keyword.line
        )));
    }

    // `for { }`
    if stream.is_next(start, |t| t.is_given_marker(&[Marker::LeftBrace])) {
        let body = build_block(stream, start + 1, false)?;
        return Ok(Peek {
            data: For {
                variant: ForVariant::Infinite,
                index: None,
                limit: None,
                body: body.data,
            },
            end_index: body.end_index,
        });
    }

    let index = build_expression(stream, start + 1)?;

    // `for <index> in <limit> { }`
    if stream.is_next_keyword(index.end_index, Keyword::In) {
        let limit = build_expression(stream, index.end_index + 2)?;
        let open = stream
            .peek(limit.end_index, |t| t.is_given_marker(&[Marker::LeftBrace]))
            .map_err(|_| CoreError::ParseError("for loop is missing its body".into()))?;
        let body = build_block(stream, open.end_index, false)?;
        return Ok(Peek {
            data: For {
                variant: ForVariant::Ranged,
                index: Some(index.data),
                limit: Some(limit.data),
                body: body.data,
            },
            end_index: body.end_index,
        });
    }

    // `for <count> { }`
    let open = stream
        .peek(index.end_index, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError("for loop is missing its body".into()))?;
    let body = build_block(stream, open.end_index, false)?;
    Ok(Peek {
        data: For {
            variant: ForVariant::Times,
            index: Some(index.data),
            limit: None,
            body: body.data,
        },
        end_index: body.end_index,
    })
}

fn build_if(stream: &Stream, start: usize) -> Result<Peek<If>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::If) {
        return Err(CoreError::internal(format!(
            "expected 'if' on line {}",
            keyword.line
        )));
    }

    let condition = build_expression(stream, start + 1)?;
    let open = stream
        .peek(condition.end_index, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError("if statement is missing its body".into()))?;
    let body = build_block(stream, open.end_index, false)?;

    let mut end = body.end_index;
    let mut else_branch = None;

    if stream.is_next_keyword(end, Keyword::Else) {
        let else_block = build_else(stream, end + 1)?;
        else_branch = Some(else_block.data);
        end = else_block.end_index;
    }

    Ok(Peek {
        data: If {
            condition: condition.data,
            body: body.data,
            else_branch,
        },
        end_index: end,
    })
}

fn build_else(stream: &Stream, start: usize) -> Result<Peek<Else>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Else) {
        return Err(CoreError::internal(format!(
            "expected 'else' on line {}",
            keyword.line
        )));
    }

    if stream.is_next_keyword(start, Keyword::If) {
        let nested = build_if(stream, start + 1)?;
        return Ok(Peek {
            data: Else::If(Box::new(nested.data)),
            end_index: nested.end_index,
        });
    }

    let open = stream
        .peek(start, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError("else branch is missing its body".into()))?;
    let body = build_block(stream, open.end_index, false)?;
    Ok(Peek {
        data: Else::Block(body.data),
        end_index: body.end_index,
    })
}

fn build_match(stream: &Stream, start: usize) -> Result<Peek<Match>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::Match) {
        return Err(CoreError::internal(format!(
            "expected 'match' on line {}",
            keyword.line
        )));
    }

    let condition = build_expression(stream, start + 1)?;
    let open = stream
        .peek(condition.end_index, |t| t.is_given_marker(&[Marker::LeftBrace]))
        .map_err(|_| CoreError::ParseError("match statement is missing its body".into()))?;

    let mut arms = Vec::new();
    let mut else_arm = None;
    let mut index = open.end_index;

    loop {
        let next = stream
            .peek(index, |t| {
                t.is_given_keyword(Keyword::When)
                    || t.is_given_keyword(Keyword::Else)
                    || t.is_given_marker(&[Marker::RightBrace])
            })
            .map_err(|_| CoreError::ParseError("unterminated 'match' statement".into()))?;

        if next.data.is_given_marker(&[Marker::RightBrace]) {
            if arms.is_empty() && else_arm.is_none() {
                // An empty match is unreachable through the grammar
                // the builders implement, so it is not a user error.
                return Err(CoreError::internal("empty 'match' statement"));
            }
            return Ok(Peek {
                data: Match {
                    condition: condition.data,
                    arms,
                    else_arm,
                },
                end_index: next.end_index,
            });
        }

        if next.data.is_given_keyword(Keyword::When) {
            let arm = build_when(stream, next.end_index)?;
            arms.push(arm.data);
            index = arm.end_index;
            continue;
        }

        let open_else = stream
            .peek(next.end_index, |t| t.is_given_marker(&[Marker::LeftBrace]))
            .map_err(|_| CoreError::ParseError("match 'else' arm is missing its body".into()))?;
        let body = build_block(stream, open_else.end_index, false)?;
        else_arm = Some(body.data);
        index = body.end_index;
    }
}

fn build_when(stream: &Stream, start: usize) -> Result<Peek<When>, CoreError> {
    let keyword = stream.at(start)?;
    if !keyword.is_given_keyword(Keyword::When) {
        return Err(CoreError::internal(format!(
            "expected 'when' on line {}",
            keyword.line
        )));
    }

    let mut conditions = Vec::new();
    let mut index = start;

    loop {
        let next = stream
            .get_next(index)
            .map_err(|_| CoreError::ParseError("unterminated 'when' arm".into()))?;

        if next.is_given_marker(&[Marker::LeftBrace]) {
            break;
        }

        if next.is_given_marker(&[Marker::Comma]) {
            index += 1;
            continue;
        }

        let condition = build_expression(stream, index + 1)?;
        conditions.push(condition.data);
        index = condition.end_index;
    }

    if conditions.is_empty() {
        return Err(CoreError::ParseError(
            "'when' arm needs at least one condition".into(),
        ));
    }

    let body = build_block(stream, index + 1, false)?;
    Ok(Peek {
        data: When {
            conditions,
            body: body.data,
        },
        end_index: body.end_index,
    })
}

//! Python code generation.
//!
//! A tree walk over the checked program. The indentation level is
//! threaded explicitly through every call rather than recovered from
//! nesting depth, and each statement appends complete lines to the
//! output. Numeric semantics are textual passthrough: literals are
//! emitted exactly as they were written.

use crate::ast::{
    ArrayLiteral, Binary, BinaryVariant, Else, Expression, For, ForVariant, Function, If, Lambda,
    Literal, Match, Object, Program, Statement, StructDecl, Variable,
};
use crate::builtins;
use crate::error::CoreError;
use crate::token::LiteralKind;

/// Generate Python source for a whole program.
pub fn generate(program: &Program) -> Result<String, CoreError> {
    let mut generator = Generator {
        output: String::new(),
    };
    for statement in &program.children {
        generator.emit_statement(statement, 0)?;
    }
    Ok(generator.output)
}

struct Generator {
    output: String,
}

impl Generator {
    fn push_line(&mut self, depth: usize, text: &str) {
        self.output.push_str(&indent(depth));
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn emit_statement(&mut self, statement: &Statement, depth: usize) -> Result<(), CoreError> {
        match statement {
            Statement::Variable(variable) => self.emit_variable(variable, depth),
            Statement::Function(function) => {
                self.emit_function(function, depth, false)?;
                if depth == 0 {
                    self.output.push('\n');
                }
                Ok(())
            }
            Statement::Struct(decl) => {
                self.emit_struct(decl, depth)?;
                if depth == 0 {
                    self.output.push('\n');
                }
                Ok(())
            }
            Statement::Enum(decl) => {
                self.push_line(depth, &format!("class {}:", decl.name));
                for value in &decl.values {
                    self.push_line(depth + 1, &format!("{value} = \"{value}\""));
                }
                if depth == 0 {
                    self.output.push('\n');
                }
                Ok(())
            }
            Statement::For(statement) => self.emit_for(statement, depth),
            Statement::If(statement) => self.emit_if(statement, depth, "if"),
            Statement::Match(statement) => self.emit_match(statement, depth),
            // A bare block has no Python equivalent; its statements
            // simply continue at the current level.
            Statement::Expression(Expression::Block(block)) => {
                for child in &block.body {
                    self.emit_statement(child, depth)?;
                }
                Ok(())
            }
            Statement::Expression(expression) => {
                let rendered = render_expression(expression)?;
                self.push_line(depth, &rendered);
                Ok(())
            }
        }
    }

    fn emit_body(&mut self, body: &[Statement], depth: usize) -> Result<(), CoreError> {
        if body.is_empty() {
            self.push_line(depth, "pass");
            return Ok(());
        }
        for statement in body {
            self.emit_statement(statement, depth)?;
        }
        Ok(())
    }

    fn emit_variable(&mut self, variable: &Variable, depth: usize) -> Result<(), CoreError> {
        let Some(value) = &variable.value else {
            return Err(CoreError::internal(format!(
                "field '{}' cannot be emitted as a statement",
                variable.name
            )));
        };
        let rendered = render_expression(value)?;
        self.push_line(depth, &format!("{} = {}", variable.name, rendered));
        Ok(())
    }

    /// Emit a `def`. Parameter names only: default values and type
    /// annotations do not survive generation.
    fn emit_function(
        &mut self,
        function: &Function,
        depth: usize,
        is_method: bool,
    ) -> Result<(), CoreError> {
        let mut names: Vec<&str> = Vec::new();
        if is_method {
            names.push("self");
        }
        names.extend(function.parameters.iter().map(|p| p.name.as_str()));

        self.push_line(
            depth,
            &format!("def {}({}):", function.name, names.join(", ")),
        );
        self.emit_body(&function.body, depth + 1)
    }

    fn emit_struct(&mut self, decl: &StructDecl, depth: usize) -> Result<(), CoreError> {
        self.push_line(depth, &format!("class {}:", decl.name));

        let fields: Vec<&str> = decl.fields.iter().map(|f| f.name.as_str()).collect();
        self.push_line(
            depth + 1,
            &format!("def __init__(self, {}):", fields.join(", ")),
        );
        for field in &fields {
            self.push_line(depth + 2, &format!("self.{field} = {field}"));
        }

        for method in &decl.methods {
            self.emit_function(method, depth + 1, true)?;
        }
        Ok(())
    }

    fn emit_for(&mut self, statement: &For, depth: usize) -> Result<(), CoreError> {
        match statement.variant {
            ForVariant::Infinite => {
                self.push_line(depth, "while True:");
            }
            ForVariant::Times => {
                let Some(count) = &statement.index else {
                    return Err(CoreError::internal("counted loop without a count"));
                };
                reject_float_count(count)?;
                let rendered = render_expression(count)?;
                self.push_line(depth, &format!("for _ in range({rendered}):"));
            }
            ForVariant::Ranged => {
                let (Some(index), Some(limit)) = (&statement.index, &statement.limit) else {
                    return Err(CoreError::internal("ranged loop without index or limit"));
                };
                reject_float_count(limit)?;
                let index = render_expression(index)?;
                let limit = match limit {
                    Expression::Literal(literal) if literal.kind == LiteralKind::Integer => {
                        format!("range({})", literal.value)
                    }
                    other => render_expression(other)?,
                };
                self.push_line(depth, &format!("for {index} in {limit}:"));
            }
        }
        self.emit_body(&statement.body, depth + 1)
    }

    fn emit_if(&mut self, statement: &If, depth: usize, keyword: &str) -> Result<(), CoreError> {
        let condition = render_expression(&statement.condition)?;
        self.push_line(depth, &format!("{keyword} {condition}:"));
        self.emit_body(&statement.body, depth + 1)?;

        match &statement.else_branch {
            Some(Else::If(nested)) => self.emit_if(nested, depth, "elif"),
            Some(Else::Block(body)) => {
                self.push_line(depth, "else:");
                self.emit_body(body, depth + 1)
            }
            None => Ok(()),
        }
    }

    fn emit_match(&mut self, statement: &Match, depth: usize) -> Result<(), CoreError> {
        let subject = render_expression(&statement.condition)?;
        self.push_line(depth, &format!("match {subject}:"));

        for arm in &statement.arms {
            let mut patterns = Vec::new();
            for condition in &arm.conditions {
                patterns.push(render_expression(condition)?);
            }
            self.push_line(depth + 1, &format!("case {}:", patterns.join(" | ")));
            self.emit_body(&arm.body, depth + 2)?;
        }

        if let Some(body) = &statement.else_arm {
            self.push_line(depth + 1, "case _:");
            self.emit_body(body, depth + 2)?;
        }
        Ok(())
    }
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Counted loops need an integer; a float literal in that position
/// is a user error the checker does not catch.
fn reject_float_count(expression: &Expression) -> Result<(), CoreError> {
    if let Expression::Literal(literal) = expression {
        if literal.kind == LiteralKind::Float {
            return Err(CoreError::SemanticError(format!(
                "a float ({}) cannot drive a counted loop",
                literal.value
            )));
        }
    }
    Ok(())
}

fn render_expression(expression: &Expression) -> Result<String, CoreError> {
    match expression {
        Expression::Identifier(name) => Ok(name.clone()),
        Expression::Literal(literal) => Ok(render_literal(literal)),
        Expression::Array(array) => render_array(array),
        Expression::StructLiteral(object) => render_object(object),
        Expression::Lambda(lambda) => render_lambda(lambda),
        Expression::Binary(binary) => render_binary(binary),
        Expression::Call(call) => {
            let name = match builtins::find_builtin(&call.name) {
                Some(builtin) => builtin.python_name,
                None => call.name.as_str(),
            };
            let mut arguments = Vec::new();
            for argument in &call.arguments {
                arguments.push(render_expression(argument)?);
            }
            Ok(format!("{name}({})", arguments.join(", ")))
        }
        Expression::Block(block) => match block.body.as_slice() {
            [Statement::Expression(single)] => render_expression(single),
            _ => Err(CoreError::SemanticError(
                "a block in value position must contain a single expression".into(),
            )),
        },
    }
}

fn render_literal(literal: &Literal) -> String {
    match literal.kind {
        LiteralKind::Boolean => capitalise(&literal.value),
        LiteralKind::String => render_str_literal(literal),
        _ => literal.value.clone(),
    }
}

/// String literals with recorded injections become f-strings: every
/// `#name` marker is substituted with `{name}`.
fn render_str_literal(literal: &Literal) -> String {
    if literal.injections.is_empty() {
        return format!("\"{}\"", literal.value);
    }

    let mut text = literal.value.clone();
    // Longest first, so `#item` is never clipped by `#it`.
    let mut names: Vec<&String> = literal.injections.iter().collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));
    for name in names {
        text = text.replace(&format!("#{name}"), &format!("{{{name}}}"));
    }
    format!("f\"{text}\"")
}

fn render_array(array: &ArrayLiteral) -> Result<String, CoreError> {
    match (&array.len, &array.init) {
        (Some(len), Some(init)) => {
            let len = render_expression(len)?;
            let init = render_expression(init)?;
            Ok(format!("[{init} for it in range({len})]"))
        }
        (Some(len), None) => {
            let len = render_expression(len)?;
            Ok(format!("[None for it in range({len})]"))
        }
        _ => Ok("[]".into()),
    }
}

fn render_object(object: &Object) -> Result<String, CoreError> {
    let mut properties = Vec::new();
    for property in &object.properties {
        let value = render_expression(&property.value)?;
        properties.push(format!("{}={}", property.name, value));
    }
    Ok(format!("{}({})", object.name, properties.join(", ")))
}

/// Python lambdas hold a single expression, so only bodies that are
/// exactly one expression can be emitted.
fn render_lambda(lambda: &Lambda) -> Result<String, CoreError> {
    let expression = match lambda.body.as_slice() {
        [Statement::Expression(single)] => render_expression(single)?,
        _ => {
            return Err(CoreError::SemanticError(
                "lambda bodies are limited to a single expression".into(),
            ));
        }
    };

    let names: Vec<&str> = lambda.parameters.iter().map(|p| p.name.as_str()).collect();
    if names.is_empty() {
        Ok(format!("lambda: {expression}"))
    } else {
        Ok(format!("lambda {}: {expression}", names.join(", ")))
    }
}

fn render_binary(binary: &Binary) -> Result<String, CoreError> {
    let left = render_expression(&binary.left)?;
    let right = render_expression(&binary.right)?;
    match binary.variant {
        BinaryVariant::PropertyAccess => Ok(format!("{left}.{right}")),
        _ => Ok(format!("{left} {} {right}", binary.operator)),
    }
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn transpile(source: &str) -> String {
        let program = parse(source).expect("parse");
        generate(&program).expect("generate")
    }

    fn transpile_err(source: &str) -> CoreError {
        let program = parse(source).expect("parse");
        generate(&program).unwrap_err()
    }

    #[test]
    fn emits_variable_declarations() {
        assert_eq!(transpile("var x = 5"), "x = 5\n");
        assert_eq!(transpile("val flag = true"), "flag = True\n");
    }

    #[test]
    fn translates_builtin_calls() {
        assert_eq!(transpile("println(readln())"), "print(input())\n");
    }

    #[test]
    fn strings_with_injections_become_f_strings() {
        assert_eq!(
            transpile("println(\"hello #name\")"),
            "print(f\"hello {name}\")\n"
        );
        assert_eq!(transpile("println(\"plain\")"), "print(\"plain\")\n");
    }

    #[test]
    fn overlapping_injection_names_substitute_cleanly() {
        assert_eq!(
            transpile("println(\"#it and #item\")"),
            "print(f\"{it} and {item}\")\n"
        );
    }

    #[test]
    fn emits_all_three_loop_shapes() {
        assert_eq!(transpile("for { }"), "while True:\n    pass\n");
        assert_eq!(transpile("for 3 { }"), "for _ in range(3):\n    pass\n");
        assert_eq!(
            transpile("for i in 10 { }"),
            "for i in range(10):\n    pass\n"
        );
        assert_eq!(
            transpile("for name in names { }"),
            "for name in names:\n    pass\n"
        );
    }

    #[test]
    fn rejects_float_loop_bounds() {
        let err = transpile_err("for 2.5 { }");
        assert!(matches!(err, CoreError::SemanticError(message)
            if message.contains("2.5")));

        let err = transpile_err("for i in 2.5 { }");
        assert!(matches!(err, CoreError::SemanticError(_)));
    }

    #[test]
    fn emits_if_elif_else_chains() {
        let python = transpile("if a { x = 1 } else if b { x = 2 } else { x = 3 }");
        assert_eq!(
            python,
            "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n"
        );
    }

    #[test]
    fn emits_match_as_case_alternations() {
        let python = transpile(
            "match game { when \"Halo\", \"Crysis\" { println(\"good\") } else { println(\"meh\") } }",
        );
        assert_eq!(
            python,
            "match game:\n    case \"Halo\" | \"Crysis\":\n        print(\"good\")\n    case _:\n        print(\"meh\")\n"
        );
    }

    #[test]
    fn emits_functions_with_positional_parameters() {
        let python = transpile("fn greet(name str, loud bool) { println(name) }");
        assert_eq!(python, "def greet(name, loud):\n    print(name)\n\n");
    }

    #[test]
    fn emits_structs_as_classes() {
        let python = transpile("struct Person { name str, age int }");
        assert_eq!(
            python,
            "class Person:\n    def __init__(self, name, age):\n        self.name = name\n        self.age = age\n\n"
        );
    }

    #[test]
    fn emits_struct_literals_as_keyword_calls() {
        let python = transpile(
            "struct Person { name str }\nval ana = Person { name: \"ana\" }",
        );
        assert!(python.ends_with("ana = Person(name=\"ana\")\n"), "{python}");
    }

    #[test]
    fn emits_enums_as_constant_classes() {
        let python = transpile("enum Color { RED, GREEN }");
        assert_eq!(
            python,
            "class Color:\n    RED = \"RED\"\n    GREEN = \"GREEN\"\n\n"
        );
    }

    #[test]
    fn emits_array_initializers_as_comprehensions() {
        assert_eq!(
            transpile("var xs = []int {len: 3, init: 0}"),
            "xs = [0 for it in range(3)]\n"
        );
        assert_eq!(
            transpile("var xs = []int {len: count}"),
            "xs = [None for it in range(count)]\n"
        );
        assert_eq!(transpile("var xs = []int"), "xs = []\n");
    }

    #[test]
    fn property_access_becomes_attribute_access() {
        assert_eq!(transpile("println(ana:name)"), "print(ana.name)\n");
    }

    #[test]
    fn emits_single_expression_lambdas() {
        assert_eq!(
            transpile("val double = fn (x int) { x * 2 }"),
            "double = lambda x: x * 2\n"
        );
    }

    #[test]
    fn rejects_multi_statement_lambdas() {
        let err = transpile_err("val f = fn (x int) { var y = 1\nx * 2 }");
        assert!(matches!(err, CoreError::SemanticError(message)
            if message.contains("single expression")));
    }

    #[test]
    fn indentation_follows_nesting() {
        let python = transpile("fn main {\n  if ready {\n    println(\"go\")\n  }\n}");
        assert_eq!(
            python,
            "def main():\n    if ready:\n        print(\"go\")\n\n"
        );
    }
}

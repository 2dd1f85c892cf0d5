//! Scope and type validation.
//!
//! One pass over the program tree with a chain of scopes mirroring
//! lexical nesting. Scopes live in an arena for the duration of a
//! single `check` call; each scope stores the index of its parent
//! and lookups walk the chain to the root. A failure marks every
//! ancestor scope as failed but never stops the walk: the point of
//! this pass is to surface as many problems as possible in one run.

use std::collections::HashMap;

use crate::ast::{
    BinaryVariant, Else, Expression, ForVariant, Program, Statement, Variable,
};
use crate::builtins;
use crate::diagnostic::Diagnostic;
use crate::token::LiteralKind;
use crate::types::Typing;

/// What one checker pass produced. The caller decides whether the
/// batch is fatal.
#[derive(Debug)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Validate a whole program.
pub fn check(program: &Program) -> CheckResult {
    let mut checker = Checker::new();
    for statement in &program.children {
        checker.check_statement(statement, GLOBAL);
    }
    CheckResult {
        diagnostics: checker.diagnostics,
    }
}

const GLOBAL: usize = 0;

#[derive(Debug)]
struct Scope {
    symbols: HashMap<String, Typing>,
    parent: Option<usize>,
    failed: bool,
}

struct Checker {
    scopes: Vec<Scope>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn new() -> Self {
        let mut global = Scope {
            symbols: HashMap::new(),
            parent: None,
            failed: false,
        };
        for builtin in builtins::BUILTINS {
            global
                .symbols
                .insert(builtin.name.to_string(), builtin.result_typing());
        }
        Checker {
            scopes: vec![global],
            diagnostics: Vec::new(),
        }
    }

    fn child_scope(&mut self, parent: usize) -> usize {
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            parent: Some(parent),
            failed: false,
        });
        self.scopes.len() - 1
    }

    /// Record a failure in `scope` and every ancestor up to the root.
    fn mark_failed(&mut self, scope: usize) {
        let mut current = Some(scope);
        while let Some(index) = current {
            self.scopes[index].failed = true;
            current = self.scopes[index].parent;
        }
    }

    fn report(&mut self, scope: usize, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
        self.mark_failed(scope);
    }

    /// Register a name in `scope`. Only the current scope is
    /// consulted for duplicates; shadowing an outer scope is fine.
    fn declare(&mut self, scope: usize, name: &str, typing: Typing, what: &str) {
        if self.scopes[scope].symbols.contains_key(name) {
            self.report(
                scope,
                Diagnostic::error(format!("{what} '{name}' has already been declared"))
                    .with_code("E0001"),
            );
        }
        self.scopes[scope].symbols.insert(name.to_string(), typing);
    }

    fn lookup(&self, scope: usize, name: &str) -> Option<&Typing> {
        let mut current = Some(scope);
        while let Some(index) = current {
            if let Some(typing) = self.scopes[index].symbols.get(name) {
                return Some(typing);
            }
            current = self.scopes[index].parent;
        }
        None
    }

    fn check_body(&mut self, body: &[Statement], scope: usize) {
        for statement in body {
            self.check_statement(statement, scope);
        }
    }

    fn check_statement(&mut self, statement: &Statement, scope: usize) {
        match statement {
            Statement::Variable(variable) => self.check_variable(variable, scope),
            Statement::Function(function) => self.check_function(function, scope),
            Statement::Struct(decl) => {
                self.declare(
                    scope,
                    &decl.name,
                    Typing::new(LiteralKind::Struct, decl.name.clone()),
                    "Struct",
                );
                for field in &decl.fields {
                    if let Some(default) = &field.value {
                        self.check_expression(default, scope);
                    }
                }
                for method in &decl.methods {
                    self.check_function(method, scope);
                }
            }
            Statement::Enum(decl) => {
                self.declare(
                    scope,
                    &decl.name,
                    Typing::new(LiteralKind::Struct, decl.name.clone()),
                    "Enum",
                );
            }
            Statement::For(statement) => {
                let child = self.child_scope(scope);
                match statement.variant {
                    ForVariant::Infinite => {}
                    ForVariant::Times => {
                        if let Some(count) = &statement.index {
                            self.check_expression(count, scope);
                        }
                    }
                    ForVariant::Ranged => {
                        if let Some(limit) = &statement.limit {
                            self.check_expression(limit, scope);
                            if let Some(Expression::Identifier(name)) = &statement.index {
                                let limit_typing = self.type_of(limit, scope);
                                let index_typing = match limit_typing.kind {
                                    LiteralKind::Integer => {
                                        Typing::new(LiteralKind::Integer, "int")
                                    }
                                    LiteralKind::Array => limit_typing
                                        .children
                                        .first()
                                        .cloned()
                                        .unwrap_or_else(Typing::unknown),
                                    _ => Typing::unknown(),
                                };
                                self.declare(child, name, index_typing, "Constant");
                            }
                        }
                    }
                }
                self.check_body(&statement.body, child);
            }
            Statement::If(statement) => self.check_if(statement, scope),
            Statement::Match(statement) => {
                self.check_expression(&statement.condition, scope);
                for arm in &statement.arms {
                    for condition in &arm.conditions {
                        self.check_expression(condition, scope);
                    }
                    let child = self.child_scope(scope);
                    self.check_body(&arm.body, child);
                }
                if let Some(body) = &statement.else_arm {
                    let child = self.child_scope(scope);
                    self.check_body(body, child);
                }
            }
            Statement::Expression(expression) => self.check_expression(expression, scope),
        }
    }

    fn check_variable(&mut self, variable: &Variable, scope: usize) {
        let typing = match &variable.value {
            Some(value) => {
                self.check_expression(value, scope);
                self.type_of(value, scope)
            }
            None => variable.typing.clone(),
        };
        let what = if variable.is_constant {
            "Constant"
        } else {
            "Variable"
        };
        self.declare(scope, &variable.name, typing, what);
    }

    fn check_function(&mut self, function: &crate::ast::Function, scope: usize) {
        let signature = Typing::function_signature(
            function
                .parameters
                .iter()
                .map(|parameter| parameter.typing.clone())
                .collect(),
        );
        self.declare(scope, &function.name, signature.clone(), "Function");

        // The child scope sees the function's own name so the body
        // can recurse.
        let child = self.child_scope(scope);
        self.scopes[child]
            .symbols
            .insert(function.name.clone(), signature);
        for parameter in &function.parameters {
            self.declare(child, &parameter.name, parameter.typing.clone(), "Constant");
        }
        self.check_body(&function.body, child);
    }

    fn check_if(&mut self, statement: &crate::ast::If, scope: usize) {
        self.check_expression(&statement.condition, scope);
        let child = self.child_scope(scope);
        self.check_body(&statement.body, child);

        match &statement.else_branch {
            Some(Else::If(nested)) => self.check_if(nested, scope),
            Some(Else::Block(body)) => {
                let child = self.child_scope(scope);
                self.check_body(body, child);
            }
            None => {}
        }
    }

    fn check_expression(&mut self, expression: &Expression, scope: usize) {
        match expression {
            Expression::Identifier(name) => {
                if !builtins::is_builtin(name) && self.lookup(scope, name).is_none() {
                    self.report(
                        scope,
                        Diagnostic::error(format!("undefined identifier '{name}'"))
                            .with_code("E0002"),
                    );
                }
            }
            // Interpolation names inside string literals are left
            // unresolved here; only the generator touches them.
            Expression::Literal(_) => {}
            Expression::Array(array) => {
                if let Some(len) = &array.len {
                    self.check_expression(len, scope);
                }
                if let Some(init) = &array.init {
                    self.check_expression(init, scope);
                }
            }
            Expression::StructLiteral(object) => {
                if self.lookup(scope, &object.name).is_none() {
                    self.report(
                        scope,
                        Diagnostic::error(format!("undefined struct '{}'", object.name))
                            .with_code("E0002"),
                    );
                }
                for property in &object.properties {
                    self.check_expression(&property.value, scope);
                }
            }
            Expression::Lambda(lambda) => {
                let child = self.child_scope(scope);
                for parameter in &lambda.parameters {
                    self.declare(child, &parameter.name, parameter.typing.clone(), "Constant");
                }
                self.check_body(&lambda.body, child);
            }
            Expression::Binary(binary) => match binary.variant {
                BinaryVariant::Assignment => {
                    self.check_expression(&binary.left, scope);
                    self.check_expression(&binary.right, scope);

                    let left = self.type_of(&binary.left, scope);
                    let right = self.type_of(&binary.right, scope);
                    if left.kind != LiteralKind::Unknown
                        && right.kind != LiteralKind::Unknown
                        && left != right
                    {
                        self.report(
                            scope,
                            Diagnostic::error(format!(
                                "type mismatch: cannot assign {} to {}",
                                right.value, left.value
                            ))
                            .with_code("E0003"),
                        );
                    }
                }
                BinaryVariant::PropertyAccess => {
                    // Only the base name resolves through scopes; the
                    // property itself belongs to the struct.
                    self.check_expression(&binary.left, scope);
                }
                BinaryVariant::Operation => {
                    self.check_expression(&binary.left, scope);
                    self.check_expression(&binary.right, scope);
                }
            },
            Expression::Call(call) => {
                if !builtins::is_builtin(&call.name) && self.lookup(scope, &call.name).is_none() {
                    self.report(
                        scope,
                        Diagnostic::error(format!("undefined function '{}'", call.name))
                            .with_code("E0002"),
                    );
                }
                for argument in &call.arguments {
                    self.check_expression(argument, scope);
                }
            }
            Expression::Block(block) => {
                let child = self.child_scope(scope);
                self.check_body(&block.body, child);
            }
        }
    }

    /// Resolve the type of an expression with the scope chain in
    /// hand; falls back to pure structural inference.
    fn type_of(&self, expression: &Expression, scope: usize) -> Typing {
        match expression {
            Expression::Identifier(name) => self
                .lookup(scope, name)
                .cloned()
                .unwrap_or_else(Typing::unknown),
            Expression::Call(call) => match builtins::find_builtin(&call.name) {
                Some(builtin) => builtin.result_typing(),
                // User functions declare no result type.
                None => Typing::unknown(),
            },
            Expression::Binary(binary) => match binary.variant {
                BinaryVariant::Operation => {
                    let left = self.type_of(&binary.left, scope);
                    if left.kind != LiteralKind::Unknown {
                        left
                    } else {
                        self.type_of(&binary.right, scope)
                    }
                }
                _ => Typing::unknown(),
            },
            _ => Typing::infer(expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check_source(source: &str) -> CheckResult {
        let program = parse(source).expect("parse");
        check(&program)
    }

    #[test]
    fn reports_exactly_one_duplicate_declaration() {
        let result = check_source("var x = 5\nvar x = 6");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("already been declared"));
    }

    #[test]
    fn shadowing_an_outer_scope_is_allowed() {
        let result = check_source("var x = 5\nif true {\n  var x = 6\n}");
        assert!(result.passed(), "{:?}", result.diagnostics);
    }

    #[test]
    fn reports_constant_type_mismatch_on_reassignment() {
        let result = check_source("val pi = 3.14\npi = 1");
        assert_eq!(result.diagnostics.len(), 1);
        let message = &result.diagnostics[0].message;
        assert!(message.contains("type mismatch"), "{message}");
        assert!(message.contains("int") && message.contains("float"));
    }

    #[test]
    fn same_type_reassignment_passes() {
        let result = check_source("var count = 1\ncount = 2");
        assert!(result.passed(), "{:?}", result.diagnostics);
    }

    #[test]
    fn reports_undefined_identifiers_but_not_builtins() {
        let result = check_source("println(mystery)");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("mystery"));
    }

    #[test]
    fn builtin_result_types_flow_into_declarations() {
        let result = check_source("var name = readln()\nname = \"ana\"");
        assert!(result.passed(), "{:?}", result.diagnostics);

        let result = check_source("var name = readln()\nname = 42");
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn functions_can_recurse_and_see_their_parameters() {
        let result = check_source("fn countdown(n int) {\n  countdown(n)\n}");
        assert!(result.passed(), "{:?}", result.diagnostics);
    }

    #[test]
    fn failures_do_not_stop_sibling_checks() {
        let result = check_source("var x = 5\nvar x = 6\nprintln(mystery)");
        assert_eq!(result.diagnostics.len(), 2);
    }

    #[test]
    fn ranged_loop_binds_its_index_in_the_body() {
        let result = check_source("for i in 10 {\n  println(i)\n}");
        assert!(result.passed(), "{:?}", result.diagnostics);

        let result = check_source("for i in 10 { }\nprintln(i)");
        assert_eq!(result.diagnostics.len(), 1, "loop index must not leak");
    }

    #[test]
    fn struct_literals_need_a_declaration() {
        let passing =
            check_source("struct Person { name str }\nval ana = Person { name: \"ana\" }");
        assert!(passing.passed(), "{:?}", passing.diagnostics);

        let failing = check_source("val ana = Person { name: \"ana\" }");
        assert_eq!(failing.diagnostics.len(), 1);
    }

    #[test]
    fn string_injections_are_not_resolved() {
        // Interpolated names skip the undefined check entirely; only
        // the text outside strings is validated.
        let result = check_source("println(\"hello #nonexistent\")");
        assert!(result.passed(), "{:?}", result.diagnostics);
    }
}

//! Built-in functions known to the language.
//!
//! One table serves two consumers: the checker seeds its global
//! scope from it (so built-in names bypass the undefined check with
//! the right result types), and the generator translates calls
//! through it. Keeping it a `const` slice with a linear lookup keeps
//! both sides in agreement and avoids any hidden initialization.

use crate::token::LiteralKind;
use crate::types::Typing;

/// Metadata about a single built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFn {
    /// Name at the language level, e.g. `println`.
    pub name: &'static str,
    /// Name emitted in generated Python, e.g. `print`.
    pub python_name: &'static str,
    /// Kind of value a call evaluates to.
    pub result: LiteralKind,
}

/// The complete list of built-ins.
pub const BUILTINS: &[BuiltinFn] = &[
    BuiltinFn {
        name: "println",
        python_name: "print",
        result: LiteralKind::Void,
    },
    BuiltinFn {
        name: "readln",
        python_name: "input",
        result: LiteralKind::String,
    },
    BuiltinFn {
        name: "str",
        python_name: "str",
        result: LiteralKind::String,
    },
    BuiltinFn {
        name: "int",
        python_name: "int",
        result: LiteralKind::Integer,
    },
    BuiltinFn {
        name: "float",
        python_name: "float",
        result: LiteralKind::Float,
    },
    BuiltinFn {
        name: "bool",
        python_name: "bool",
        result: LiteralKind::Boolean,
    },
    BuiltinFn {
        name: "len",
        python_name: "len",
        result: LiteralKind::Integer,
    },
];

/// Look up a built-in by its language-level name.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinFn> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    find_builtin(name).is_some()
}

impl BuiltinFn {
    /// The result type of a call to this built-in.
    pub fn result_typing(&self) -> Typing {
        Typing::new(self.result, Typing::built_in_name(self.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_io_builtins() {
        assert_eq!(find_builtin("println").unwrap().python_name, "print");
        assert_eq!(find_builtin("readln").unwrap().python_name, "input");
        assert!(find_builtin("printf").is_none());
    }

    #[test]
    fn conversion_builtins_keep_their_names() {
        for name in ["str", "int", "float", "bool", "len"] {
            assert_eq!(find_builtin(name).unwrap().python_name, name);
        }
    }

    #[test]
    fn readln_yields_a_string() {
        let typing = find_builtin("readln").unwrap().result_typing();
        assert_eq!(typing.value, "str");
    }
}
